//! Group evaluation: the selection → fire → reconcile loop.
//!
//! An `AgendaEvaluator` drains one agenda group at a time. Each iteration
//! selects the next activation according to a selection policy fixed at
//! construction, refreshes the queries it depends on, fires it through the
//! executor and then flushes the session's pending effects so the group
//! reflects the firing before the next selection.
//!
//! The loop stops when the group has nothing left, when the fire limit is
//! reached, or when a halt was requested. Limits and halts are only checked
//! between iterations; a firing step that is already running is never
//! interrupted.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, trace};

use crate::activation::Activation;
use crate::config::RuleBaseConfig;
use crate::context::ExecutionContext;
use crate::error::{FireResult, ValidationError};
use crate::executor::FiringExecutor;
use crate::filter::AgendaFilter;
use crate::group::{AgendaError, AgendaGroup};
use crate::halt::{HaltHandle, HaltSignal};
use crate::limit::FireLimit;
use crate::session::Session;

/// How the next activation is taken from the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Remove the head. An extracted activation is never reconsidered, even if
    /// a later firing queues something with higher salience.
    Sequential,
    /// Peek the head and leave removal to the executor, so activations queued
    /// by earlier firings can overtake lower-salience ones still pending.
    Reconsider,
}

impl SelectionPolicy {
    /// Policy implied by the rule base configuration.
    #[must_use]
    pub const fn from_config(config: &RuleBaseConfig) -> Self {
        if config.sequential {
            Self::Sequential
        } else {
            Self::Reconsider
        }
    }

    /// Select the next activation, or `None` if the group is empty.
    pub fn next<G>(self, group: &G) -> Result<Option<Activation>, AgendaError>
    where
        G: AgendaGroup + ?Sized,
    {
        match self {
            Self::Sequential => group.remove_head(),
            Self::Reconsider => group.peek_head(),
        }
    }

    /// Short stable identifier suitable for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Reconsider => "reconsider",
        }
    }
}

/// Why a call to the firing loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The group had no activation left to select.
    Exhausted,
    /// A halt was requested.
    Halted,
    /// The running total reached the fire limit.
    LimitReached,
}

/// Result of one call to the firing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireOutcome {
    /// Rules fired during this call only.
    pub fired: u64,
    /// Why the loop stopped.
    pub stop: StopReason,
}

/// Drives the firing of agenda groups.
pub trait GroupEvaluator {
    /// Fire activations from `group` until it is empty, halted, or the limit
    /// is reached. Returns the number of rules fired by this call, excluding
    /// `prior_fire_count`.
    ///
    /// # Errors
    /// Any error raised while selecting, refreshing queries, firing or
    /// flushing is returned immediately. Activations still pending stay in the
    /// group and the count accumulated so far is not reported.
    fn evaluate_and_fire(
        &mut self,
        group: &dyn AgendaGroup,
        filter: Option<&dyn AgendaFilter>,
        prior_fire_count: u64,
        fire_limit: FireLimit,
    ) -> FireResult<u64>;

    /// Stop before the next selection.
    fn halt(&self);

    /// Current execution context.
    fn context(&self) -> &ExecutionContext;

    /// Discard the current context and build a fresh one from the session.
    fn reset_context(&mut self);
}

/// The standard group evaluator.
///
/// Built once per session and reused across calls. The selection policy is
/// read from the session configuration at construction and never changes.
pub struct AgendaEvaluator {
    session: Arc<dyn Session>,
    executor: Arc<dyn FiringExecutor>,
    policy: SelectionPolicy,
    context: ExecutionContext,
    halt: HaltSignal,
}

impl std::fmt::Debug for AgendaEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgendaEvaluator")
            .field("policy", &self.policy)
            .field("context", &self.context.id())
            .field("halted", &self.halt.is_halted())
            .finish_non_exhaustive()
    }
}

impl AgendaEvaluator {
    /// Create an evaluator bound to `session`.
    ///
    /// # Errors
    /// Returns `ValidationError::MissingConfiguration` if the session has no
    /// rule base configuration.
    pub fn new(session: Arc<dyn Session>, executor: Arc<dyn FiringExecutor>) -> FireResult<Self> {
        let config = session.config().ok_or(ValidationError::MissingConfiguration)?;
        let policy = SelectionPolicy::from_config(config);
        let context = session.create_execution_context();
        Ok(Self {
            session,
            executor,
            policy,
            context,
            halt: HaltSignal::new(),
        })
    }

    /// Selection policy fixed at construction.
    #[must_use]
    pub const fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Handle that halts this evaluator from another thread.
    #[must_use]
    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.handle()
    }

    /// Mutable access to the current execution context.
    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    /// Like `evaluate_and_fire`, but also reports why the loop stopped.
    ///
    /// # Errors
    /// Same as `GroupEvaluator::evaluate_and_fire`.
    pub fn evaluate_and_fire_detailed(
        &mut self,
        group: &dyn AgendaGroup,
        filter: Option<&dyn AgendaFilter>,
        prior_fire_count: u64,
        fire_limit: FireLimit,
    ) -> FireResult<FireOutcome> {
        let span = debug_span!("evaluate_and_fire", group = group.name(), policy = self.policy.name());
        let _guard = span.enter();

        self.halt.rearm();
        self.session.start_evaluation(group)?;
        let mut fired: u64 = 0;

        let stop = loop {
            if self.halt.is_halted() {
                break StopReason::Halted;
            }
            let total = prior_fire_count.saturating_add(fired);
            if fire_limit.is_reached(total) {
                break StopReason::LimitReached;
            }
            let Some(activation) = self.policy.next(group)? else {
                break StopReason::Exhausted;
            };

            self.session.refresh_queries_for(&activation)?;
            let step = self.executor.fire(
                group,
                &activation,
                &mut self.context,
                filter,
                prior_fire_count,
                fire_limit,
            )?;
            fired = fired.saturating_add(step);
            trace!(rule = %activation.rule, activation = %activation.id, step, fired, "fired activation");

            self.session.flush_pending_effects()?;
        };

        debug!(fired, stop = ?stop, "group evaluation stopped");
        Ok(FireOutcome { fired, stop })
    }
}

impl GroupEvaluator for AgendaEvaluator {
    fn evaluate_and_fire(
        &mut self,
        group: &dyn AgendaGroup,
        filter: Option<&dyn AgendaFilter>,
        prior_fire_count: u64,
        fire_limit: FireLimit,
    ) -> FireResult<u64> {
        self.evaluate_and_fire_detailed(group, filter, prior_fire_count, fire_limit)
            .map(|outcome| outcome.fired)
    }

    fn halt(&self) {
        self.halt.halt();
    }

    fn context(&self) -> &ExecutionContext {
        &self.context
    }

    fn reset_context(&mut self) {
        let fresh = self.session.create_execution_context();
        let stale = std::mem::replace(&mut self.context, fresh);
        debug!(stale = %stale.id(), fresh = %self.context.id(), "execution context reset");
    }
}
