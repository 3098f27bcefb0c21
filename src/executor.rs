//! Firing executors: run the consequence(s) reachable from one activation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::activation::Activation;
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, FireError, FireResult, ValidationError};
use crate::filter::AgendaFilter;
use crate::group::AgendaGroup;
use crate::limit::FireLimit;
use crate::session::InMemorySession;

/// Executes a selected activation.
///
/// One call may fire more than one rule (chained or batched network
/// evaluation); the return value is how many actually fired. In
/// reconsideration mode the executor is responsible for taking the activation
/// off `group`, otherwise the loop would select it again.
pub trait FiringExecutor: Send + Sync {
    /// Fire `activation`, selected from `group`, honouring `filter` and
    /// `fire_limit`.
    ///
    /// `prior_fire_count` is the caller's running total from before the
    /// current call to the firing loop.
    fn fire(
        &self,
        group: &dyn AgendaGroup,
        activation: &Activation,
        ctx: &mut ExecutionContext,
        filter: Option<&dyn AgendaFilter>,
        prior_fire_count: u64,
        fire_limit: FireLimit,
    ) -> FireResult<u64>;
}

/// Action logic of one rule.
pub trait Consequence: Send + Sync {
    /// Run the action. Fact-base changes go through `session.schedule`.
    fn execute(
        &self,
        activation: &Activation,
        ctx: &mut ExecutionContext,
        session: &InMemorySession,
    ) -> FireResult<()>;
}

impl<F> Consequence for F
where
    F: Fn(&Activation, &mut ExecutionContext, &InMemorySession) -> FireResult<()> + Send + Sync,
{
    fn execute(
        &self,
        activation: &Activation,
        ctx: &mut ExecutionContext,
        session: &InMemorySession,
    ) -> FireResult<()> {
        self(activation, ctx, session)
    }
}

/// Executor that looks up consequences by rule name.
///
/// Every selected activation is first taken off its group, so a filtered-out
/// activation is cancelled rather than left at the head.
pub struct ConsequenceExecutor {
    session: Arc<InMemorySession>,
    consequences: RwLock<HashMap<String, Arc<dyn Consequence>>>,
}

impl fmt::Debug for ConsequenceExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules = self.consequences.read().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("ConsequenceExecutor")
            .field("rules", &rules)
            .finish_non_exhaustive()
    }
}

impl ConsequenceExecutor {
    /// Create an executor with no registered rules.
    #[must_use]
    pub fn new(session: Arc<InMemorySession>) -> Self {
        Self {
            session,
            consequences: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) the consequence of `rule`.
    pub fn register<C>(&self, rule: impl Into<String>, consequence: C) -> FireResult<()>
    where
        C: Consequence + 'static,
    {
        let rule = rule.into();
        if rule.trim().is_empty() {
            return Err(ValidationError::EmptyRuleName.into());
        }
        let mut consequences = self
            .consequences
            .write()
            .map_err(|_| FireError::internal("consequence registry lock poisoned"))?;
        consequences.insert(rule, Arc::new(consequence));
        Ok(())
    }

    /// Register a closure as the consequence of `rule`.
    pub fn register_fn<F>(&self, rule: impl Into<String>, consequence: F) -> FireResult<()>
    where
        F: Fn(&Activation, &mut ExecutionContext, &InMemorySession) -> FireResult<()> + Send + Sync + 'static,
    {
        self.register(rule, consequence)
    }

    fn lookup(&self, rule: &str) -> FireResult<Arc<dyn Consequence>> {
        let consequences = self
            .consequences
            .read()
            .map_err(|_| FireError::internal("consequence registry lock poisoned"))?;
        consequences.get(rule).cloned().ok_or_else(|| {
            FireError::Execution(ExecutionError::MissingConsequence {
                rule: rule.to_string(),
            })
        })
    }
}

impl FiringExecutor for ConsequenceExecutor {
    fn fire(
        &self,
        group: &dyn AgendaGroup,
        activation: &Activation,
        ctx: &mut ExecutionContext,
        filter: Option<&dyn AgendaFilter>,
        prior_fire_count: u64,
        fire_limit: FireLimit,
    ) -> FireResult<u64> {
        if fire_limit.is_reached(prior_fire_count) {
            return Ok(0);
        }

        // No-op in sequential mode, where selection already removed it.
        group.remove(activation.id)?;

        if filter.is_some_and(|f| !f.accept(activation)) {
            trace!(rule = %activation.rule, activation = %activation.id, "activation filtered");
            return Ok(0);
        }

        let consequence = self.lookup(&activation.rule)?;
        ctx.bind(activation);
        // A failing consequence leaves the context bound; see `ExecutionContext::is_dirty`.
        consequence.execute(activation, ctx, &self.session)?;
        ctx.unbind();

        trace!(rule = %activation.rule, activation = %activation.id, "activation fired");
        Ok(1)
    }
}
