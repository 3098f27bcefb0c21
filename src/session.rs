//! Rule base session: configuration, context factory and reconciliation gate.
//!
//! The firing loop needs four things from the session it runs in: the rule
//! base configuration (read once), a factory for execution contexts, a hook to
//! bring query-derived state up to date before a firing, and the gate that
//! flushes queued fact-base effects into the agenda after every firing.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::trace;

use crate::activation::{Activation, ActivationId};
use crate::config::RuleBaseConfig;
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, FireError, FireResult};
use crate::group::{AgendaError, AgendaGroup, InMemoryAgendaGroup};

/// Session services consumed by the firing loop.
///
/// Implementations are shared by every evaluator of the session, possibly
/// from several threads at once, and must serialize their own mutations of
/// the fact base and network.
pub trait Session: Send + Sync {
    /// Rule base configuration, or `None` if it is not available.
    fn config(&self) -> Option<&RuleBaseConfig>;

    /// Build a fresh execution context.
    fn create_execution_context(&self) -> ExecutionContext;

    /// Bring query-derived condition state up to date for `activation`.
    fn refresh_queries_for(&self, activation: &Activation) -> FireResult<()>;

    /// Apply queued fact-base effects so the agenda reflects them.
    fn flush_pending_effects(&self) -> FireResult<()>;

    /// Called once at the start of every top-level call on `group`.
    fn start_evaluation(&self, _group: &dyn AgendaGroup) -> FireResult<()> {
        Ok(())
    }
}

/// Agenda mutation produced by a fact-base change, applied on flush.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingEffect {
    /// Queue a new activation on `activation.group`.
    Insert(Activation),
    /// Cancel a pending activation. Ignored if it already left the group.
    Retract {
        /// Owning group.
        group: String,
        /// Activation to cancel.
        id: ActivationId,
    },
    /// Re-prioritize a pending activation. Ignored if it already left the group.
    UpdateSalience {
        /// Owning group.
        group: String,
        /// Activation to re-sort.
        id: ActivationId,
        /// New salience.
        salience: i32,
    },
}

type QueryHook = dyn Fn(&Activation) -> FireResult<()> + Send + Sync;

/// In-process session backed by `InMemoryAgendaGroup`s.
///
/// Consequences record their effects with `schedule`; nothing reaches the
/// agenda until `flush_pending_effects` runs.
///
/// With a sequential configuration a firing pass is single-shot: activations
/// inserted by a flush are held back and queued on their group when the next
/// evaluation of that group starts. Retractions and salience updates apply
/// immediately in both modes.
pub struct InMemorySession {
    config: Option<RuleBaseConfig>,
    groups: RwLock<HashMap<String, Arc<InMemoryAgendaGroup>>>,
    pending: Mutex<Vec<PendingEffect>>,
    deferred: Mutex<Vec<Activation>>,
    query_hook: Option<Box<QueryHook>>,
    query_refreshes: AtomicU64,
    flushes: AtomicU64,
    contexts_created: AtomicU64,
}

impl fmt::Debug for InMemorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySession")
            .field("config", &self.config)
            .field("query_refreshes", &self.query_refreshes())
            .field("flushes", &self.flushes())
            .finish_non_exhaustive()
    }
}

impl InMemorySession {
    /// Create a session with the given configuration.
    #[must_use]
    pub fn new(config: RuleBaseConfig) -> Self {
        Self::build(Some(config))
    }

    /// Create a session whose configuration is unavailable.
    #[must_use]
    pub fn without_config() -> Self {
        Self::build(None)
    }

    fn build(config: Option<RuleBaseConfig>) -> Self {
        Self {
            config,
            groups: RwLock::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            deferred: Mutex::new(Vec::new()),
            query_hook: None,
            query_refreshes: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            contexts_created: AtomicU64::new(0),
        }
    }

    /// Install a hook run by `refresh_queries_for`.
    #[must_use]
    pub fn with_query_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Activation) -> FireResult<()> + Send + Sync + 'static,
    {
        self.query_hook = Some(Box::new(hook));
        self
    }

    /// Return the named group, creating it on first use.
    pub fn register_group(&self, name: &str) -> FireResult<Arc<InMemoryAgendaGroup>> {
        let mut groups = self
            .groups
            .write()
            .map_err(|_| FireError::internal("session group registry lock poisoned"))?;
        if let Some(group) = groups.get(name) {
            return Ok(Arc::clone(group));
        }
        let group = Arc::new(InMemoryAgendaGroup::new(name)?);
        groups.insert(name.to_string(), Arc::clone(&group));
        Ok(group)
    }

    /// Look up a registered group.
    pub fn group(&self, name: &str) -> FireResult<Arc<InMemoryAgendaGroup>> {
        let groups = self
            .groups
            .read()
            .map_err(|_| FireError::internal("session group registry lock poisoned"))?;
        groups.get(name).cloned().ok_or_else(|| {
            FireError::Execution(ExecutionError::UnknownGroup {
                name: name.to_string(),
            })
        })
    }

    /// Queue an agenda effect for the next flush.
    pub fn schedule(&self, effect: PendingEffect) -> FireResult<()> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| FireError::internal("session pending queue lock poisoned"))?;
        pending.push(effect);
        Ok(())
    }

    /// Number of effects waiting for a flush.
    pub fn pending_len(&self) -> FireResult<usize> {
        let pending = self
            .pending
            .lock()
            .map_err(|_| FireError::internal("session pending queue lock poisoned"))?;
        Ok(pending.len())
    }

    /// Number of `refresh_queries_for` calls so far.
    #[must_use]
    pub fn query_refreshes(&self) -> u64 {
        self.query_refreshes.load(Ordering::Relaxed)
    }

    /// Number of `flush_pending_effects` calls so far.
    #[must_use]
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Number of execution contexts built so far.
    #[must_use]
    pub fn contexts_created(&self) -> u64 {
        self.contexts_created.load(Ordering::Relaxed)
    }

    /// Number of inserted activations held back until their group's next pass.
    pub fn deferred_len(&self) -> FireResult<usize> {
        let deferred = self
            .deferred
            .lock()
            .map_err(|_| FireError::internal("session deferred queue lock poisoned"))?;
        Ok(deferred.len())
    }

    fn is_sequential(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.sequential)
    }

    fn apply(&self, effect: PendingEffect) -> FireResult<()> {
        match effect {
            PendingEffect::Insert(activation) => {
                let group = self.group(&activation.group)?;
                if self.is_sequential() {
                    let mut deferred = self
                        .deferred
                        .lock()
                        .map_err(|_| FireError::internal("session deferred queue lock poisoned"))?;
                    deferred.push(activation);
                } else {
                    group.insert(activation)?;
                }
            }
            PendingEffect::Retract { group, id } => {
                self.group(&group)?.remove(id)?;
            }
            PendingEffect::UpdateSalience { group, id, salience } => {
                match self.group(&group)?.update_salience(id, salience) {
                    Ok(()) | Err(AgendaError::ActivationNotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }
}

/// Agenda-level failures while applying an effect are reported as a failed
/// propagation; session-level errors pass through unchanged.
fn propagation_failed(err: FireError) -> FireError {
    match err {
        FireError::Agenda(e) => ExecutionError::PropagationFailed {
            reason: e.to_string(),
        }
        .into(),
        other => other,
    }
}

impl Session for InMemorySession {
    fn config(&self) -> Option<&RuleBaseConfig> {
        self.config.as_ref()
    }

    fn create_execution_context(&self) -> ExecutionContext {
        self.contexts_created.fetch_add(1, Ordering::Relaxed);
        ExecutionContext::new()
    }

    fn refresh_queries_for(&self, activation: &Activation) -> FireResult<()> {
        self.query_refreshes.fetch_add(1, Ordering::Relaxed);
        match &self.query_hook {
            Some(hook) => hook(activation),
            None => Ok(()),
        }
    }

    fn start_evaluation(&self, group: &dyn AgendaGroup) -> FireResult<()> {
        let ready: Vec<Activation> = {
            let mut deferred = self
                .deferred
                .lock()
                .map_err(|_| FireError::internal("session deferred queue lock poisoned"))?;
            let (ready, held): (Vec<Activation>, Vec<Activation>) =
                std::mem::take(&mut *deferred).into_iter().partition(|a| a.group == group.name());
            *deferred = held;
            ready
        };
        if ready.is_empty() {
            return Ok(());
        }

        trace!(group = group.name(), activations = ready.len(), "queueing deferred activations");
        let target = self.group(group.name())?;
        for activation in ready {
            target.insert(activation)?;
        }
        Ok(())
    }

    /// Apply queued effects in the order they were scheduled.
    ///
    /// On failure the failing effect is dropped and the effects after it stay
    /// queued for the next flush.
    fn flush_pending_effects(&self) -> FireResult<()> {
        self.flushes.fetch_add(1, Ordering::Relaxed);

        let effects = {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| FireError::internal("session pending queue lock poisoned"))?;
            std::mem::take(&mut *pending)
        };
        if effects.is_empty() {
            return Ok(());
        }
        trace!(effects = effects.len(), "flushing pending effects");

        let mut effects = effects.into_iter();
        while let Some(effect) = effects.next() {
            if let Err(err) = self.apply(effect).map_err(propagation_failed) {
                let rest: Vec<PendingEffect> = effects.by_ref().collect();
                if !rest.is_empty() {
                    let mut pending = self
                        .pending
                        .lock()
                        .map_err(|_| FireError::internal("session pending queue lock poisoned"))?;
                    pending.splice(0..0, rest);
                }
                return Err(err);
            }
        }
        Ok(())
    }
}
