//! Execution context handed to consequences during firing.
//!
//! One context belongs to one evaluator. It is reused verbatim across firings
//! and only ever replaced wholesale (see `GroupEvaluator::reset_context`), so
//! stale consequence-local state can always be discarded by a reset.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activation::{Activation, ActivationId};

/// Unique identifier for an execution context instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Create a new random context id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct BoundActivation {
    id: ActivationId,
    rule: String,
}

/// Mutable state a consequence sees while it runs.
#[derive(Debug)]
pub struct ExecutionContext {
    id: ContextId,
    created_at: DateTime<Utc>,
    current: Option<BoundActivation>,
    locals: HashMap<String, serde_json::Value>,
    fired: u64,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ContextId::new(),
            created_at: Utc::now(),
            current: None,
            locals: HashMap::new(),
            fired: 0,
        }
    }

    /// Identity of this context instance.
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    /// When this instance was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Bind the activation whose consequence is about to run.
    pub fn bind(&mut self, activation: &Activation) {
        self.current = Some(BoundActivation {
            id: activation.id,
            rule: activation.rule.clone(),
        });
    }

    /// Release the bound activation after its consequence returned.
    pub fn unbind(&mut self) {
        if self.current.take().is_some() {
            self.fired = self.fired.saturating_add(1);
        }
    }

    /// Activation currently bound, if a consequence is running.
    #[must_use]
    pub fn current_activation(&self) -> Option<ActivationId> {
        self.current.as_ref().map(|b| b.id)
    }

    /// Rule currently bound, if a consequence is running.
    #[must_use]
    pub fn current_rule(&self) -> Option<&str> {
        self.current.as_ref().map(|b| b.rule.as_str())
    }

    /// Store a consequence-local value.
    pub fn set_local(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.locals.insert(name.into(), value);
    }

    /// Read a consequence-local value.
    #[must_use]
    pub fn local(&self, name: &str) -> Option<&serde_json::Value> {
        self.locals.get(name)
    }

    /// Remove and return a consequence-local value.
    pub fn take_local(&mut self, name: &str) -> Option<serde_json::Value> {
        self.locals.remove(name)
    }

    /// Number of consequences that completed in this context.
    #[must_use]
    pub const fn fired(&self) -> u64 {
        self.fired
    }

    /// Returns true if a consequence was interrupted while bound.
    ///
    /// A context in this state should be reset before the next firing.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_unbind_track_fires() {
        let mut ctx = ExecutionContext::new();
        let a = Activation::new("r1", "main", 0).unwrap();

        ctx.bind(&a);
        assert_eq!(ctx.current_activation(), Some(a.id));
        assert_eq!(ctx.current_rule(), Some("r1"));
        assert!(ctx.is_dirty());

        ctx.unbind();
        assert!(ctx.current_activation().is_none());
        assert!(!ctx.is_dirty());
        assert_eq!(ctx.fired(), 1);

        ctx.unbind();
        assert_eq!(ctx.fired(), 1);
    }

    #[test]
    fn locals_roundtrip() {
        let mut ctx = ExecutionContext::new();
        ctx.set_local("n", serde_json::json!(3));
        assert_eq!(ctx.local("n"), Some(&serde_json::json!(3)));
        assert_eq!(ctx.take_local("n"), Some(serde_json::json!(3)));
        assert!(ctx.local("n").is_none());
    }

    #[test]
    fn fresh_contexts_differ() {
        assert_ne!(ExecutionContext::new().id(), ExecutionContext::new().id());
    }
}
