//! Candidate set contract consumed by the firing loop.

use thiserror::Error;

use crate::activation::{Activation, ActivationId};

/// Errors raised by an agenda group backend.
#[derive(Debug, Error)]
pub enum AgendaError {
    /// Activation not queued in this group.
    #[error("Activation not found: {0}")]
    ActivationNotFound(ActivationId),

    /// Activation already queued in this group.
    #[error("Activation {0} is already queued")]
    DuplicateActivation(ActivationId),

    /// Activation belongs to a different group.
    #[error("Activation {id} belongs to group '{found}', not '{expected}'")]
    GroupMismatch {
        /// Activation that was rejected.
        id: ActivationId,
        /// Group it was offered to.
        expected: String,
        /// Group named by the activation.
        found: String,
    },

    /// Backend failure (e.g. a poisoned lock).
    #[error("Agenda backend error: {0}")]
    Backend(String),
}

/// An ordered pool of pending activations for one named group.
///
/// # Contract
/// - The same activation is never queued twice.
/// - Every queued activation names this group.
/// - The head is the activation with the highest salience; ties go to the
///   earliest insertion.
/// - Mutations become visible to the next `peek_head` / `remove_head` as soon
///   as the mutating call returns.
/// - Implementations must tolerate being mutated by the matching network from
///   other threads while an evaluator drains them.
pub trait AgendaGroup: Send + Sync {
    /// Group name.
    fn name(&self) -> &str;

    /// Remove and return the head (destructive extraction).
    fn remove_head(&self) -> Result<Option<Activation>, AgendaError>;

    /// Return the head without removing it.
    fn peek_head(&self) -> Result<Option<Activation>, AgendaError>;

    /// Remove a specific activation, returning it if it was still pending.
    fn remove(&self, id: ActivationId) -> Result<Option<Activation>, AgendaError>;

    /// Number of pending activations.
    fn len(&self) -> Result<usize, AgendaError>;

    /// Returns true if nothing is pending.
    fn is_empty(&self) -> Result<bool, AgendaError> {
        Ok(self.len()? == 0)
    }
}
