//! Error types for salience.
//!
//! All errors are strongly typed using thiserror so callers can match on the
//! specific condition. The firing loop never swallows an error: anything raised
//! while selecting, refreshing queries, firing or flushing propagates out of
//! `evaluate_and_fire` unchanged.

use thiserror::Error;

use crate::group::AgendaError;

/// Validation errors raised while constructing evaluators or feeding input.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Rule base configuration is unavailable")]
    MissingConfiguration,

    #[error("Invalid rule base configuration: {reason}")]
    InvalidConfiguration {
        reason: String,
    },

    #[error("Rule name cannot be empty")]
    EmptyRuleName,

    #[error("Agenda group name cannot be empty")]
    EmptyGroupName,

    #[error("Invalid rule name pattern '{pattern}': {reason}")]
    InvalidFilterPattern {
        pattern: String,
        reason: String,
    },
}

/// Execution errors raised while firing a group.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Consequence of rule '{rule}' failed: {reason}")]
    ConsequenceFailed {
        rule: String,
        reason: String,
    },

    #[error("No consequence registered for rule '{rule}'")]
    MissingConsequence {
        rule: String,
    },

    #[error("Query refresh for rule '{rule}' failed: {reason}")]
    QueryRefreshFailed {
        rule: String,
        reason: String,
    },

    #[error("Propagation flush failed: {reason}")]
    PropagationFailed {
        reason: String,
    },

    #[error("Unknown agenda group: {name}")]
    UnknownGroup {
        name: String,
    },

    #[error("Evaluator for group '{group}' panicked")]
    WorkerPanicked {
        group: String,
    },
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum FireError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Agenda error: {0}")]
    Agenda(#[from] AgendaError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl FireError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a consequence failure for `rule`.
    #[must_use]
    pub fn consequence(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Execution(ExecutionError::ConsequenceFailed {
            rule: rule.into(),
            reason: reason.into(),
        })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an agenda (candidate set) error.
    #[must_use]
    pub const fn is_agenda(&self) -> bool {
        matches!(self, Self::Agenda(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if retrying the same call could succeed.
    ///
    /// Only propagation failures qualify: the failing effect is dropped and
    /// the effects after it stay queued. Consequence failures are left to the
    /// caller, since a retry would fire against changed fact state.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Execution(ExecutionError::PropagationFailed { .. }) => true,
            Self::Validation(_) | Self::Execution(_) | Self::Agenda(_) | Self::Internal { .. } => {
                false
            }
        }
    }
}

/// Result type alias for salience operations.
pub type FireResult<T> = Result<T, FireError>;
