//! Rule base configuration consumed by evaluators.

use serde::{Deserialize, Serialize};

use crate::error::{FireResult, ValidationError};
use crate::limit::FireLimit;

/// Configuration of the enclosing rule base.
///
/// Evaluators read `sequential` exactly once, at construction. Changing the
/// configuration afterwards has no effect on evaluators already built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleBaseConfig {
    /// Consume activations destructively in queue order, never reconsidering.
    pub sequential: bool,
    /// Limit used by `ParallelFiring::fire_all_default`.
    pub default_fire_limit: FireLimit,
    /// Worker threads used when several groups fire in parallel.
    pub parallel_worker_threads: usize,
}

impl Default for RuleBaseConfig {
    fn default() -> Self {
        Self {
            sequential: false,
            default_fire_limit: FireLimit::Unlimited,
            parallel_worker_threads: 4,
        }
    }
}

impl RuleBaseConfig {
    /// Configuration for strictly sequential, non-reorderable firing.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            sequential: true,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(raw: &str) -> FireResult<Self> {
        let cfg: Self = serde_json::from_str(raw).map_err(|e| ValidationError::InvalidConfiguration {
            reason: format!("malformed rule base configuration: {e}"),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.parallel_worker_threads == 0 {
            return Err(ValidationError::InvalidConfiguration {
                reason: "parallel_worker_threads must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
