//! Activations: fully matched rule instances waiting on an agenda group.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Unique identifier for an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationId(Uuid);

impl ActivationId {
    /// Create a new random activation id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ActivationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One fully matched rule instance.
///
/// An activation is immutable once it has been queued: the group owns it until
/// it is extracted, after which the firing loop holds it for exactly one fire.
/// Ordering among pending activations is decided by the group from `salience`
/// (higher first) and the insertion `sequence` it assigns (earlier first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    /// Unique identifier.
    pub id: ActivationId,
    /// Name of the rule whose consequence this activation runs.
    pub rule: String,
    /// Name of the agenda group the activation belongs to.
    pub group: String,
    /// Conflict-resolution priority. Higher fires first.
    pub salience: i32,
    /// Matched tuple, keyed by declaration name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, serde_json::Value>,
    /// When the matching network produced this activation.
    pub created_at: DateTime<Utc>,
    /// Insertion order assigned by the owning group.
    #[serde(default)]
    pub(crate) sequence: u64,
}

impl Activation {
    /// Create an activation for `rule` in `group` with the given salience.
    pub fn new(
        rule: impl Into<String>,
        group: impl Into<String>,
        salience: i32,
    ) -> Result<Self, ValidationError> {
        let rule = rule.into();
        if rule.trim().is_empty() {
            return Err(ValidationError::EmptyRuleName);
        }
        let group = group.into();
        if group.trim().is_empty() {
            return Err(ValidationError::EmptyGroupName);
        }

        Ok(Self {
            id: ActivationId::new(),
            rule,
            group,
            salience,
            bindings: BTreeMap::new(),
            created_at: Utc::now(),
            sequence: 0,
        })
    }

    /// Attach a matched binding.
    #[must_use]
    pub fn with_binding(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    /// Look up a binding by declaration name.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&serde_json::Value> {
        self.bindings.get(name)
    }

    /// Insertion order within the owning group (0 until queued).
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }
}
