//! Fire limit accounting.

use serde::{Deserialize, Serialize};

/// Ceiling on the running total of fired rules.
///
/// `Unlimited` is distinct from every numeric ceiling, including `AtMost(0)`
/// which refuses to start any firing at all. Serialized as `null` or a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum FireLimit {
    /// No ceiling.
    #[default]
    Unlimited,
    /// Stop once the running total reaches this value.
    AtMost(u64),
}

impl FireLimit {
    /// Build a limit from a signed count where any negative value means unlimited.
    #[must_use]
    pub fn from_raw(raw: i64) -> Self {
        u64::try_from(raw).map_or(Self::Unlimited, Self::AtMost)
    }

    /// Returns true once `total` fires leave no room for another one.
    #[must_use]
    pub const fn is_reached(self, total: u64) -> bool {
        match self {
            Self::Unlimited => false,
            Self::AtMost(max) => total >= max,
        }
    }

    /// Returns true for `Unlimited`.
    #[must_use]
    pub const fn is_unlimited(self) -> bool {
        matches!(self, Self::Unlimited)
    }
}

impl From<Option<u64>> for FireLimit {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::Unlimited, Self::AtMost)
    }
}

impl From<FireLimit> for Option<u64> {
    fn from(value: FireLimit) -> Self {
        match value {
            FireLimit::Unlimited => None,
            FireLimit::AtMost(max) => Some(max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_raw_is_unlimited() {
        assert_eq!(FireLimit::from_raw(-1), FireLimit::Unlimited);
        assert_eq!(FireLimit::from_raw(0), FireLimit::AtMost(0));
        assert_eq!(FireLimit::from_raw(7), FireLimit::AtMost(7));
    }

    #[test]
    fn zero_ceiling_is_reached_immediately() {
        assert!(FireLimit::AtMost(0).is_reached(0));
        assert!(!FireLimit::Unlimited.is_reached(u64::MAX));
    }

    #[test]
    fn reached_at_boundary() {
        let limit = FireLimit::AtMost(3);
        assert!(!limit.is_reached(2));
        assert!(limit.is_reached(3));
        assert!(limit.is_reached(9));
    }

    #[test]
    fn serializes_as_nullable_number() {
        assert_eq!(serde_json::to_string(&FireLimit::Unlimited).unwrap(), "null");
        assert_eq!(serde_json::to_string(&FireLimit::AtMost(4)).unwrap(), "4");
        let parsed: FireLimit = serde_json::from_str("12").unwrap();
        assert_eq!(parsed, FireLimit::AtMost(12));
    }
}
