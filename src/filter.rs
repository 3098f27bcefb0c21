//! Agenda filters: skip predicates forwarded to the firing executor.
//!
//! The firing loop never inspects a filter itself. It hands the filter to the
//! executor, which decides whether a selected activation actually fires.

use regex::Regex;

use crate::activation::Activation;
use crate::error::ValidationError;

/// Decides whether a selected activation may fire.
pub trait AgendaFilter: Send + Sync {
    /// Returns true if `activation` should fire.
    fn accept(&self, activation: &Activation) -> bool;
}

impl<F> AgendaFilter for F
where
    F: Fn(&Activation) -> bool + Send + Sync,
{
    fn accept(&self, activation: &Activation) -> bool {
        self(activation)
    }
}

/// Filter that accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl AgendaFilter for AcceptAll {
    fn accept(&self, _activation: &Activation) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
enum NameMatch {
    Equals(String),
    StartsWith(String),
    EndsWith(String),
    Matches(Regex),
}

/// Filter on the activation's rule name.
///
/// `accept_matching = false` inverts the filter, so matching rules are skipped.
#[derive(Debug, Clone)]
pub struct RuleNameFilter {
    matcher: NameMatch,
    accept_matching: bool,
}

impl RuleNameFilter {
    /// Accept only the rule named exactly `name`.
    #[must_use]
    pub fn equals(name: impl Into<String>) -> Self {
        Self {
            matcher: NameMatch::Equals(name.into()),
            accept_matching: true,
        }
    }

    /// Accept rules whose name starts with `prefix`.
    #[must_use]
    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Self {
            matcher: NameMatch::StartsWith(prefix.into()),
            accept_matching: true,
        }
    }

    /// Accept rules whose name ends with `suffix`.
    #[must_use]
    pub fn ends_with(suffix: impl Into<String>) -> Self {
        Self {
            matcher: NameMatch::EndsWith(suffix.into()),
            accept_matching: true,
        }
    }

    /// Accept rules whose whole name matches `pattern`.
    pub fn matches(pattern: &str) -> Result<Self, ValidationError> {
        let anchored = format!("^(?:{pattern})$");
        let regex = Regex::new(&anchored).map_err(|e| ValidationError::InvalidFilterPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            matcher: NameMatch::Matches(regex),
            accept_matching: true,
        })
    }

    /// Skip matching rules instead of accepting them.
    #[must_use]
    pub fn rejecting(mut self) -> Self {
        self.accept_matching = false;
        self
    }

    fn is_match(&self, rule: &str) -> bool {
        match &self.matcher {
            NameMatch::Equals(name) => rule == name,
            NameMatch::StartsWith(prefix) => rule.starts_with(prefix.as_str()),
            NameMatch::EndsWith(suffix) => rule.ends_with(suffix.as_str()),
            NameMatch::Matches(regex) => regex.is_match(rule),
        }
    }
}

impl AgendaFilter for RuleNameFilter {
    fn accept(&self, activation: &Activation) -> bool {
        self.is_match(&activation.rule) == self.accept_matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn act(rule: &str) -> Activation {
        Activation::new(rule, "main", 0).unwrap()
    }

    #[test]
    fn name_filters() {
        assert!(RuleNameFilter::equals("audit").accept(&act("audit")));
        assert!(!RuleNameFilter::equals("audit").accept(&act("audit-2")));
        assert!(RuleNameFilter::starts_with("price-").accept(&act("price-discount")));
        assert!(RuleNameFilter::ends_with("-log").accept(&act("order-log")));
        assert!(!RuleNameFilter::ends_with("-log").rejecting().accept(&act("order-log")));
    }

    #[test]
    fn regex_filter_is_anchored() {
        let f = RuleNameFilter::matches("rule-[0-9]+").unwrap();
        assert!(f.accept(&act("rule-42")));
        assert!(!f.accept(&act("my-rule-42")));
    }

    #[test]
    fn invalid_regex_rejected() {
        let err = RuleNameFilter::matches("(").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFilterPattern { .. }));
    }

    #[test]
    fn closures_are_filters() {
        let high_only = |a: &Activation| a.salience > 5;
        let mut a = act("r");
        assert!(!high_only.accept(&a));
        a.salience = 10;
        assert!(high_only.accept(&a));
        assert!(AcceptAll.accept(&a));
    }
}
