//! In-memory agenda group.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::activation::{Activation, ActivationId};
use crate::error::ValidationError;
use crate::group::traits::{AgendaError, AgendaGroup};

fn lock_err(context: &'static str) -> AgendaError {
    AgendaError::Backend(format!("poisoned lock: {context}"))
}

/// Ordering key: highest salience first, then earliest insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    salience: Reverse<i32>,
    sequence: u64,
}

#[derive(Debug, Default)]
struct GroupState {
    queue: BTreeMap<QueueKey, Activation>,
    index: HashMap<ActivationId, QueueKey>,
    next_sequence: u64,
}

impl GroupState {
    fn take(&mut self, id: ActivationId) -> Option<Activation> {
        let key = self.index.remove(&id)?;
        self.queue.remove(&key)
    }
}

/// Thread-safe in-memory agenda group.
///
/// Re-sorting happens synchronously inside each mutating call, so a
/// `peek_head` issued after `insert` or `update_salience` returns always
/// observes the new order.
#[derive(Debug)]
pub struct InMemoryAgendaGroup {
    name: String,
    state: RwLock<GroupState>,
}

impl InMemoryAgendaGroup {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyGroupName);
        }
        Ok(Self {
            name,
            state: RwLock::new(GroupState::default()),
        })
    }

    /// Queue an activation, assigning its insertion sequence.
    pub fn insert(&self, mut activation: Activation) -> Result<(), AgendaError> {
        if activation.group != self.name {
            return Err(AgendaError::GroupMismatch {
                id: activation.id,
                expected: self.name.clone(),
                found: activation.group,
            });
        }
        let mut state = self.state.write().map_err(|_| lock_err("group.insert"))?;
        if state.index.contains_key(&activation.id) {
            return Err(AgendaError::DuplicateActivation(activation.id));
        }

        let sequence = state.next_sequence;
        state.next_sequence = state.next_sequence.wrapping_add(1);
        activation.sequence = sequence;

        let key = QueueKey {
            salience: Reverse(activation.salience),
            sequence,
        };
        state.index.insert(activation.id, key);
        state.queue.insert(key, activation);
        Ok(())
    }

    /// Returns true if the activation is still pending.
    pub fn contains(&self, id: ActivationId) -> Result<bool, AgendaError> {
        let state = self.state.read().map_err(|_| lock_err("group.contains"))?;
        Ok(state.index.contains_key(&id))
    }

    /// Change the salience of a pending activation and re-sort it.
    ///
    /// The activation keeps its original insertion sequence, so among equal
    /// salience it still ranks by when it was first queued.
    pub fn update_salience(&self, id: ActivationId, salience: i32) -> Result<(), AgendaError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("group.update_salience"))?;
        let mut activation = state.take(id).ok_or(AgendaError::ActivationNotFound(id))?;

        activation.salience = salience;
        let key = QueueKey {
            salience: Reverse(salience),
            sequence: activation.sequence,
        };
        state.index.insert(id, key);
        state.queue.insert(key, activation);
        Ok(())
    }

    /// Pending activations in firing order.
    pub fn snapshot(&self) -> Result<Vec<Activation>, AgendaError> {
        let state = self.state.read().map_err(|_| lock_err("group.snapshot"))?;
        Ok(state.queue.values().cloned().collect())
    }

    /// Drop every pending activation, returning how many were removed.
    pub fn clear(&self) -> Result<usize, AgendaError> {
        let mut state = self.state.write().map_err(|_| lock_err("group.clear"))?;
        let removed = state.queue.len();
        state.queue.clear();
        state.index.clear();
        Ok(removed)
    }
}

impl AgendaGroup for InMemoryAgendaGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn remove_head(&self) -> Result<Option<Activation>, AgendaError> {
        let mut state = self.state.write().map_err(|_| lock_err("group.remove_head"))?;
        let Some((_, activation)) = state.queue.pop_first() else {
            return Ok(None);
        };
        state.index.remove(&activation.id);
        Ok(Some(activation))
    }

    fn remove(&self, id: ActivationId) -> Result<Option<Activation>, AgendaError> {
        let mut state = self.state.write().map_err(|_| lock_err("group.remove"))?;
        Ok(state.take(id))
    }

    fn peek_head(&self) -> Result<Option<Activation>, AgendaError> {
        let state = self.state.read().map_err(|_| lock_err("group.peek_head"))?;
        Ok(state.queue.values().next().cloned())
    }

    fn len(&self) -> Result<usize, AgendaError> {
        let state = self.state.read().map_err(|_| lock_err("group.len"))?;
        Ok(state.queue.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn act(rule: &str, salience: i32) -> Activation {
        Activation::new(rule, "main", salience).unwrap()
    }

    fn rules(group: &InMemoryAgendaGroup) -> Vec<String> {
        group.snapshot().unwrap().into_iter().map(|a| a.rule).collect()
    }

    #[test]
    fn orders_by_salience_then_fifo() {
        let group = InMemoryAgendaGroup::new("main").unwrap();
        group.insert(act("b", 3)).unwrap();
        group.insert(act("a", 5)).unwrap();
        group.insert(act("c", 3)).unwrap();

        assert_eq!(rules(&group), vec!["a", "b", "c"]);
        assert_eq!(group.peek_head().unwrap().unwrap().rule, "a");
        assert_eq!(group.len().unwrap(), 3);
    }

    #[test]
    fn remove_head_drains_in_order() {
        let group = InMemoryAgendaGroup::new("main").unwrap();
        group.insert(act("low", -1)).unwrap();
        group.insert(act("high", 10)).unwrap();

        assert_eq!(group.remove_head().unwrap().unwrap().rule, "high");
        assert_eq!(group.remove_head().unwrap().unwrap().rule, "low");
        assert!(group.remove_head().unwrap().is_none());
        assert!(group.peek_head().unwrap().is_none());
        assert!(group.is_empty().unwrap());
    }

    #[test]
    fn duplicate_insert_rejected() {
        let group = InMemoryAgendaGroup::new("main").unwrap();
        let a = act("a", 0);
        group.insert(a.clone()).unwrap();
        let err = group.insert(a.clone()).unwrap_err();
        assert!(matches!(err, AgendaError::DuplicateActivation(id) if id == a.id));
        assert_eq!(group.len().unwrap(), 1);
    }

    #[test]
    fn update_salience_resorts_and_keeps_sequence() {
        let group = InMemoryAgendaGroup::new("main").unwrap();
        let a = act("a", 5);
        let b = act("b", 3);
        let c = act("c", 3);
        let c_id = c.id;
        group.insert(a).unwrap();
        group.insert(b).unwrap();
        group.insert(c).unwrap();

        group.update_salience(c_id, 9).unwrap();
        assert_eq!(rules(&group), vec!["c", "a", "b"]);

        group.update_salience(c_id, 3).unwrap();
        assert_eq!(rules(&group), vec!["a", "b", "c"]);

        let missing = ActivationId::new();
        assert!(matches!(
            group.update_salience(missing, 1),
            Err(AgendaError::ActivationNotFound(id)) if id == missing
        ));
    }

    #[test]
    fn remove_and_clear() {
        let group = InMemoryAgendaGroup::new("main").unwrap();
        let a = act("a", 1);
        let a_id = a.id;
        group.insert(a).unwrap();
        group.insert(act("b", 1)).unwrap();

        assert!(group.contains(a_id).unwrap());
        assert_eq!(group.remove(a_id).unwrap().unwrap().rule, "a");
        assert!(!group.contains(a_id).unwrap());
        assert!(group.remove(a_id).unwrap().is_none());

        assert_eq!(group.clear().unwrap(), 1);
        assert!(group.is_empty().unwrap());
    }

    #[test]
    fn foreign_activation_rejected() {
        let group = InMemoryAgendaGroup::new("main").unwrap();
        let stray = Activation::new("r", "other", 0).unwrap();
        let stray_id = stray.id;

        let err = group.insert(stray).unwrap_err();
        assert!(matches!(
            err,
            AgendaError::GroupMismatch { id, ref expected, ref found }
                if id == stray_id && expected == "main" && found == "other"
        ));
        assert!(group.is_empty().unwrap());
    }

    #[test]
    fn blank_name_rejected() {
        assert!(InMemoryAgendaGroup::new(" ").is_err());
    }
}
