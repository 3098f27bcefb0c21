//! Agenda groups: ordered candidate sets of pending activations.
//!
//! The firing loop only consumes the `AgendaGroup` trait. `InMemoryAgendaGroup`
//! is a thread-safe reference implementation for embedded use and tests.

mod memory;
mod traits;

pub use memory::InMemoryAgendaGroup;
pub use traits::{AgendaError, AgendaGroup};
