//! # salience - agenda-group firing for forward-chaining rule engines
//!
//! Given a pool of already-matched rule activations for a named agenda group,
//! salience repeatedly selects the next activation, fires its consequence,
//! flushes the fact-base effects of that firing back into the agenda, and
//! repeats until the group is empty, a fire limit is reached, or evaluation is
//! halted.
//!
//! ## Core Concepts
//!
//! - **Activation**: a fully matched rule instance, ordered by salience
//! - **Agenda group**: the ordered candidate set one evaluator drains
//! - **Selection policy**: destructive (sequential) or re-peekable (reconsider)
//! - **Session**: configuration, execution contexts, query refresh and the
//!   propagation flush run after every firing
//! - **Halt / fire limit**: cooperative stop conditions checked between firings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use salience::{
//!     Activation, AgendaEvaluator, ConsequenceExecutor, FireLimit, GroupEvaluator,
//!     InMemorySession, RuleBaseConfig,
//! };
//!
//! let session = Arc::new(InMemorySession::new(RuleBaseConfig::default()));
//! let group = session.register_group("main")?;
//! let executor = Arc::new(ConsequenceExecutor::new(Arc::clone(&session)));
//! executor.register_fn("greet", |a, _ctx, _session| {
//!     println!("hello from {}", a.rule);
//!     Ok(())
//! })?;
//!
//! group.insert(Activation::new("greet", "main", 10)?)?;
//!
//! let mut evaluator = AgendaEvaluator::new(session.clone(), executor.clone())?;
//! let fired = evaluator.evaluate_and_fire(group.as_ref(), None, 0, FireLimit::Unlimited)?;
//! assert_eq!(fired, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod activation;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod filter;
pub mod group;
pub mod halt;
pub mod limit;
pub mod parallel;
pub mod session;

// Re-export primary types at crate root for convenience
pub use activation::{Activation, ActivationId};
pub use config::RuleBaseConfig;
pub use context::{ContextId, ExecutionContext};
pub use error::{ExecutionError, FireError, FireResult, ValidationError};
pub use evaluator::{AgendaEvaluator, FireOutcome, GroupEvaluator, SelectionPolicy, StopReason};
pub use executor::{Consequence, ConsequenceExecutor, FiringExecutor};
pub use filter::{AcceptAll, AgendaFilter, RuleNameFilter};
pub use group::{AgendaError, AgendaGroup, InMemoryAgendaGroup};
pub use halt::HaltHandle;
pub use limit::FireLimit;
pub use parallel::{GroupFireReport, ParallelFiring};
pub use session::{InMemorySession, PendingEffect, Session};
