//! Condition engine for kola.
//!
//! - `Predicate`: price, time and hook predicates
//! - `Condition`: AND of predicates with sticky hook resolution,
//!   early time-out detection and window rebasing
//! - `builder`: window and hook constructors

pub mod builder;
pub mod condition;
pub mod error;
pub mod predicate;

pub use builder::{always, hook, price_window, time_window};
pub use condition::{Condition, Rebased, Reference};
pub use error::{ConditionError, ConditionResult};
pub use predicate::{Genre, HookSpec, HookTarget, Operator, Predicate, PredicateValue};
