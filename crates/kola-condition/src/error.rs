//! Condition engine errors.

use kola_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("Expected a low and a high {genre} bound, found {found} predicates")]
    MissingBounds { genre: String, found: usize },

    #[error("Update of {genre} {op} matches {found} predicates")]
    AmbiguousUpdate {
        genre: String,
        op: String,
        found: usize,
    },

    #[error("Value does not fit a {0} predicate")]
    ValueMismatch(String),

    #[error("No reference captured for {0}")]
    NoReference(String),

    #[error("Invalid hook: {0}")]
    InvalidHook(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type ConditionResult<T> = Result<T, ConditionError>;
