//! Mapping from REST failures to dispatcher reactions.

use kola_rest::ErrorKind;
use std::fmt;

/// Request kinds the policy distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Place,
    Amend,
    Cancel,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Amend => "amend",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the dispatcher does with a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Hand the error to the waiting attempt.
    Propagate,
    /// Deliver a negative validation record.
    FailValidation,
    /// Shrink the quantity and submit again, or fail validation when the
    /// shrunk quantity is too small.
    ShrinkAndResubmit,
}

/// Reaction to a `kind` failure on an `action` request.
///
/// An amend hitting an unknown order or status means the order already
/// resolved (filled, triggered or canceled), which is an answer rather
/// than a bug.
pub fn policy_for(kind: ErrorKind, action: ActionKind) -> Policy {
    match (kind, action) {
        (ErrorKind::InvalidOrdStatus | ErrorKind::InvalidOrderId, ActionKind::Amend) => {
            Policy::FailValidation
        }
        (ErrorKind::InvalidOrderQty, _) => Policy::FailValidation,
        (ErrorKind::InsufficientBalance, ActionKind::Place) => Policy::ShrinkAndResubmit,
        (ErrorKind::InsufficientBalance, _) => Policy::FailValidation,
        _ => Policy::Propagate,
    }
}
