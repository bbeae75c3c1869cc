//! Predicate constructors for the usual condition shapes.

use crate::predicate::{HookTarget, Operator, Predicate};
use chrono::{DateTime, Utc};
use kola_core::{Price, PriceType, SourceKey};

/// `start < now < end`.
pub fn time_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Predicate> {
    vec![
        Predicate::Time {
            op: Operator::Gt,
            value: start,
        },
        Predicate::Time {
            op: Operator::Lt,
            value: end,
        },
    ]
}

/// `low < price < high`.
pub fn price_window(price_type: PriceType, low: Price, high: Price) -> Vec<Predicate> {
    vec![
        Predicate::Price {
            price_type,
            op: Operator::Gt,
            value: low,
        },
        Predicate::Price {
            price_type,
            op: Operator::Lt,
            value: high,
        },
    ]
}

pub fn hook(source: SourceKey, target: HookTarget) -> Vec<Predicate> {
    vec![Predicate::Hook { source, target }]
}

/// No predicate at all.
pub fn always() -> Vec<Predicate> {
    Vec::new()
}
