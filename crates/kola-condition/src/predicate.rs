//! Predicate building blocks.

use crate::error::{ConditionError, ConditionResult};
use chrono::{DateTime, Utc};
use kola_core::{Execution, OrdStatus, Price, PriceType, SourceKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    /// `current <op> target`.
    pub fn apply<T: PartialOrd>(&self, current: &T, target: &T) -> bool {
        match self {
            Self::Lt => current < target,
            Self::Gt => current > target,
            Self::Eq => current == target,
            Self::Ne => current != target,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<" => Ok(Self::Lt),
            ">" => Ok(Self::Gt),
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            other => Err(ConditionError::InvalidOperator(other.to_string())),
        }
    }
}

/// What a hooked source order must have reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookTarget {
    Status(OrdStatus),
    /// The stop fired, read from the `triggered` marker.
    Triggered,
}

impl HookTarget {
    /// Letter codes: `N`, `C`, `F`, `P` for statuses and `T` for triggered.
    pub fn from_letter(letter: char) -> Option<Self> {
        if letter == 'T' {
            return Some(Self::Triggered);
        }
        OrdStatus::from_letter(letter).map(Self::Status)
    }

    pub fn matches(&self, execution: &Execution) -> bool {
        match self {
            Self::Status(status) => execution.ord_status == *status,
            Self::Triggered => execution.is_triggered(),
        }
    }
}

impl fmt::Display for HookTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Triggered => f.write_str("Triggered"),
        }
    }
}

/// Textual hook reference `<name>-<role>_<letter>`, e.g. `entry-P_F`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookSpec {
    pub source: SourceKey,
    pub target: HookTarget,
}

impl FromStr for HookSpec {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConditionError::InvalidHook(s.to_string());
        let (source, letter) = s.rsplit_once('_').ok_or_else(invalid)?;
        let mut chars = letter.chars();
        let target = match (chars.next(), chars.next()) {
            (Some(c), None) => HookTarget::from_letter(c).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        };
        let source = source.parse::<SourceKey>().map_err(|_| invalid())?;
        Ok(Self { source, target })
    }
}

impl fmt::Display for HookSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self.target {
            HookTarget::Triggered => 'T',
            HookTarget::Status(OrdStatus::New) => 'N',
            HookTarget::Status(OrdStatus::Canceled) => 'C',
            HookTarget::Status(OrdStatus::PartiallyFilled) => 'P',
            HookTarget::Status(_) => 'F',
        };
        write!(f, "{}_{letter}", self.source)
    }
}

/// Genre of a predicate, used to address predicates for updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Genre {
    Price(PriceType),
    Time,
    Hook,
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Price(pt) => write!(f, "{pt}"),
            Self::Time => f.write_str("time"),
            Self::Hook => f.write_str("hook"),
        }
    }
}

/// Replacement value for [`crate::Condition::update_value`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PredicateValue {
    Price(Price),
    Time(DateTime<Utc>),
}

/// One predicate of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Price {
        price_type: PriceType,
        op: Operator,
        value: Price,
    },
    Time {
        op: Operator,
        value: DateTime<Utc>,
    },
    Hook {
        source: SourceKey,
        target: HookTarget,
    },
}

impl Predicate {
    pub fn genre(&self) -> Genre {
        match self {
            Self::Price { price_type, .. } => Genre::Price(*price_type),
            Self::Time { .. } => Genre::Time,
            Self::Hook { .. } => Genre::Hook,
        }
    }

    /// Operator, `None` for hooks.
    pub fn op(&self) -> Option<Operator> {
        match self {
            Self::Price { op, .. } | Self::Time { op, .. } => Some(*op),
            Self::Hook { .. } => None,
        }
    }

    pub fn is_hook(&self) -> bool {
        matches!(self, Self::Hook { .. })
    }

    pub(crate) fn set_value(&mut self, new: PredicateValue) -> ConditionResult<()> {
        match (self, new) {
            (Self::Price { value, .. }, PredicateValue::Price(p)) => *value = p,
            (Self::Time { value, .. }, PredicateValue::Time(t)) => *value = t,
            (other, _) => return Err(ConditionError::ValueMismatch(other.genre().to_string())),
        }
        Ok(())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Price {
                price_type,
                op,
                value,
            } => write!(f, "{price_type} {op} {value}"),
            Self::Time { op, value } => write!(f, "time {op} {}", value.format("%H:%M:%S")),
            Self::Hook { source, target } => write!(f, "hook {source} is {target}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kola_core::LegRole;
    use rust_decimal_macros::dec;

    #[test]
    fn test_operator_apply() {
        assert!(Operator::Lt.apply(&dec!(99), &dec!(100)));
        assert!(!Operator::Lt.apply(&dec!(100), &dec!(100)));
        assert!(Operator::Gt.apply(&dec!(101), &dec!(100)));
        assert!(Operator::Eq.apply(&dec!(100), &dec!(100.0)));
        assert!(Operator::Ne.apply(&dec!(1), &dec!(2)));
        assert!("<>".parse::<Operator>().is_err());
    }

    #[test]
    fn test_hook_spec_parsing() {
        let spec: HookSpec = "entry-P_F".parse().unwrap();
        assert_eq!(spec.source, SourceKey::new("entry", LegRole::Primary));
        assert_eq!(spec.target, HookTarget::Status(OrdStatus::Filled));
        assert_eq!(spec.to_string(), "entry-P_F");

        let spec: HookSpec = "stop_leg-S_T".parse().unwrap();
        assert_eq!(spec.source.name, "stop_leg");
        assert_eq!(spec.target, HookTarget::Triggered);

        assert!("entry-P".parse::<HookSpec>().is_err());
        assert!("entry-P_X".parse::<HookSpec>().is_err());
        assert!("entry_F".parse::<HookSpec>().is_err());
    }

    #[test]
    fn test_set_value_checks_genre() {
        let mut pred = Predicate::Price {
            price_type: PriceType::LastPrice,
            op: Operator::Lt,
            value: Price::new(dec!(100)),
        };
        assert!(pred.set_value(PredicateValue::Price(Price::new(dec!(90)))).is_ok());
        assert!(pred.set_value(PredicateValue::Time(Utc::now())).is_err());
    }
}
