//! Precision-safe decimal types for order pricing.
//!
//! Every price sent to the exchange must be an exact multiple of the
//! instrument tick size. Rounding goes through `rust_decimal` with an
//! explicit half-up strategy so that `5.665` at tick `0.01` becomes `5.67`,
//! which binary floats cannot guarantee.

use crate::error::{CoreError, Result};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

/// Round `value` to the nearest multiple of `tick`, ties away from zero.
///
/// A zero tick returns the value untouched.
#[inline]
pub fn round_half_up(value: Decimal, tick: Decimal) -> Decimal {
    if tick.is_zero() {
        return value;
    }
    let steps = (value / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    (steps * tick).normalize()
}

/// Number of decimals carried by a tick size (`0.5` -> 1, `0.01` -> 2, `1` -> 0).
#[inline]
pub fn tick_log(tick: Decimal) -> u32 {
    tick.normalize().scale()
}

/// Parse a fixed-point decimal string.
///
/// Scientific notation (`1e-5`, `2.5E3`) is rejected with
/// [`CoreError::UnsupportedNotation`]: the precision such inputs are meant
/// to carry is not defined.
pub fn parse_fixed(s: &str) -> Result<Decimal> {
    let trimmed = s.trim();
    if trimmed.contains(['e', 'E']) {
        return Err(CoreError::UnsupportedNotation(trimmed.to_string()));
    }
    Ok(Decimal::from_str(trimmed)?)
}

/// Read a decimal out of an exchange JSON field.
///
/// Integers convert exactly. Floats go through the shortest round-trip
/// representation, strings through [`parse_fixed`].
pub fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(Decimal::from_f64)
            }
        }
        serde_json::Value::String(s) => parse_fixed(s).ok(),
        _ => None,
    }
}

/// Price with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Round to the nearest tick, ties away from zero.
    #[inline]
    pub fn round_half_up(&self, tick: Price) -> Self {
        Self(round_half_up(self.0, tick.0))
    }

    /// Percentage change from `base` (`None` when `base` is zero).
    #[inline]
    pub fn pct_from(&self, base: Price) -> Option<Decimal> {
        if base.is_zero() {
            return None;
        }
        Some((self.0 - base.0) / base.0 * Decimal::ONE_HUNDRED)
    }

    /// Lossy conversion used by the statistical parts of the trailing stop.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self(parse_fixed(s)?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Price {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Price {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

/// Order quantity in contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(pub Decimal);

impl Size {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Scale by `factor` and round to whole contracts (ties to even).
    #[inline]
    pub fn scaled(&self, factor: Decimal) -> Self {
        Self((self.0 * factor).round_dp(0))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Size {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self(parse_fixed(s)?))
    }
}

impl From<Decimal> for Size {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}
