//! Request bodies for the order endpoints.

use crate::error::{RestError, RestResult};
use kola_core::{OrdType, OrderSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `POST /order` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub symbol: String,
    pub side: OrderSide,
    #[serde(with = "rust_decimal::serde::float")]
    pub order_qty: Decimal,
    pub ord_type: OrdType,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub price: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub stop_px: Option<Decimal>,
    #[serde(rename = "clOrdID")]
    pub cl_ord_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub exec_inst: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl OrderPayload {
    /// Reject what the exchange would reject anyway.
    pub fn validate(&self) -> RestResult<()> {
        if self.order_qty <= Decimal::ZERO {
            return Err(RestError::InvalidArgument(format!(
                "orderQty must be positive, got {}",
                self.order_qty
            )));
        }
        for (name, value) in [("price", self.price), ("stopPx", self.stop_px)] {
            if value.is_some_and(|v| v <= Decimal::ZERO) {
                return Err(RestError::InvalidArgument(format!(
                    "{name} must be positive"
                )));
            }
        }
        if self.ord_type.has_limit_price() && self.price.is_none() {
            return Err(RestError::InvalidArgument(format!(
                "{} requires a price",
                self.ord_type
            )));
        }
        if self.ord_type.has_stop_price() && self.stop_px.is_none() {
            return Err(RestError::InvalidArgument(format!(
                "{} requires a stopPx",
                self.ord_type
            )));
        }
        Ok(())
    }
}

/// `PUT /order` body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendPayload {
    #[serde(rename = "orderID", default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(rename = "origClOrdID", default, skip_serializing_if = "Option::is_none")]
    pub orig_cl_ord_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub price: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub stop_px: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub order_qty: Option<Decimal>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl AmendPayload {
    pub fn validate(&self) -> RestResult<()> {
        if self.order_id.is_none() && self.orig_cl_ord_id.is_none() {
            return Err(RestError::InvalidArgument(
                "amend needs orderID or origClOrdID".to_string(),
            ));
        }
        let positive = |v: Option<Decimal>| v.is_some_and(|v| v > Decimal::ZERO);
        if !positive(self.price) && !positive(self.stop_px) && !positive(self.order_qty) {
            return Err(RestError::InvalidArgument(
                "amend needs a positive price, stopPx or orderQty".to_string(),
            ));
        }
        Ok(())
    }

    /// Amend the order known by `id`, as client id when it carries `prefix`.
    pub fn for_id(id: &str, prefix: &str) -> Self {
        if id.starts_with(prefix) {
            Self {
                orig_cl_ord_id: Some(id.to_string()),
                ..Self::default()
            }
        } else {
            Self {
                order_id: Some(id.to_string()),
                ..Self::default()
            }
        }
    }
}
