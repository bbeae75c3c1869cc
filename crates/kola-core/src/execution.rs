//! Execution reports as mirrored from the `execution` table.

use crate::order::{ExecType, OrdStatus, OrdType, OrderSide};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Marker the exchange writes into `triggered` once a stop fired.
pub const STOP_TRIGGERED: &str = "StopOrderTriggered";

/// One row of the execution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "clOrdID", default)]
    pub cl_ord_id: String,
    #[serde(default)]
    pub side: Option<OrderSide>,
    #[serde(default)]
    pub order_qty: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stop_px: Option<Decimal>,
    pub exec_type: ExecType,
    #[serde(default)]
    pub ord_type: Option<OrdType>,
    #[serde(default)]
    pub exec_inst: String,
    pub ord_status: OrdStatus,
    #[serde(default)]
    pub triggered: String,
    pub transact_time: DateTime<Utc>,
}

impl Execution {
    pub fn is_triggered(&self) -> bool {
        self.triggered == STOP_TRIGGERED
    }

    /// True when `id` names this order, by exchange id or client id.
    pub fn concerns(&self, id: &str) -> bool {
        self.order_id == id || self.cl_ord_id == id
    }

    /// Decode a raw table row, `None` for rows that are not order executions
    /// (funding, settlement rows carry no side).
    pub fn from_record(record: &serde_json::Map<String, serde_json::Value>) -> Option<Self> {
        serde_json::from_value(serde_json::Value::Object(record.clone())).ok()
    }
}
