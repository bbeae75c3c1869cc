//! Generic order requests and validation records.
//!
//! Order attempts describe what they want in exchange-neutral terms. Only
//! the dispatcher turns an [`OrderRequest`] into REST payloads.

use crate::policy::ActionKind;
use kola_core::{ClientOrderId, Execution, OrdType, OrderSide, Price, Size};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

// ============================================================================
// OrderIntent
// ============================================================================

/// What to trade. Missing prices are resolved by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub side: OrderSide,
    pub qty: Size,
    pub ord_type: OrdType,
    pub price: Option<Price>,
    pub stop_px: Option<Price>,
    /// Comma separated execution instructions, may name a price type.
    pub exec_inst: String,
    pub cl_ord_id: ClientOrderId,
    pub text: String,
}

impl OrderIntent {
    #[must_use]
    pub fn new(side: OrderSide, qty: Size, ord_type: OrdType, cl_ord_id: ClientOrderId) -> Self {
        Self {
            side,
            qty,
            ord_type,
            price: None,
            stop_px: None,
            exec_inst: String::new(),
            cl_ord_id,
            text: String::new(),
        }
    }

    #[must_use]
    pub fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }

    #[must_use]
    pub fn with_stop_px(mut self, stop_px: Price) -> Self {
        self.stop_px = Some(stop_px);
        self
    }

    #[must_use]
    pub fn with_exec_inst(mut self, exec_inst: impl Into<String>) -> Self {
        self.exec_inst = exec_inst.into();
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

impl fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.side, self.qty, self.ord_type)?;
        if let Some(price) = self.price {
            write!(f, " @{price}")?;
        }
        if let Some(stop_px) = self.stop_px {
            write!(f, " stop {stop_px}")?;
        }
        write!(f, " ({})", self.cl_ord_id)
    }
}

// ============================================================================
// OrderAction / RequestOrigin
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OrderAction {
    /// Place the intent as a new order.
    Place,
    /// Move the live order to `new_price`. The intent's order type decides
    /// whether the limit price, the trigger or both move.
    Amend {
        order_id: Option<String>,
        new_price: Price,
    },
    /// Cancel the intent's order, by exchange id when known.
    Cancel { order_id: Option<String> },
}

impl OrderAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Place => ActionKind::Place,
            Self::Amend { .. } => ActionKind::Amend,
            Self::Cancel { .. } => ActionKind::Cancel,
        }
    }
}

/// Who emitted a request. Trailing stop placements validate on acceptance
/// instead of on fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestOrigin {
    #[default]
    Plain,
    Trailing,
}

// ============================================================================
// OrderRequest
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub action: OrderAction,
    pub intent: OrderIntent,
    pub origin: RequestOrigin,
    /// Overrides the watcher budget chosen from the action.
    pub timeout: Option<Duration>,
}

impl OrderRequest {
    #[must_use]
    pub fn place(intent: OrderIntent) -> Self {
        Self {
            action: OrderAction::Place,
            intent,
            origin: RequestOrigin::Plain,
            timeout: None,
        }
    }

    #[must_use]
    pub fn amend(intent: OrderIntent, order_id: Option<String>, new_price: Price) -> Self {
        Self {
            action: OrderAction::Amend {
                order_id,
                new_price,
            },
            intent,
            origin: RequestOrigin::Plain,
            timeout: None,
        }
    }

    #[must_use]
    pub fn cancel(intent: OrderIntent, order_id: Option<String>) -> Self {
        Self {
            action: OrderAction::Cancel { order_id },
            intent,
            origin: RequestOrigin::Plain,
            timeout: None,
        }
    }

    #[must_use]
    pub fn trailing(mut self) -> Self {
        self.origin = RequestOrigin::Trailing;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cl_ord_id(&self) -> &str {
        self.intent.cl_ord_id.as_str()
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }
}

// ============================================================================
// ValidationRecord
// ============================================================================

/// Outcome handed back to the attempt that submitted a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRecord {
    pub cl_ord_id: String,
    pub action: ActionKind,
    /// Immediate broker reply, `None` when the call never succeeded.
    pub reply: Option<Value>,
    /// Execution row that confirmed the request.
    pub execution: Option<Execution>,
    pub success: bool,
}

impl ValidationRecord {
    /// Negative record for a request the exchange refused.
    pub fn failed(request: &OrderRequest) -> Self {
        Self {
            cl_ord_id: request.cl_ord_id().to_string(),
            action: request.kind(),
            reply: None,
            execution: None,
            success: false,
        }
    }

    /// Exchange order id, from the reply or the confirming execution.
    pub fn order_id(&self) -> Option<String> {
        self.reply
            .as_ref()
            .and_then(|reply| reply.get("orderID"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.execution.as_ref().map(|e| e.order_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kola_core::LegRole;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn intent() -> OrderIntent {
        OrderIntent::new(
            OrderSide::Buy,
            Size::new(dec!(100)),
            OrdType::Limit,
            ClientOrderId::generate("mlk_", "entry", LegRole::Primary),
        )
        .with_price(Price::new(dec!(9500)))
    }

    #[test]
    fn test_request_constructors() {
        let place = OrderRequest::place(intent());
        assert_eq!(place.kind(), ActionKind::Place);
        assert_eq!(place.origin, RequestOrigin::Plain);

        let amend = OrderRequest::amend(intent(), None, Price::new(dec!(9600))).trailing();
        assert_eq!(amend.kind(), ActionKind::Amend);
        assert_eq!(amend.origin, RequestOrigin::Trailing);

        let cancel = OrderRequest::cancel(intent(), None).with_timeout(Duration::from_secs(5));
        assert_eq!(cancel.kind(), ActionKind::Cancel);
        assert_eq!(cancel.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_record_order_id_prefers_reply() {
        let request = OrderRequest::place(intent());
        let mut record = ValidationRecord::failed(&request);
        assert_eq!(record.order_id(), None);

        record.reply = Some(json!({"orderID": "f00d"}));
        assert_eq!(record.order_id().as_deref(), Some("f00d"));
    }
}
