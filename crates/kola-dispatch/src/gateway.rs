//! Exchange calls the dispatcher makes.
//!
//! `OrderGateway` returns boxed futures so it can be used as a trait object.
//! [`RestClient`] is the live implementation. [`RecordingGateway`] records
//! calls and, when given a [`StaticMarket`], writes the execution rows the
//! exchange would have produced.

use chrono::{Duration as ChronoDuration, Utc};
use kola_core::{ExecType, Execution, OrdStatus, OrdType, StaticMarket};
use kola_rest::{AmendPayload, BoxFuture, OrderPayload, RestClient, RestError, RestResult};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait OrderGateway: Send + Sync {
    fn place<'a>(&'a self, order: &'a OrderPayload) -> BoxFuture<'a, RestResult<Value>>;

    fn amend<'a>(&'a self, amend: &'a AmendPayload) -> BoxFuture<'a, RestResult<Value>>;

    /// Cancel by client order ids and/or exchange order ids.
    fn cancel(&self, ids: Vec<String>) -> BoxFuture<'_, RestResult<Value>>;
}

pub type DynOrderGateway = Arc<dyn OrderGateway>;

impl OrderGateway for RestClient {
    fn place<'a>(&'a self, order: &'a OrderPayload) -> BoxFuture<'a, RestResult<Value>> {
        Box::pin(RestClient::place(self, order))
    }

    fn amend<'a>(&'a self, amend: &'a AmendPayload) -> BoxFuture<'a, RestResult<Value>> {
        Box::pin(RestClient::amend(self, amend))
    }

    fn cancel(&self, ids: Vec<String>) -> BoxFuture<'_, RestResult<Value>> {
        Box::pin(async move {
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            RestClient::cancel(self, &ids).await
        })
    }
}

// ============================================================================
// RecordingGateway
// ============================================================================

/// One call seen by a [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Place(OrderPayload),
    Amend(AmendPayload),
    Cancel(Vec<String>),
}

/// In-memory gateway for dry runs and tests.
#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    failures: Mutex<VecDeque<RestError>>,
    market: Option<Arc<StaticMarket>>,
    hold_fills: AtomicBool,
    /// exchange order id -> client order id
    orders: Mutex<HashMap<String, String>>,
}

impl RecordingGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write execution rows for every accepted call into `market`.
    #[must_use]
    pub fn with_market(mut self, market: Arc<StaticMarket>) -> Self {
        self.market = Some(market);
        self
    }

    /// Accept placements without filling them.
    pub fn hold_fills(&self, hold: bool) {
        self.hold_fills.store(hold, Ordering::SeqCst);
    }

    /// Fail the next call with `error`. Queued failures are used in order.
    pub fn fail_next(&self, error: RestError) {
        self.failures.lock().push_back(error);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn placements(&self) -> Vec<OrderPayload> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Place(order) => Some(order.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn amendments(&self) -> Vec<AmendPayload> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Amend(amend) => Some(amend.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GatewayCall) -> RestResult<()> {
        self.calls.lock().push(call);
        match self.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn write(
        &self,
        order_id: &str,
        cl_ord_id: &str,
        rows: &[(ExecType, OrdStatus)],
        ord_type: Option<OrdType>,
    ) {
        let Some(market) = &self.market else {
            return;
        };
        let now = Utc::now();
        for (i, (exec_type, ord_status)) in rows.iter().enumerate() {
            market.push_execution(Execution {
                order_id: order_id.to_string(),
                cl_ord_id: cl_ord_id.to_string(),
                side: None,
                order_qty: None,
                price: None,
                stop_px: None,
                exec_type: *exec_type,
                ord_type,
                exec_inst: String::new(),
                ord_status: *ord_status,
                triggered: String::new(),
                transact_time: now + ChronoDuration::milliseconds(i as i64),
            });
        }
    }

    fn resolve(&self, amend: &AmendPayload) -> (String, String) {
        match (&amend.order_id, &amend.orig_cl_ord_id) {
            (Some(order_id), _) => {
                let cl = self.orders.lock().get(order_id).cloned().unwrap_or_default();
                (order_id.clone(), cl)
            }
            (None, Some(cl)) => (format!("ex-{cl}"), cl.clone()),
            (None, None) => (String::new(), String::new()),
        }
    }
}

impl OrderGateway for RecordingGateway {
    fn place<'a>(&'a self, order: &'a OrderPayload) -> BoxFuture<'a, RestResult<Value>> {
        Box::pin(async move {
            self.record(GatewayCall::Place(order.clone()))?;
            let order_id = format!("ex-{}", order.cl_ord_id);
            self.orders
                .lock()
                .insert(order_id.clone(), order.cl_ord_id.clone());

            let mut rows = vec![(ExecType::New, OrdStatus::New)];
            if !order.ord_type.has_stop_price() && !self.hold_fills.load(Ordering::SeqCst) {
                rows.push((ExecType::Trade, OrdStatus::Filled));
            }
            self.write(&order_id, &order.cl_ord_id, &rows, Some(order.ord_type));

            Ok(json!({
                "orderID": order_id,
                "clOrdID": order.cl_ord_id,
                "ordStatus": "New",
            }))
        })
    }

    fn amend<'a>(&'a self, amend: &'a AmendPayload) -> BoxFuture<'a, RestResult<Value>> {
        Box::pin(async move {
            self.record(GatewayCall::Amend(amend.clone()))?;
            let (order_id, cl_ord_id) = self.resolve(amend);
            let rows = [(ExecType::Replaced, OrdStatus::New)];
            self.write(&order_id, &cl_ord_id, &rows, None);
            Ok(json!({
                "orderID": order_id,
                "clOrdID": cl_ord_id,
                "ordStatus": "New",
            }))
        })
    }

    fn cancel(&self, ids: Vec<String>) -> BoxFuture<'_, RestResult<Value>> {
        Box::pin(async move {
            self.record(GatewayCall::Cancel(ids.clone()))?;
            let mut replies = Vec::with_capacity(ids.len());
            for id in &ids {
                let known = self.orders.lock().get(id).cloned();
                let (order_id, cl_ord_id) = match known {
                    Some(cl) => (id.clone(), cl),
                    None => (format!("ex-{id}"), id.clone()),
                };
                let rows = [(ExecType::Canceled, OrdStatus::Canceled)];
                self.write(&order_id, &cl_ord_id, &rows, None);
                replies.push(json!({
                    "orderID": order_id,
                    "clOrdID": cl_ord_id,
                    "ordStatus": "Canceled",
                }));
            }
            Ok(Value::Array(replies))
        })
    }
}
