//! The dispatcher: sole consumer of the order request channel.
//!
//! For every request it resolves missing prices from the market view,
//! builds the exchange payload, makes the call and spawns a watcher that
//! settles the request into the validation mailbox. Failed calls go
//! through [`policy_for`].

use crate::error::{DispatchError, DispatchResult};
use crate::gateway::DynOrderGateway;
use crate::mailbox::{ValidationMailbox, ValidationReply};
use crate::policy::{policy_for, ActionKind, Policy};
use crate::request::{OrderAction, OrderIntent, OrderRequest, RequestOrigin, ValidationRecord};
use crate::watcher::{success_pairs, Watcher};
use kola_core::{
    stop_price_default, strip_price_exec_inst, DynMarketView, OrdType, OrderSide, Price,
    PriceType,
};
use kola_rest::{AmendPayload, OrderPayload, RestError};
use kola_telemetry::Metrics;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// ============================================================================
// DispatcherConfig
// ============================================================================

fn default_symbol() -> String {
    "XBTUSD".to_string()
}

fn default_prefix() -> String {
    "mlk_".to_string()
}

fn default_step_ms() -> u64 {
    100
}

fn default_market_timeout_secs() -> u64 {
    300
}

fn default_cancel_timeout_secs() -> u64 {
    60
}

fn default_timeout_secs() -> u64 {
    3_600
}

fn default_stop_delta() -> Decimal {
    Decimal::TWO
}

fn default_trail_stop_delta() -> Decimal {
    Decimal::ONE
}

fn default_stop_adjust_ticks() -> u32 {
    2
}

fn default_shrink_factor() -> Decimal {
    Decimal::new(8, 1)
}

fn default_min_order_qty() -> Decimal {
    Decimal::from(31)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_prefix")]
    pub order_id_prefix: String,
    /// Watcher polling step.
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
    /// Validation budget for Market placements.
    #[serde(default = "default_market_timeout_secs")]
    pub market_timeout_secs: u64,
    #[serde(default = "default_cancel_timeout_secs")]
    pub cancel_timeout_secs: u64,
    /// Validation budget for everything else.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Distance between a limit price and its default trigger.
    #[serde(default = "default_stop_delta")]
    pub stop_delta: Decimal,
    /// Same distance for the limit-type stops of a trailing leg.
    #[serde(default = "default_trail_stop_delta")]
    pub trail_stop_delta: Decimal,
    /// Ticks a wrong-side stop is moved beyond the execution price.
    #[serde(default = "default_stop_adjust_ticks")]
    pub stop_adjust_ticks: u32,
    #[serde(default = "default_shrink_factor")]
    pub shrink_factor: Decimal,
    /// Smallest quantity worth resubmitting after a shrink.
    #[serde(default = "default_min_order_qty")]
    pub min_order_qty: Decimal,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            order_id_prefix: default_prefix(),
            step_ms: default_step_ms(),
            market_timeout_secs: default_market_timeout_secs(),
            cancel_timeout_secs: default_cancel_timeout_secs(),
            default_timeout_secs: default_timeout_secs(),
            stop_delta: default_stop_delta(),
            trail_stop_delta: default_trail_stop_delta(),
            stop_adjust_ticks: default_stop_adjust_ticks(),
            shrink_factor: default_shrink_factor(),
            min_order_qty: default_min_order_qty(),
        }
    }
}

impl DispatcherConfig {
    /// Limit-to-trigger distance for requests from `origin`.
    pub fn stop_delta_for(&self, origin: RequestOrigin) -> Decimal {
        match origin {
            RequestOrigin::Plain => self.stop_delta,
            RequestOrigin::Trailing => self.trail_stop_delta,
        }
    }

    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    /// Watcher budget for a request without an explicit timeout.
    pub fn budget_for(&self, request: &OrderRequest) -> Duration {
        if let Some(timeout) = request.timeout {
            return timeout;
        }
        let secs = match (request.kind(), request.intent.ord_type) {
            (ActionKind::Place, OrdType::Market) => self.market_timeout_secs,
            (ActionKind::Cancel, _) => self.cancel_timeout_secs,
            _ => self.default_timeout_secs,
        };
        Duration::from_secs(secs)
    }
}

// ============================================================================
// DispatchHandle
// ============================================================================

/// Submission side of the dispatcher, cheap to clone.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<OrderRequest>,
    mailbox: Arc<ValidationMailbox>,
    prefix: String,
}

impl DispatchHandle {
    /// Submit `request` and wait for its validation record.
    pub async fn submit(&self, request: OrderRequest) -> DispatchResult<ValidationRecord> {
        let cl_ord_id = request.cl_ord_id().to_string();
        let rx = self.mailbox.register(&cl_ord_id);
        if self.tx.send(request).is_err() {
            self.mailbox.forget(&cl_ord_id);
            return Err(DispatchError::ChannelClosed);
        }
        rx.await.map_err(|_| DispatchError::ChannelClosed)?
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn mailbox(&self) -> &Arc<ValidationMailbox> {
        &self.mailbox
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Exchange call derived from a request.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    Place(OrderPayload),
    /// The first amend decides the outcome, the rest are best effort.
    Amend(Vec<AmendPayload>),
    Cancel(Vec<String>),
}

pub struct Dispatcher {
    config: DispatcherConfig,
    gateway: DynOrderGateway,
    view: DynMarketView,
    mailbox: Arc<ValidationMailbox>,
    rx: mpsc::UnboundedReceiver<OrderRequest>,
    /// Resubmissions after a shrink go back through the channel.
    tx: mpsc::UnboundedSender<OrderRequest>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        config: DispatcherConfig,
        gateway: DynOrderGateway,
        view: DynMarketView,
        shutdown: CancellationToken,
    ) -> (Self, DispatchHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mailbox = Arc::new(ValidationMailbox::new());
        let handle = DispatchHandle {
            tx: tx.clone(),
            mailbox: Arc::clone(&mailbox),
            prefix: config.order_id_prefix.clone(),
        };
        let dispatcher = Self {
            config,
            gateway,
            view,
            mailbox,
            rx,
            tx,
            shutdown,
        };
        (dispatcher, handle)
    }

    /// Consume requests until shutdown.
    pub async fn run(mut self) {
        info!(symbol = %self.config.symbol, "Dispatcher started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                request = self.rx.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
            }
        }
        self.rx.close();
        while let Ok(request) = self.rx.try_recv() {
            self.settle(request.cl_ord_id(), Err(DispatchError::ChannelClosed));
        }
        info!(pending = self.mailbox.pending_count(), "Dispatcher stopped");
    }

    async fn handle(&self, request: OrderRequest) {
        let kind = request.kind();
        Metrics::request_dispatched(kind.as_str());
        debug!(
            cl_ord_id = request.cl_ord_id(),
            action = %kind,
            intent = %request.intent,
            "Dispatching"
        );

        let call = match self.prepare(&request) {
            Ok(call) => call,
            Err(e) => {
                error!(cl_ord_id = request.cl_ord_id(), error = %e, "Request rejected before sending");
                Metrics::validation("error");
                self.settle(request.cl_ord_id(), Err(e));
                return;
            }
        };

        let pairs = success_pairs(kind, request.intent.ord_type, request.origin);
        let mut watcher = Watcher::new(
            Arc::clone(&self.view),
            watch_ids(&request),
            pairs,
            self.config.step(),
        );

        match self.execute(&request, call).await {
            Ok(reply) => {
                for order_id in reply_order_ids(&reply) {
                    watcher.add_id(order_id);
                }
                self.spawn_watch(&request, reply, watcher);
            }
            Err(e) => self.on_failure(request, e),
        }
    }

    fn spawn_watch(&self, request: &OrderRequest, reply: Value, watcher: Watcher) {
        let deadline = Instant::now() + self.config.budget_for(request);
        let mailbox = Arc::clone(&self.mailbox);
        let cancel = self.shutdown.child_token();
        let cl_ord_id = request.cl_ord_id().to_string();
        let action = request.kind();

        tokio::spawn(async move {
            let outcome = watcher.watch(deadline, cancel).await;
            let error_marker = reply.get("error").is_some();
            let success = !error_marker && outcome.as_ref().is_some_and(|o| o.confirmed);
            Metrics::validation(if success { "success" } else { "failed" });
            info!(cl_ord_id = %cl_ord_id, action = %action, success, "Validation settled");

            let record = ValidationRecord {
                cl_ord_id: cl_ord_id.clone(),
                action,
                reply: Some(reply),
                execution: outcome.map(|o| o.execution),
                success,
            };
            mailbox.deliver(&cl_ord_id, Ok(record));
        });
    }

    fn on_failure(&self, mut request: OrderRequest, e: RestError) {
        let cl_ord_id = request.cl_ord_id().to_string();
        match policy_for(e.kind(), request.kind()) {
            Policy::Propagate => {
                error!(
                    cl_ord_id = %cl_ord_id,
                    pending = %request.intent,
                    error = %e,
                    "Request failed"
                );
                Metrics::validation("error");
                self.settle(&cl_ord_id, Err(e.into()));
            }
            Policy::FailValidation => {
                warn!(cl_ord_id = %cl_ord_id, error = %e, "Request refused, failing validation");
                Metrics::validation("failed");
                self.settle(&cl_ord_id, Ok(ValidationRecord::failed(&request)));
            }
            Policy::ShrinkAndResubmit => {
                let reduced = request.intent.qty.scaled(self.config.shrink_factor);
                if reduced.inner() < self.config.min_order_qty {
                    warn!(
                        cl_ord_id = %cl_ord_id,
                        qty = %reduced,
                        min = %self.config.min_order_qty,
                        "Shrunk quantity too small, failing validation"
                    );
                    Metrics::validation("failed");
                    self.settle(&cl_ord_id, Ok(ValidationRecord::failed(&request)));
                    return;
                }
                warn!(
                    cl_ord_id = %cl_ord_id,
                    from = %request.intent.qty,
                    to = %reduced,
                    "Insufficient balance, resubmitting smaller"
                );
                request.intent.qty = reduced;
                if self.tx.send(request).is_err() {
                    self.settle(&cl_ord_id, Err(DispatchError::ChannelClosed));
                }
            }
        }
    }

    fn settle(&self, cl_ord_id: &str, reply: ValidationReply) {
        self.mailbox.deliver(cl_ord_id, reply);
    }

    async fn execute(&self, request: &OrderRequest, call: Call) -> Result<Value, RestError> {
        match call {
            Call::Place(order) => self.gateway.place(&order).await,
            Call::Amend(amends) => {
                let mut replies = Vec::with_capacity(amends.len());
                for (i, amend) in amends.iter().enumerate() {
                    match self.gateway.amend(amend).await {
                        Ok(reply) => replies.push(reply),
                        Err(e) if i == 0 => return Err(e),
                        Err(e) => warn!(
                            cl_ord_id = request.cl_ord_id(),
                            error = %e,
                            "Follow-up amend failed"
                        ),
                    }
                }
                Ok(replies.into_iter().next().unwrap_or(Value::Null))
            }
            Call::Cancel(ids) => self.gateway.cancel(ids).await,
        }
    }

    // ------------------------------------------------------------------------
    // Payload construction
    // ------------------------------------------------------------------------

    fn prepare(&self, request: &OrderRequest) -> DispatchResult<Call> {
        match &request.action {
            OrderAction::Place => self
                .place_payload(&request.intent, request.origin)
                .map(Call::Place),
            OrderAction::Amend {
                order_id,
                new_price,
            } => self
                .amend_payloads(&request.intent, request.origin, order_id.as_deref(), *new_price)
                .map(Call::Amend),
            OrderAction::Cancel { order_id } => {
                let id = order_id
                    .clone()
                    .unwrap_or_else(|| request.intent.cl_ord_id.to_string());
                Ok(Call::Cancel(vec![id]))
            }
        }
    }

    fn tick(&self) -> Price {
        self.view.tick_size().unwrap_or(Price::ZERO)
    }

    /// Price an order with no explicit price is placed at: the price type
    /// named in `execInst`, else what a taker on its side would get.
    fn default_price(&self, intent: &OrderIntent) -> DispatchResult<Price> {
        let named = intent
            .exec_inst
            .split(',')
            .find_map(|inst| inst.trim().parse::<PriceType>().ok());
        let price = match named {
            Some(pt) => self.view.price(pt, Some(intent.side)),
            None => self.view.execution_price(intent.side),
        };
        price
            .map(|p| p.round_half_up(self.tick()))
            .ok_or_else(|| DispatchError::NoMarketPrice(intent.to_string()))
    }

    fn place_payload(
        &self,
        intent: &OrderIntent,
        origin: RequestOrigin,
    ) -> DispatchResult<OrderPayload> {
        let tick = self.tick();
        let ord_type = intent.ord_type;
        if !intent.qty.is_positive() {
            return Err(DispatchError::MissingField {
                field: "orderQty",
                ord_type: ord_type.to_string(),
            });
        }

        let mut price = intent.price.map(|p| p.round_half_up(tick));
        let mut stop_px = intent.stop_px.map(|p| p.round_half_up(tick));

        if ord_type.has_limit_price() && price.is_none() {
            price = Some(self.default_price(intent)?);
        }
        if ord_type.has_stop_price() && stop_px.is_none() {
            let base = match price {
                Some(p) => p,
                None => self.default_price(intent)?,
            };
            stop_px = Some(
                stop_price_default(base, intent.side, self.config.stop_delta_for(origin))
                    .round_half_up(tick),
            );
        }
        if ord_type == OrdType::Stop {
            stop_px = stop_px.map(|s| self.correct_stop_side(intent, s));
        }
        if !ord_type.has_limit_price() {
            price = None;
        }

        let exec_inst = match ord_type {
            OrdType::Market | OrdType::Limit => strip_price_exec_inst(&intent.exec_inst, false),
            _ => strip_price_exec_inst(&intent.exec_inst, true),
        };

        let payload = OrderPayload {
            symbol: self.config.symbol.clone(),
            side: intent.side,
            order_qty: intent.qty.inner(),
            ord_type,
            price: price.map(|p| p.inner()),
            stop_px: stop_px.map(|p| p.inner()),
            cl_ord_id: intent.cl_ord_id.to_string(),
            exec_inst,
            text: intent.text.clone(),
        };
        payload.validate()?;
        Ok(payload)
    }

    /// A stop already through the market would fire at once. Move it
    /// `stop_adjust_ticks` beyond the execution price instead.
    fn correct_stop_side(&self, intent: &OrderIntent, stop_px: Price) -> Price {
        let Some(market) = self.view.execution_price(intent.side) else {
            return stop_px;
        };
        let offset = self.tick().inner() * Decimal::from(self.config.stop_adjust_ticks);
        let corrected = match intent.side {
            OrderSide::Buy if stop_px <= market => Price::new(market.inner() + offset),
            OrderSide::Sell if stop_px >= market => Price::new(market.inner() - offset),
            _ => return stop_px,
        };
        warn!(
            cl_ord_id = %intent.cl_ord_id,
            side = %intent.side,
            stop_px = %stop_px,
            market = %market,
            corrected = %corrected,
            "Stop on the wrong side of the market, adjusted"
        );
        corrected
    }

    fn amend_payloads(
        &self,
        intent: &OrderIntent,
        origin: RequestOrigin,
        order_id: Option<&str>,
        new_price: Price,
    ) -> DispatchResult<Vec<AmendPayload>> {
        let target = order_id.unwrap_or(intent.cl_ord_id.as_str());
        let base = AmendPayload::for_id(target, &self.config.order_id_prefix);
        let new_price = new_price.round_half_up(self.tick());

        let amends = match intent.ord_type {
            OrdType::Market => {
                return Err(DispatchError::InvalidAction(format!(
                    "cannot amend Market order {target}"
                )))
            }
            OrdType::Limit => vec![AmendPayload {
                price: Some(new_price.inner()),
                ..base
            }],
            OrdType::Stop | OrdType::MarketIfTouched => vec![AmendPayload {
                stop_px: Some(new_price.inner()),
                ..base
            }],
            OrdType::StopLimit | OrdType::LimitIfTouched => {
                let delta = self.config.stop_delta_for(origin);
                let stop_px = stop_price_default(new_price, intent.side, delta)
                    .round_half_up(self.tick());
                vec![
                    AmendPayload {
                        price: Some(new_price.inner()),
                        ..base.clone()
                    },
                    AmendPayload {
                        stop_px: Some(stop_px.inner()),
                        ..base
                    },
                ]
            }
        };
        for amend in &amends {
            amend.validate()?;
        }
        Ok(amends)
    }
}

/// Ids an execution row may carry for this request.
fn watch_ids(request: &OrderRequest) -> Vec<String> {
    let mut ids = vec![request.intent.cl_ord_id.to_string()];
    let explicit = match &request.action {
        OrderAction::Amend { order_id, .. } | OrderAction::Cancel { order_id } => order_id.clone(),
        OrderAction::Place => None,
    };
    if let Some(id) = explicit {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// `orderID` fields of a reply object or array.
fn reply_order_ids(reply: &Value) -> Vec<String> {
    let order_id = |v: &Value| v.get("orderID").and_then(Value::as_str).map(str::to_string);
    match reply {
        Value::Array(items) => items.iter().filter_map(order_id).collect(),
        other => order_id(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RecordingGateway;
    use kola_core::{ClientOrderId, LegRole, Size, StaticMarket};
    use rust_decimal_macros::dec;

    fn dispatcher_with(market: Arc<StaticMarket>) -> Dispatcher {
        let (dispatcher, _handle) = Dispatcher::new(
            DispatcherConfig::default(),
            Arc::new(RecordingGateway::new()),
            market,
            CancellationToken::new(),
        );
        dispatcher
    }

    fn market() -> Arc<StaticMarket> {
        let market = StaticMarket::new(Price::new(dec!(0.5)));
        market.set_all_prices(Price::new(dec!(10000)));
        market.set_price(PriceType::BidPrice, Price::new(dec!(9999.5)));
        market.set_price(PriceType::AskPrice, Price::new(dec!(10000.5)));
        market.set_price(PriceType::MarkPrice, Price::new(dec!(10003.2)));
        Arc::new(market)
    }

    fn intent(side: OrderSide, ord_type: OrdType) -> OrderIntent {
        OrderIntent::new(
            side,
            Size::new(dec!(100)),
            ord_type,
            ClientOrderId::generate("mlk_", "entry", LegRole::Primary),
        )
    }

    #[test]
    fn test_default_price_from_exec_inst_or_book() {
        let dispatcher = dispatcher_with(market());

        let limit = intent(OrderSide::Buy, OrdType::Limit);
        assert_eq!(
            dispatcher.default_price(&limit).unwrap(),
            Price::new(dec!(10000.5))
        );

        let marked = intent(OrderSide::Buy, OrdType::Limit).with_exec_inst("MarkPrice");
        assert_eq!(
            dispatcher.default_price(&marked).unwrap(),
            Price::new(dec!(10003))
        );
    }

    #[test]
    fn test_market_payload_strips_price_instructions() {
        let dispatcher = dispatcher_with(market());
        let order = intent(OrderSide::Sell, OrdType::Market)
            .with_price(Price::new(dec!(9000)))
            .with_exec_inst("MarkPrice,ReduceOnly");

        let payload = dispatcher.place_payload(&order, RequestOrigin::Plain).unwrap();
        assert_eq!(payload.price, None);
        assert_eq!(payload.stop_px, None);
        assert_eq!(payload.exec_inst, "ReduceOnly");
    }

    #[test]
    fn test_stop_limit_defaults_trigger_from_price() {
        let dispatcher = dispatcher_with(market());
        let order = intent(OrderSide::Sell, OrdType::StopLimit)
            .with_price(Price::new(dec!(9900.26)))
            .with_exec_inst("LastPrice,lastMidPrice");

        let payload = dispatcher.place_payload(&order, RequestOrigin::Plain).unwrap();
        assert_eq!(payload.price, Some(dec!(9900.5)));
        assert_eq!(payload.stop_px, Some(dec!(9898.5)));
        assert_eq!(payload.exec_inst, "LastPrice");
    }

    #[test]
    fn test_trailing_stop_limit_uses_trail_delta() {
        let dispatcher = dispatcher_with(market());
        let order = intent(OrderSide::Sell, OrdType::StopLimit).with_price(Price::new(dec!(9950)));

        let placed = dispatcher
            .place_payload(&order, RequestOrigin::Trailing)
            .unwrap();
        assert_eq!(placed.price, Some(dec!(9950)));
        assert_eq!(placed.stop_px, Some(dec!(9949)));

        let amends = dispatcher
            .amend_payloads(&order, RequestOrigin::Trailing, Some("f00d"), Price::new(dec!(9960)))
            .unwrap();
        assert_eq!(amends[1].stop_px, Some(dec!(9959)));
    }

    #[test]
    fn test_wrong_side_stop_is_moved_beyond_market() {
        let dispatcher = dispatcher_with(market());
        let order = intent(OrderSide::Sell, OrdType::Stop).with_stop_px(Price::new(dec!(10100)));

        let payload = dispatcher.place_payload(&order, RequestOrigin::Plain).unwrap();
        assert_eq!(payload.stop_px, Some(dec!(9998.5)));

        let fine = intent(OrderSide::Sell, OrdType::Stop).with_stop_px(Price::new(dec!(9900)));
        assert_eq!(
            dispatcher.place_payload(&fine, RequestOrigin::Plain).unwrap().stop_px,
            Some(dec!(9900))
        );
    }

    #[test]
    fn test_missing_market_price_is_reported() {
        let market = Arc::new(StaticMarket::new(Price::new(dec!(0.5))));
        let dispatcher = dispatcher_with(market);
        let order = intent(OrderSide::Buy, OrdType::Limit);

        assert!(matches!(
            dispatcher.place_payload(&order, RequestOrigin::Plain),
            Err(DispatchError::NoMarketPrice(_))
        ));
    }

    #[test]
    fn test_stop_limit_amend_moves_price_then_trigger() {
        let dispatcher = dispatcher_with(market());
        let order = intent(OrderSide::Buy, OrdType::StopLimit);

        let amends = dispatcher
            .amend_payloads(&order, RequestOrigin::Plain, Some("f00d"), Price::new(dec!(10050.2)))
            .unwrap();
        assert_eq!(amends.len(), 2);
        assert_eq!(amends[0].order_id.as_deref(), Some("f00d"));
        assert_eq!(amends[0].price, Some(dec!(10050)));
        assert_eq!(amends[1].stop_px, Some(dec!(10052)));

        let market_order = intent(OrderSide::Buy, OrdType::Market);
        assert!(dispatcher
            .amend_payloads(&market_order, RequestOrigin::Plain, None, Price::new(dec!(1)))
            .is_err());
    }

    #[test]
    fn test_budget_by_request_kind() {
        let config = DispatcherConfig::default();
        let market = OrderRequest::place(intent(OrderSide::Buy, OrdType::Market));
        let limit = OrderRequest::place(intent(OrderSide::Buy, OrdType::Limit));
        let cancel = OrderRequest::cancel(intent(OrderSide::Buy, OrdType::Limit), None);

        assert_eq!(config.budget_for(&market), Duration::from_secs(300));
        assert_eq!(config.budget_for(&limit), Duration::from_secs(3_600));
        assert_eq!(config.budget_for(&cancel), Duration::from_secs(60));
        assert_eq!(
            config.budget_for(&limit.with_timeout(Duration::from_secs(1))),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_reply_order_ids() {
        let single = serde_json::json!({"orderID": "a"});
        let many = serde_json::json!([{"orderID": "a"}, {"orderID": "b"}]);
        assert_eq!(reply_order_ids(&single), vec!["a"]);
        assert_eq!(reply_order_ids(&many), vec!["a", "b"]);
        assert!(reply_order_ids(&Value::Null).is_empty());
    }
}
