//! Signed REST client.
//!
//! Every call is throttled, signed and sent through the transport. The
//! response is classified (see [`crate::classify`]) and transient failures
//! are retried with the tiered [`RetryPolicy`] until the shared attempt
//! counter exceeds `max_retries`.

use crate::classify::{classify, error_message, Verdict};
use crate::error::{RestError, RestResult};
use crate::payload::{AmendPayload, OrderPayload};
use crate::retry::{RetryPolicy, RetryState};
use crate::transport::{DynHttpTransport, HttpRequest, ReqwestTransport, Verb};
use kola_core::auth::expires_at;
use kola_core::{split_ids, Credentials, OpenOrderSource};
use kola_telemetry::Metrics;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub const TESTNET_URL: &str = "https://testnet.bitmex.com/api/v1/";
pub const LIVE_URL: &str = "https://www.bitmex.com/api/v1/";

/// Longest accepted client order id prefix.
pub const MAX_PREFIX_LEN: usize = 13;

fn default_timeout_ms() -> u64 {
    12_000
}

fn default_single_pause_ms() -> u64 {
    1_500
}

fn default_bulk_pause_ms() -> u64 {
    300
}

fn default_expires_ttl_secs() -> i64 {
    60
}

/// REST client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub order_id_prefix: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Minimum pause between two single-order calls.
    #[serde(default = "default_single_pause_ms")]
    pub single_pause_ms: u64,
    /// Minimum pause between two bulk calls.
    #[serde(default = "default_bulk_pause_ms")]
    pub bulk_pause_ms: u64,
    #[serde(default = "default_expires_ttl_secs")]
    pub expires_ttl_secs: i64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: TESTNET_URL.to_string(),
            symbol: "XBTUSD".to_string(),
            order_id_prefix: "mlk_".to_string(),
            timeout_ms: default_timeout_ms(),
            single_pause_ms: default_single_pause_ms(),
            bulk_pause_ms: default_bulk_pause_ms(),
            expires_ttl_secs: default_expires_ttl_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

/// One dispatch outcome.
enum Step {
    Done(Value),
    Retry(&'static str, RestError),
    RateLimited(Option<i64>),
}

pub struct RestClient {
    config: RestConfig,
    credentials: Option<Credentials>,
    transport: DynHttpTransport,
    retry: RetryState,
    closed: AtomicBool,
    open_orders: Option<Arc<dyn OpenOrderSource>>,
    /// Send slot reserved by the latest throttled call.
    next_slot: Mutex<Option<Instant>>,
}

impl RestClient {
    /// Client over reqwest.
    pub fn new(config: RestConfig, credentials: Option<Credentials>) -> RestResult<Self> {
        let transport = ReqwestTransport::new(Duration::from_millis(config.timeout_ms))?;
        Self::with_transport(config, credentials, Arc::new(transport))
    }

    pub fn with_transport(
        config: RestConfig,
        credentials: Option<Credentials>,
        transport: DynHttpTransport,
    ) -> RestResult<Self> {
        if config.order_id_prefix.len() > MAX_PREFIX_LEN {
            return Err(RestError::InvalidArgument(format!(
                "order id prefix '{}' longer than {MAX_PREFIX_LEN} characters",
                config.order_id_prefix
            )));
        }
        reqwest::Url::parse(&config.base_url)
            .map_err(|e| RestError::InvalidArgument(format!("base url: {e}")))?;

        Ok(Self {
            config,
            credentials,
            transport,
            retry: RetryState::default(),
            closed: AtomicBool::new(false),
            open_orders: None,
            next_slot: Mutex::new(None),
        })
    }

    /// Orders canceled when the rate limit is hit.
    #[must_use]
    pub fn with_open_orders(mut self, source: Arc<dyn OpenOrderSource>) -> Self {
        self.open_orders = Some(source);
        self
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    pub fn prefix(&self) -> &str {
        &self.config.order_id_prefix
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("REST client closed");
        }
    }

    /// Current value of the shared attempt counter.
    pub fn retry_attempts(&self) -> u32 {
        self.retry.attempts()
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    pub async fn place(&self, order: &OrderPayload) -> RestResult<Value> {
        order.validate()?;
        let payload = serde_json::to_value(order)?;
        self.call(Verb::Post, "order", &[], Some(payload), false).await
    }

    pub async fn place_bulk(&self, orders: &[OrderPayload]) -> RestResult<Value> {
        for order in orders {
            order.validate()?;
        }
        let payload = json!({ "orders": orders });
        self.call(Verb::Post, "order/bulk", &[], Some(payload), true)
            .await
    }

    pub async fn amend(&self, amend: &AmendPayload) -> RestResult<Value> {
        amend.validate()?;
        let payload = serde_json::to_value(amend)?;
        self.call(Verb::Put, "order", &[], Some(payload), false).await
    }

    pub async fn amend_bulk(&self, amends: &[AmendPayload]) -> RestResult<Value> {
        for amend in amends {
            amend.validate()?;
        }
        let payload = json!({ "orders": amends });
        self.call(Verb::Put, "order/bulk", &[], Some(payload), true)
            .await
    }

    /// Cancel by id, our prefixed ids as `clOrdID`, others as `orderID`.
    pub async fn cancel(&self, ids: &[&str]) -> RestResult<Value> {
        if ids.is_empty() {
            return Err(RestError::InvalidArgument("nothing to cancel".to_string()));
        }
        let payload = self.cancel_payload(ids.iter().copied());
        self.call(Verb::Delete, "order", &[], Some(payload), false)
            .await
    }

    pub async fn cancel_all(&self) -> RestResult<Value> {
        let payload = json!({ "symbol": self.config.symbol });
        self.call(Verb::Delete, "order/all", &[], Some(payload), false)
            .await
    }

    /// Our open orders according to the REST API.
    pub async fn http_open_orders(&self) -> RestResult<Vec<Value>> {
        let query = [
            ("symbol", self.config.symbol.clone()),
            ("filter", r#"{"ordStatus.isTerminated":false}"#.to_string()),
            ("count", "500".to_string()),
        ];
        let orders = self.call(Verb::Get, "order", &query, None, false).await?;
        let prefix = self.prefix();
        Ok(orders
            .as_array()
            .map(|orders| {
                orders
                    .iter()
                    .filter(|o| {
                        o.get("clOrdID")
                            .and_then(Value::as_str)
                            .is_some_and(|id| id.starts_with(prefix))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    pub async fn funds(&self) -> RestResult<Value> {
        let query = [("currency", "XBt".to_string())];
        self.call(Verb::Get, "user/margin", &query, None, false)
            .await
    }

    /// Switch the symbol to isolated margin at `leverage`.
    pub async fn isolate_margin(&self, leverage: Decimal) -> RestResult<Value> {
        let leverage = leverage
            .to_f64()
            .ok_or_else(|| RestError::InvalidArgument(format!("leverage {leverage}")))?;
        let payload = json!({ "symbol": self.config.symbol, "leverage": leverage });
        self.call(Verb::Post, "position/leverage", &[], Some(payload), false)
            .await
    }

    // ========================================================================
    // Request machinery
    // ========================================================================

    async fn call(
        &self,
        verb: Verb,
        path: &str,
        query: &[(&str, String)],
        payload: Option<Value>,
        bulk: bool,
    ) -> RestResult<Value> {
        loop {
            match self
                .dispatch_once(verb, path, query, payload.as_ref(), bulk)
                .await?
            {
                Step::Done(value) => {
                    self.retry.reset();
                    return Ok(value);
                }
                Step::Retry(reason, cause) => {
                    let attempt = self.register_retry(verb, path, &payload, reason, cause)?;
                    let delay = self.config.retry.delay_for(attempt);
                    warn!(%verb, path, reason, attempt, delay_ms = delay.as_millis() as u64, "Retrying");
                    tokio::time::sleep(delay).await;
                }
                Step::RateLimited(reset) => {
                    let cause = RestError::Http {
                        status: 429,
                        message: "rate limited".to_string(),
                    };
                    let attempt =
                        self.register_retry(verb, path, &payload, "rate_limited", cause)?;
                    self.cancel_known_open_orders().await;
                    let delay = match reset {
                        Some(reset) => {
                            let wait = reset - chrono::Utc::now().timestamp();
                            Duration::from_secs(u64::try_from(wait).unwrap_or(0))
                        }
                        None => self.config.retry.delay_for(attempt),
                    };
                    warn!(%verb, path, attempt, delay_ms = delay.as_millis() as u64, "Rate limited, waiting for reset");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn register_retry(
        &self,
        verb: Verb,
        path: &str,
        payload: &Option<Value>,
        reason: &'static str,
        cause: RestError,
    ) -> RestResult<u32> {
        let attempt = self.retry.record_failure();
        Metrics::rest_retry(reason);
        if self.config.retry.exhausted(attempt) {
            error!(%verb, path, attempt, cause = %cause, "Max retries exceeded");
            self.retry.reset();
            return Err(RestError::MaxRetries {
                verb: verb.as_str(),
                path: path.to_string(),
                retries: self.config.retry.max_retries,
                payload: payload.clone(),
                cause: Box::new(cause),
            });
        }
        Ok(attempt)
    }

    async fn dispatch_once(
        &self,
        verb: Verb,
        path: &str,
        query: &[(&str, String)],
        payload: Option<&Value>,
        bulk: bool,
    ) -> RestResult<Step> {
        if self.is_closed() {
            return Err(RestError::Closed);
        }
        self.throttle(bulk).await;

        let (url, signed_path) = self.url_for(path, query)?;
        let body = payload.map(serde_json::to_string).transpose()?;
        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("accept".to_string(), "application/json".to_string()),
        ];
        if let Some(credentials) = &self.credentials {
            let signed = credentials
                .sign(
                    verb.as_str(),
                    &signed_path,
                    expires_at(self.config.expires_ttl_secs),
                    body.as_deref().unwrap_or(""),
                )
                .map_err(|e| RestError::InvalidArgument(e.to_string()))?;
            headers.extend(
                signed
                    .pairs()
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value)),
            );
        }

        debug!(%verb, path = %signed_path, "REST request");
        let request = HttpRequest {
            verb,
            url,
            headers,
            body,
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) if e.is_transient() => {
                let reason = if matches!(e, RestError::Timeout(_)) {
                    "timeout"
                } else {
                    "connection"
                };
                return Ok(Step::Retry(reason, e));
            }
            Err(e) => return Err(e),
        };

        let message = error_message(&response.body);
        match classify(verb, response.status, &message) {
            Verdict::Success => {
                let value = if response.body.trim().is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(&response.body)?
                };
                Ok(Step::Done(value))
            }
            Verdict::Gone => {
                debug!(path, "Already gone");
                Ok(Step::Done(Value::Null))
            }
            Verdict::Retry(reason) => Ok(Step::Retry(
                reason,
                RestError::Http {
                    status: response.status,
                    message,
                },
            )),
            Verdict::RateLimited => Ok(Step::RateLimited(
                response
                    .header("x-ratelimit-reset")
                    .and_then(|v| v.parse().ok()),
            )),
            Verdict::Fail(err) => {
                if matches!(err, RestError::Unauthorized(_)) {
                    error!(error = %err, "Authentication rejected");
                    self.close();
                } else {
                    warn!(%verb, path, error = %err, "Request rejected");
                }
                Err(err)
            }
        }
    }

    /// Single DELETE of the mirrored open orders, never retried.
    async fn cancel_known_open_orders(&self) {
        let Some(source) = &self.open_orders else {
            return;
        };
        let ids = source.open_order_ids();
        if ids.is_empty() {
            return;
        }
        let payload = self.cancel_payload(ids.iter().map(String::as_str));
        match self
            .dispatch_once(Verb::Delete, "order", &[], Some(&payload), false)
            .await
        {
            Ok(Step::Done(_)) => info!(count = ids.len(), "Open orders canceled after rate limit"),
            Ok(_) => warn!("Cancel after rate limit was not accepted"),
            Err(e) => warn!(error = %e, "Cancel after rate limit failed"),
        }
    }

    fn cancel_payload<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Value {
        let (own, foreign) = split_ids(self.prefix(), ids);
        let mut payload = serde_json::Map::new();
        if !own.is_empty() {
            payload.insert("clOrdID".to_string(), json!(own));
        }
        if !foreign.is_empty() {
            payload.insert("orderID".to_string(), json!(foreign));
        }
        Value::Object(payload)
    }

    async fn throttle(&self, bulk: bool) {
        let pause = Duration::from_millis(if bulk {
            self.config.bulk_pause_ms
        } else {
            self.config.single_pause_ms
        });
        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = next.map_or(now, |previous| (previous + pause).max(now));
            *next = Some(slot);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }

    /// Absolute url and the path+query that gets signed.
    fn url_for(&self, path: &str, query: &[(&str, String)]) -> RestResult<(String, String)> {
        let mut url = reqwest::Url::parse(&self.config.base_url)
            .and_then(|base| base.join(path))
            .map_err(|e| RestError::InvalidArgument(format!("url for {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        let signed_path = match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_string(),
        };
        Ok((url.to_string(), signed_path))
    }
}
