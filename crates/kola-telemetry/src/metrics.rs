//! Prometheus metrics for kola.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a programming error that should crash at
//! startup. These panics only occur during static initialization.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge, CounterVec, Encoder,
    IntCounter, IntGauge, TextEncoder,
};

/// Requests taken off the dispatcher channel.
/// Labels: action (place/amend/cancel)
pub static REQUESTS_DISPATCHED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "kola_requests_dispatched_total",
        "Order requests handled by the dispatcher",
        &["action"]
    )
    .unwrap()
});

/// Validation outcomes delivered to attempts.
/// Labels: result (success/failed/error)
pub static VALIDATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "kola_validations_total",
        "Validation records delivered",
        &["result"]
    )
    .unwrap()
});

/// REST retries.
/// Labels: reason
pub static REST_RETRIES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "kola_rest_retries_total",
        "REST calls retried",
        &["reason"]
    )
    .unwrap()
});

/// Websocket reconnections.
pub static WS_RECONNECTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kola_ws_reconnects_total", "Websocket reconnections").unwrap()
});

/// Websocket connected (1) or not (0).
pub static WS_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("kola_ws_connected", "Websocket connection state").unwrap()
});

/// Trailing stop amendments sent.
pub static TRAIL_AMENDS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kola_trail_amends_total", "Trailing stop amendments").unwrap()
});

/// Facade over the static metrics.
pub struct Metrics;

impl Metrics {
    pub fn request_dispatched(action: &str) {
        REQUESTS_DISPATCHED.with_label_values(&[action]).inc();
    }

    pub fn validation(result: &str) {
        VALIDATIONS.with_label_values(&[result]).inc();
    }

    pub fn rest_retry(reason: &str) {
        REST_RETRIES.with_label_values(&[reason]).inc();
    }

    pub fn ws_connected() {
        WS_CONNECTED.set(1);
    }

    pub fn ws_disconnected() {
        WS_CONNECTED.set(0);
    }

    pub fn ws_reconnect() {
        WS_RECONNECTS.inc();
    }

    pub fn trail_amend() {
        TRAIL_AMENDS.inc();
    }

    /// Render all registered metrics in the text exposition format.
    pub fn gather() -> TelemetryResult<String> {
        let families = prometheus::gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
