//! Websocket connection manager.
//!
//! Owns the socket, feeds every data frame into the [`Mirror`] and
//! reconnects with a doubling backoff after transport errors. Subscription
//! and authentication rejections are fatal and end the loop.

use crate::error::{WsError, WsResult};
use crate::message::WsFrame;
use crate::mirror::Mirror;
use crate::subscription::{subscribe_url, subscription_topics, ReadyPhase, ReadyState};
use futures_util::{SinkExt, StreamExt};
use kola_core::auth::expires_at;
use kola_core::Credentials;
use kola_telemetry::Metrics;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Path signed for the websocket handshake.
const REALTIME_PATH: &str = "/realtime";

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Realtime endpoint, without query string.
    pub url: String,
    pub symbol: String,
    /// Account tables are subscribed only with credentials.
    pub credentials: Option<Credentials>,
    /// First reconnect delay, doubled per consecutive error.
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    /// Text ping cadence.
    pub heartbeat_interval_ms: u64,
    pub ready_poll_ms: u64,
    pub ready_timeout_ms: u64,
    /// Validity of the handshake signature.
    pub auth_ttl_secs: i64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            symbol: String::new(),
            credentials: None,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60000,
            heartbeat_interval_ms: 5000,
            ready_poll_ms: 100,
            ready_timeout_ms: 30000,
            auth_ttl_secs: 5,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Websocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    mirror: Arc<Mirror>,
    state: Arc<RwLock<ConnectionState>>,
    consecutive_errors: AtomicU32,
    ready: AtomicBool,
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(config: ConnectionConfig, mirror: Arc<Mirror>) -> Self {
        Self {
            config,
            mirror,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            consecutive_errors: AtomicU32::new(0),
            ready: AtomicBool::new(false),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn mirror(&self) -> Arc<Mirror> {
        self.mirror.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_authenticated(&self) -> bool {
        self.config.credentials.is_some()
    }

    pub fn ready_state(&self) -> ReadyState {
        ReadyState::observe(&self.mirror, self.is_authenticated())
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(Ordering::Relaxed)
    }

    /// Stop the session and any pending reconnect.
    pub fn shutdown(&self) {
        info!("Websocket shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Run until shutdown or a fatal error.
    pub async fn run(&self) -> WsResult<()> {
        loop {
            if self.is_shutdown() {
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;

            let err = match self.try_connect().await {
                Ok(()) => {
                    info!("Websocket session ended");
                    continue;
                }
                Err(e) => e,
            };

            Metrics::ws_disconnected();
            *self.state.write() = ConnectionState::Disconnected;

            if err.is_fatal() {
                error!(error = %err, "Fatal websocket error, not reconnecting");
                return Err(err);
            }
            if self.is_shutdown() {
                error!(error = %err, "Websocket error while exiting");
                return Err(err);
            }

            let errors = self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
            let delay = self.backoff_delay(errors);
            warn!(error = %err, errors, delay_ms = delay.as_millis() as u64, "Reconnecting");
            *self.state.write() = ConnectionState::Reconnecting;

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Stopped while waiting to reconnect");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }
            Metrics::ws_reconnect();
        }
    }

    async fn try_connect(&self) -> WsResult<()> {
        let topics = subscription_topics(&self.config.symbol, self.is_authenticated());
        let url = subscribe_url(&self.config.url, &topics);
        info!(url = %url, authenticated = self.is_authenticated(), "Connecting to websocket");

        let request = self.handshake_request(&url)?;
        let (ws_stream, _response) = connect_async_tls_with_config(request, None, true, None)
            .await
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        // Partials arrive again after a reconnect.
        self.mirror.reset();
        self.ready.store(false, Ordering::Relaxed);
        *self.state.write() = ConnectionState::Connected;
        Metrics::ws_connected();
        info!("Websocket connected");

        let mut heartbeat =
            tokio::time::interval(Duration::from_millis(self.config.heartbeat_interval_ms));
        heartbeat.tick().await;

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Closing websocket session");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Close frame not sent");
                    }
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text)?,
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "no close frame".to_string()));
                            warn!(code, %reason, "Websocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "Websocket read error");
                            return Err(e.into());
                        }
                        None => {
                            return Err(WsError::ConnectionClosed {
                                code: 1006,
                                reason: "stream ended".to_string(),
                            });
                        }
                        _ => {}
                    }
                }

                _ = heartbeat.tick() => {
                    write.send(Message::Text("ping".to_string())).await?;
                }
            }
        }
    }

    fn handshake_request(
        &self,
        url: &str,
    ) -> WsResult<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let mut request = url.into_client_request()?;
        if let Some(credentials) = &self.config.credentials {
            let signed = credentials
                .sign("GET", REALTIME_PATH, expires_at(self.config.auth_ttl_secs), "")
                .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
            for (name, value) in signed.pairs() {
                let value = HeaderValue::from_str(&value)
                    .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
                request.headers_mut().insert(name, value);
            }
        }
        Ok(request)
    }

    fn handle_text(&self, text: &str) -> WsResult<()> {
        if text == "pong" {
            return Ok(());
        }

        let frame = WsFrame::parse(text)?;
        frame.check_control()?;

        match frame {
            WsFrame::Data(data) => {
                self.mirror.apply(data);
                self.note_readiness();
            }
            WsFrame::Subscribe(ack) => debug!(topic = %ack.subscribe, "Subscribed"),
            WsFrame::Status(status) => {
                warn!(status = status.status, error = ?status.error, "Status frame")
            }
            WsFrame::Info(info) => info!(info = %info.info, version = ?info.version, "Server info"),
            WsFrame::Other(value) => debug!(%value, "Unhandled frame"),
        }
        Ok(())
    }

    fn note_readiness(&self) {
        if self.ready.load(Ordering::Relaxed) {
            return;
        }
        let state = self.ready_state();
        if state.is_ready(self.is_authenticated()) {
            self.ready.store(true, Ordering::Relaxed);
            self.consecutive_errors.store(0, Ordering::Relaxed);
            info!(phase = %state.phase(), "Mirror ready");
        }
    }

    /// Block until the required tables are seeded.
    pub async fn wait_ready(&self) -> WsResult<ReadyPhase> {
        let poll = Duration::from_millis(self.config.ready_poll_ms);
        let deadline = tokio::time::Instant::now() + Duration::from_millis(self.config.ready_timeout_ms);

        loop {
            let state = self.ready_state();
            if state.is_ready(self.is_authenticated()) {
                return Ok(state.phase());
            }
            if self.is_shutdown() {
                return Err(WsError::NotReady("shutdown requested".to_string()));
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(WsError::NotReady(format!("missing {:?}", state.missing)));
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// base * 2^(errors-1), capped.
    fn backoff_delay(&self, errors: u32) -> Duration {
        let exponent = errors.saturating_sub(1).min(16);
        let delay = self
            .config
            .reconnect_base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.config.reconnect_max_delay_ms);
        Duration::from_millis(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(base: u64, max: u64) -> ConnectionManager {
        let config = ConnectionConfig {
            url: "ws://127.0.0.1:1/realtime".to_string(),
            symbol: "XBTUSD".to_string(),
            reconnect_base_delay_ms: base,
            reconnect_max_delay_ms: max,
            ..Default::default()
        };
        ConnectionManager::new(config, Arc::new(Mirror::new("XBTUSD", "mlk_", 100)))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let m = manager(500, 3000);
        assert_eq!(m.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(m.backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(m.backoff_delay(3), Duration::from_millis(2000));
        assert_eq!(m.backoff_delay(4), Duration::from_millis(3000));
        assert_eq!(m.backoff_delay(40), Duration::from_millis(3000));
    }

    #[test]
    fn test_handshake_headers_only_with_credentials() {
        let m = manager(10, 10);
        let request = m.handshake_request("ws://127.0.0.1:1/realtime").unwrap();
        assert!(request.headers().get("api-key").is_none());

        let mut config = m.config.clone();
        config.credentials = Some(Credentials::new("key", "secret"));
        let m = ConnectionManager::new(config, m.mirror());
        let request = m.handshake_request("ws://127.0.0.1:1/realtime").unwrap();
        assert_eq!(request.headers()["api-key"], "key");
        assert!(request.headers().get("api-signature").is_some());
        assert!(request.headers().get("api-expires").is_some());
    }

    #[test]
    fn test_handle_text_feeds_mirror_and_rejects_auth_failure() {
        let m = manager(10, 10);
        m.handle_text(
            r#"{"table":"instrument","action":"partial","keys":["symbol"],
                "data":[{"symbol":"XBTUSD","tickSize":0.5,"lastPrice":100}]}"#,
        )
        .unwrap();
        assert!(m.mirror().is_seeded("instrument"));
        assert!(m.handle_text("pong").is_ok());
        assert!(m.handle_text(r#"{"info":"Welcome"}"#).is_ok());

        let err = m
            .handle_text(r#"{"status":401,"error":"Signature not valid."}"#)
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_shutdown_before_run_returns_ok() {
        let m = manager(10, 10);
        m.shutdown();
        assert!(m.run().await.is_ok());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }
}
