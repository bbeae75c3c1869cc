//! Mock realtime server for integration tests.
//!
//! Provides a websocket server that can:
//! - Accept connections and record the requested path
//! - Push a scripted list of frames right after the handshake
//! - Answer text pings and record received messages

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

pub const SYMBOL: &str = "XBTUSD";

#[derive(Default)]
struct Recorded {
    paths: Vec<String>,
    messages: Vec<String>,
}

/// A mock websocket server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockWsServer {
    /// Start a server that sends `frames` to every new connection.
    pub async fn start(frames: Vec<Value>) -> Self {
        Self::spawn(frames, false).await
    }

    /// Same, but every connection is closed once its frames are sent.
    pub async fn closing(frames: Vec<Value>) -> Self {
        Self::spawn(frames, true).await
    }

    async fn spawn(frames: Vec<Value>, close: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let frames: Arc<Vec<String>> = Arc::new(frames.iter().map(Value::to_string).collect());

        let recorded_clone = recorded.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(stream, frames.clone(), close, recorded_clone.clone()));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            recorded,
        }
    }

    /// A server that seeds every market table.
    pub async fn seeded(last_price: f64) -> Self {
        Self::start(market_partials(last_price)).await
    }

    /// Realtime endpoint, as the connection manager expects it.
    pub fn url(&self) -> String {
        format!("ws://{}/realtime", self.addr)
    }

    /// REST-style base the realtime endpoint is derived from.
    pub fn api_url(&self) -> String {
        format!("http://{}/api/v1/", self.addr)
    }

    pub fn connection_count(&self) -> usize {
        self.recorded.lock().unwrap().paths.len()
    }

    /// Request paths (with query) of every handshake.
    pub fn paths(&self) -> Vec<String> {
        self.recorded.lock().unwrap().paths.clone()
    }

    pub fn received_messages(&self) -> Vec<String> {
        self.recorded.lock().unwrap().messages.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Partial frames for the tables market readiness needs.
pub fn market_partials(last_price: f64) -> Vec<Value> {
    vec![
        json!({"info": "Welcome to the mock realtime API.", "version": "test"}),
        json!({
            "table": "instrument",
            "action": "partial",
            "keys": ["symbol"],
            "data": [{
                "symbol": SYMBOL,
                "tickSize": 0.5,
                "lastPrice": last_price,
                "markPrice": last_price,
                "indicativeSettlePrice": last_price,
            }],
        }),
        json!({
            "table": "trade",
            "action": "partial",
            "keys": [],
            "data": [{"symbol": SYMBOL, "side": "Buy", "size": 100, "price": last_price}],
        }),
        json!({
            "table": "quote",
            "action": "partial",
            "keys": [],
            "data": [{
                "symbol": SYMBOL,
                "bidPrice": last_price - 0.5,
                "askPrice": last_price + 0.5,
            }],
        }),
    ]
}

async fn handle_connection(
    stream: TcpStream,
    frames: Arc<Vec<String>>,
    close: bool,
    recorded: Arc<Mutex<Recorded>>,
) {
    let paths = recorded.clone();
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        paths.lock().unwrap().paths.push(request.uri().to_string());
        Ok(response)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    for frame in frames.iter() {
        if write.send(Message::Text(frame.clone())).await.is_err() {
            return;
        }
    }
    if close {
        let _ = write.send(Message::Close(None)).await;
        return;
    }

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                recorded.lock().unwrap().messages.push(text.clone());
                if text == "ping" {
                    let _ = write.send(Message::Text("pong".to_string())).await;
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockWsServer::start(Vec::new()).await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        assert!(server.url().ends_with("/realtime"));
        server.shutdown().await;
    }
}
