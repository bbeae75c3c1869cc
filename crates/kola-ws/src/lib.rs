//! Websocket market data mirror for kola.
//!
//! Keeps an in-memory image of the exchange tables from the realtime feed:
//! - `partial`/`insert`/`update`/`delete` reconciliation per table
//! - readiness tracking before any order logic reads the mirror
//! - reconnection with a doubling backoff, fatal on auth/subscription rejection
//! - `QuoteProvider`/`ExecutionHistory` views over the mirrored tables

pub mod connection;
pub mod error;
pub mod message;
pub mod mirror;
pub mod subscription;
pub mod table;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState};
pub use error::{WsError, WsResult};
pub use message::{DataFrame, Record, TableAction, WsFrame};
pub use mirror::{Instrument, Mirror, Position, Ticker, DEFAULT_MAX_TABLE_LEN};
pub use subscription::{subscription_topics, ReadyPhase, ReadyState};
pub use table::MirrorTable;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any websocket or HTTPS connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
