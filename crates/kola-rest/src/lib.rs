//! REST client for kola.
//!
//! - `RestClient`: signed, throttled order/account endpoints
//! - `classify`: response status/message table driving retries
//! - `RetryPolicy`: tiered jittered backoff shared across calls
//! - `HttpTransport`: dyn-compatible transport seam with a scripted double

pub mod classify;
pub mod client;
pub mod error;
pub mod payload;
pub mod retry;
pub mod transport;

pub use classify::{classify, error_message, Verdict};
pub use client::{RestClient, RestConfig, LIVE_URL, MAX_PREFIX_LEN, TESTNET_URL};
pub use error::{ErrorKind, RestError, RestResult};
pub use payload::{AmendPayload, OrderPayload};
pub use retry::{JitterRange, RetryPolicy, RetryState};
pub use transport::{
    BoxFuture, DynHttpTransport, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport,
    ScriptedReply, ScriptedTransport, Verb,
};
