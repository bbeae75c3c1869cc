//! Single-writer order dispatcher for kola.
//!
//! Order attempts submit exchange-neutral [`OrderRequest`]s through a
//! [`DispatchHandle`]. The [`Dispatcher`] is the only component that turns
//! them into REST calls. Every accepted call gets a [`Watcher`] that looks
//! for the confirming execution and settles the request in the
//! [`ValidationMailbox`].

pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod mailbox;
pub mod policy;
pub mod request;
pub mod watcher;

pub use dispatcher::{DispatchHandle, Dispatcher, DispatcherConfig};
pub use error::{DispatchError, DispatchResult};
pub use gateway::{DynOrderGateway, GatewayCall, OrderGateway, RecordingGateway};
pub use mailbox::{ValidationMailbox, ValidationReply};
pub use policy::{policy_for, ActionKind, Policy};
pub use request::{OrderAction, OrderIntent, OrderRequest, RequestOrigin, ValidationRecord};
pub use watcher::{find_match, success_pairs, SuccessPair, WatchOutcome, Watcher};
