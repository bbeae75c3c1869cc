//! Order lifecycle state machines for kola.
//!
//! - `OrderAttempt`: waits for its condition, fires once, validates
//! - `HookedAttempt`: waits for a source order first, then re-anchors
//! - `TrailingStop`: runs a main leg, then trails a protective stop
//! - `OrderMachine`: the three variants behind one `run`

pub mod attempt;
pub mod config;
pub mod error;
pub mod hooked;
pub mod machine;
pub mod state;
pub mod trailing;

pub use attempt::OrderAttempt;
pub use config::AttemptConfig;
pub use error::{OrdersError, OrdersResult};
pub use hooked::HookedAttempt;
pub use machine::{MachineKind, OrderMachine};
pub use state::{AttemptOutcome, AttemptState, EndReason, StopHandle};
pub use trailing::{MainLeg, TrailingStop};
