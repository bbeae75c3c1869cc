//! One entry point over the three attempt variants.

use crate::attempt::OrderAttempt;
use crate::error::OrdersResult;
use crate::hooked::HookedAttempt;
use crate::state::{AttemptOutcome, StopHandle};
use crate::trailing::TrailingStop;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineKind {
    Plain,
    HookGated,
    Trailing,
}

impl fmt::Display for MachineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plain => "plain",
            Self::HookGated => "hook_gated",
            Self::Trailing => "trailing",
        };
        f.write_str(s)
    }
}

pub enum OrderMachine {
    Plain(OrderAttempt),
    HookGated(HookedAttempt),
    Trailing(Box<TrailingStop>),
}

impl OrderMachine {
    pub fn kind(&self) -> MachineKind {
        match self {
            Self::Plain(_) => MachineKind::Plain,
            Self::HookGated(_) => MachineKind::HookGated,
            Self::Trailing(_) => MachineKind::Trailing,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        match self {
            Self::Plain(attempt) => attempt.stop_handle(),
            Self::HookGated(hooked) => hooked.stop_handle(),
            Self::Trailing(trailing) => trailing.stop_handle(),
        }
    }

    /// Client order id of the primary leg.
    pub fn cl_ord_id(&self) -> &str {
        match self {
            Self::Plain(attempt) => attempt.cl_ord_id(),
            Self::HookGated(hooked) => hooked.cl_ord_id(),
            Self::Trailing(trailing) => trailing.main_cl_ord_id(),
        }
    }

    pub async fn run(&mut self) -> OrdersResult<AttemptOutcome> {
        match self {
            Self::Plain(attempt) => attempt.run().await,
            Self::HookGated(hooked) => hooked.run().await,
            Self::Trailing(trailing) => trailing.run().await,
        }
    }
}

impl From<OrderAttempt> for OrderMachine {
    fn from(attempt: OrderAttempt) -> Self {
        Self::Plain(attempt)
    }
}

impl From<HookedAttempt> for OrderMachine {
    fn from(hooked: HookedAttempt) -> Self {
        Self::HookGated(hooked)
    }
}

impl From<TrailingStop> for OrderMachine {
    fn from(trailing: TrailingStop) -> Self {
        Self::Trailing(Box::new(trailing))
    }
}
