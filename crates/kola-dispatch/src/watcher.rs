//! Validation watchers.
//!
//! A watcher polls the execution history for the row confirming one
//! request. Which exec type and status confirm it depends on the request.

use crate::policy::ActionKind;
use crate::request::RequestOrigin;
use chrono::{DateTime, Utc};
use kola_core::{DynMarketView, ExecType, Execution, OrdStatus, OrdType};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Exec type and order status of a confirming execution row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessPair {
    pub exec_type: ExecType,
    pub ord_status: OrdStatus,
}

impl SuccessPair {
    pub const FILLED: Self = Self::new(ExecType::Trade, OrdStatus::Filled);
    pub const ACCEPTED: Self = Self::new(ExecType::New, OrdStatus::New);
    pub const REPLACED: Self = Self::new(ExecType::Replaced, OrdStatus::New);
    pub const CANCELED: Self = Self::new(ExecType::Canceled, OrdStatus::Canceled);

    pub const fn new(exec_type: ExecType, ord_status: OrdStatus) -> Self {
        Self {
            exec_type,
            ord_status,
        }
    }

    pub fn matches(&self, execution: &Execution) -> bool {
        execution.exec_type == self.exec_type && execution.ord_status == self.ord_status
    }
}

/// Pairs that confirm a request.
///
/// Placements confirm on fill, except trigger orders placed by a trailing
/// stop which only need to be accepted.
pub fn success_pairs(action: ActionKind, ord_type: OrdType, origin: RequestOrigin) -> Vec<SuccessPair> {
    match action {
        ActionKind::Place if origin == RequestOrigin::Trailing && ord_type.has_stop_price() => {
            vec![SuccessPair::ACCEPTED]
        }
        ActionKind::Place => vec![SuccessPair::FILLED],
        ActionKind::Amend => vec![SuccessPair::REPLACED],
        ActionKind::Cancel => vec![SuccessPair::CANCELED],
    }
}

/// A settled watch: the deciding row and whether it confirms the request.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOutcome {
    pub execution: Execution,
    pub confirmed: bool,
}

/// Latest row about `ids` newer than `after` that settles the request.
///
/// Partial fills are skipped unless a pair targets them. A cancellation
/// settles every request, confirming only those waiting for it.
pub fn find_match(
    executions: &[Execution],
    ids: &[String],
    pairs: &[SuccessPair],
    after: Option<DateTime<Utc>>,
) -> Option<WatchOutcome> {
    let wants_partial = pairs
        .iter()
        .any(|p| p.ord_status == OrdStatus::PartiallyFilled);

    executions
        .iter()
        .filter(|e| ids.iter().any(|id| e.concerns(id)))
        .filter(|e| after.map_or(true, |t| e.transact_time > t))
        .filter(|e| wants_partial || e.ord_status != OrdStatus::PartiallyFilled)
        .filter(|e| pairs.iter().any(|p| p.matches(e)) || SuccessPair::CANCELED.matches(e))
        .max_by_key(|e| e.transact_time)
        .map(|e| WatchOutcome {
            execution: e.clone(),
            confirmed: pairs.iter().any(|p| p.matches(e)),
        })
}

/// Polls the execution history for one request.
pub struct Watcher {
    view: DynMarketView,
    ids: Vec<String>,
    pairs: Vec<SuccessPair>,
    baseline: Option<DateTime<Utc>>,
    step: Duration,
}

impl Watcher {
    /// Create a watcher for `ids`. Rows already recorded for these ids are
    /// ignored, so an amend is not confirmed by the previous amend's row.
    pub fn new(
        view: DynMarketView,
        ids: Vec<String>,
        pairs: Vec<SuccessPair>,
        step: Duration,
    ) -> Self {
        let baseline = view
            .executions()
            .iter()
            .filter(|e| ids.iter().any(|id| e.concerns(id)))
            .map(|e| e.transact_time)
            .max();
        Self {
            view,
            ids,
            pairs,
            baseline,
            step,
        }
    }

    /// Also accept rows about `id` (the exchange order id from the reply).
    pub fn add_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !id.is_empty() && !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn check(&self) -> Option<WatchOutcome> {
        find_match(&self.view.executions(), &self.ids, &self.pairs, self.baseline)
    }

    /// Poll until a row settles the request, the deadline passes or `cancel` fires.
    pub async fn watch(self, deadline: Instant, cancel: CancellationToken) -> Option<WatchOutcome> {
        loop {
            if let Some(outcome) = self.check() {
                debug!(
                    ids = ?self.ids,
                    exec_type = %outcome.execution.exec_type,
                    ord_status = %outcome.execution.ord_status,
                    confirmed = outcome.confirmed,
                    "Watcher settled"
                );
                return Some(outcome);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(ids = ?self.ids, "Watcher budget exhausted");
                return None;
            }
            trace!(ids = ?self.ids, "Watching");
            tokio::select! {
                _ = tokio::time::sleep(self.step.min(deadline - now)) => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }
}
