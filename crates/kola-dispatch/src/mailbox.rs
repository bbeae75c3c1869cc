//! Validation mailbox keyed by client order id.
//!
//! Each submitting attempt registers its id before the request reaches the
//! dispatcher and gets a dedicated oneshot receiver. Whoever settles the
//! request (a watcher or the dispatcher itself) delivers exactly once.

use crate::error::DispatchResult;
use crate::request::ValidationRecord;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::warn;

pub type ValidationReply = DispatchResult<ValidationRecord>;

#[derive(Debug, Default)]
pub struct ValidationMailbox {
    waiting: DashMap<String, oneshot::Sender<ValidationReply>>,
}

impl ValidationMailbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the slot for `cl_ord_id`. A second registration replaces the
    /// first, whose receiver then sees a closed channel.
    pub fn register(&self, cl_ord_id: &str) -> oneshot::Receiver<ValidationReply> {
        let (tx, rx) = oneshot::channel();
        if self.waiting.insert(cl_ord_id.to_string(), tx).is_some() {
            warn!(cl_ord_id, "Replaced a pending validation slot");
        }
        rx
    }

    /// Hand `reply` to the attempt waiting on `cl_ord_id`.
    ///
    /// Returns false when nobody waits (never registered, already settled
    /// or the receiver was dropped).
    pub fn deliver(&self, cl_ord_id: &str, reply: ValidationReply) -> bool {
        match self.waiting.remove(cl_ord_id) {
            Some((_, tx)) => tx.send(reply).is_ok(),
            None => {
                warn!(cl_ord_id, "No attempt waiting for this validation");
                false
            }
        }
    }

    /// Drop the slot without answering.
    pub fn forget(&self, cl_ord_id: &str) {
        self.waiting.remove(cl_ord_id);
    }

    pub fn is_waiting(&self, cl_ord_id: &str) -> bool {
        self.waiting.contains_key(cl_ord_id)
    }

    pub fn pending_count(&self) -> usize {
        self.waiting.len()
    }
}
