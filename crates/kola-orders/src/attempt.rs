//! The plain order attempt.
//!
//! `Created -> Waiting -> Triggered -> Sent -> {Validated | Canceled | TimedOut} -> Finalized`
//!
//! Market orders skip `Waiting` whatever their condition. While waiting the condition is polled
//! until it holds, the attempt is stopped, or it times out. A timed-out
//! attempt asks the dispatcher to cancel its order before finishing.

use crate::config::AttemptConfig;
use crate::error::OrdersResult;
use crate::state::{AttemptOutcome, AttemptState, EndReason, StopHandle};
use chrono::Utc;
use kola_condition::Condition;
use kola_core::{DynMarketView, OrdStatus, OrdType};
use kola_dispatch::{DispatchHandle, OrderIntent, OrderRequest, ValidationRecord};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct OrderAttempt {
    intent: OrderIntent,
    condition: Condition,
    dispatch: DispatchHandle,
    view: DynMarketView,
    config: AttemptConfig,
    stop: StopHandle,
    history: Vec<AttemptState>,
    started: Instant,
}

impl OrderAttempt {
    #[must_use]
    pub fn new(
        intent: OrderIntent,
        condition: Condition,
        dispatch: DispatchHandle,
        view: DynMarketView,
        config: AttemptConfig,
    ) -> Self {
        Self {
            intent,
            condition,
            dispatch,
            view,
            config,
            stop: StopHandle::new(),
            history: vec![AttemptState::Created],
            started: Instant::now(),
        }
    }

    /// Share `stop` instead of the attempt's own handle.
    #[must_use]
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn cl_ord_id(&self) -> &str {
        self.intent.cl_ord_id.as_str()
    }

    pub fn intent(&self) -> &OrderIntent {
        &self.intent
    }

    pub fn intent_mut(&mut self) -> &mut OrderIntent {
        &mut self.intent
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn condition_mut(&mut self) -> &mut Condition {
        &mut self.condition
    }

    pub fn dispatch(&self) -> &DispatchHandle {
        &self.dispatch
    }

    pub fn view(&self) -> &DynMarketView {
        &self.view
    }

    pub fn config(&self) -> &AttemptConfig {
        &self.config
    }

    pub fn state(&self) -> AttemptState {
        self.history
            .last()
            .copied()
            .unwrap_or(AttemptState::Created)
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[AttemptState] {
        &self.history
    }

    pub(crate) fn enter(&mut self, state: AttemptState) {
        debug!(cl_ord_id = self.cl_ord_id(), from = %self.state(), to = %state, "Attempt state");
        self.history.push(state);
    }

    /// Start the timeout clock again.
    pub fn restart_clock(&mut self) {
        self.started = Instant::now();
    }

    pub fn deadline_passed(&self) -> bool {
        self.started.elapsed() >= self.config.timeout()
    }

    /// Past the attempt deadline, or the condition can no longer hold.
    pub fn timed_out(&self) -> bool {
        self.deadline_passed() || self.condition.timed_out(Utc::now())
    }

    /// Run to completion.
    pub async fn run(&mut self) -> OrdersResult<AttemptOutcome> {
        info!(
            cl_ord_id = self.cl_ord_id(),
            intent = %self.intent,
            condition = %self.condition,
            "Starting attempt"
        );

        if self.intent.ord_type == OrdType::Market {
            debug!(cl_ord_id = self.cl_ord_id(), "Market order, firing at once");
        } else {
            self.enter(AttemptState::Waiting);
            if let Some(reason) = self.wait().await? {
                return Ok(self.finish(reason, None));
            }
        }
        self.fire().await
    }

    async fn wait(&mut self) -> OrdersResult<Option<EndReason>> {
        loop {
            if self.stop.is_stopped() {
                return Ok(Some(EndReason::Stop));
            }
            if self.timed_out() {
                self.enter(AttemptState::TimedOut);
                self.cancel().await?;
                return Ok(Some(EndReason::TimedOut));
            }
            if self.condition.evaluate(self.view.as_ref(), Utc::now()) {
                return Ok(None);
            }
            self.stop.pause(self.config.poll()).await;
        }
    }

    async fn fire(&mut self) -> OrdersResult<AttemptOutcome> {
        self.enter(AttemptState::Triggered);
        info!(cl_ord_id = self.cl_ord_id(), condition = %self.condition, "Firing");

        let request = OrderRequest::place(self.intent.clone());
        self.enter(AttemptState::Sent);
        let record = match self.dispatch.submit(request).await {
            Ok(record) => record,
            Err(e) => {
                self.enter(AttemptState::Finalized);
                return Err(e.into());
            }
        };

        let reason = if record.success {
            self.enter(AttemptState::Validated);
            EndReason::Condition
        } else if was_canceled(&record) {
            self.enter(AttemptState::Canceled);
            EndReason::Canceled
        } else {
            EndReason::FailedValidation
        };
        Ok(self.finish(reason, Some(record)))
    }

    /// Ask the dispatcher to cancel this attempt's order.
    pub async fn cancel(&mut self) -> OrdersResult<ValidationRecord> {
        info!(cl_ord_id = self.cl_ord_id(), "Canceling");
        let request = OrderRequest::cancel(self.intent.clone(), None)
            .with_timeout(self.config.cancel_timeout());
        let record = self.dispatch.submit(request).await?;
        if !record.success {
            warn!(cl_ord_id = self.cl_ord_id(), "Cancel not confirmed");
        }
        Ok(record)
    }

    pub(crate) fn finish(&mut self, reason: EndReason, record: Option<ValidationRecord>) -> AttemptOutcome {
        self.enter(AttemptState::Finalized);
        info!(
            cl_ord_id = self.cl_ord_id(),
            reason = %reason,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Attempt finished"
        );
        AttemptOutcome {
            cl_ord_id: self.cl_ord_id().to_string(),
            reason,
            record,
            hooked_id: self.condition.hooked_id().map(str::to_string),
            main: None,
        }
    }
}

fn was_canceled(record: &ValidationRecord) -> bool {
    record
        .execution
        .as_ref()
        .is_some_and(|e| e.ord_status == OrdStatus::Canceled)
}
