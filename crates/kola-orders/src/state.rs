//! Lifecycle states, end reasons and the cooperative stop handle.

use kola_dispatch::ValidationRecord;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Where an attempt is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptState {
    Created,
    /// Hook-gated attempts only: the source order has not reached its target yet.
    AwaitingHook,
    Waiting,
    Triggered,
    Sent,
    Validated,
    Canceled,
    TimedOut,
    Finalized,
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::AwaitingHook => "awaiting_hook",
            Self::Waiting => "waiting",
            Self::Triggered => "triggered",
            Self::Sent => "sent",
            Self::Validated => "validated",
            Self::Canceled => "canceled",
            Self::TimedOut => "timed_out",
            Self::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// Why an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// Stopped from outside.
    Stop,
    /// Condition met and the order validated.
    Condition,
    TimedOut,
    /// The exchange canceled the order before it validated.
    Canceled,
    FailedValidation,
    /// Price crossed the trailing stop.
    TrailExit,
    /// The main leg timed out, no stop was placed.
    TrailAbandoned,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stop => "stopped",
            Self::Condition => "condition met",
            Self::TimedOut => "timed out",
            Self::Canceled => "canceled",
            Self::FailedValidation => "failed validation",
            Self::TrailExit => "trail exit",
            Self::TrailAbandoned => "trail abandoned",
        };
        f.write_str(s)
    }
}

/// Result of a finished attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    pub cl_ord_id: String,
    pub reason: EndReason,
    /// Last validation record received, if anything was sent.
    pub record: Option<ValidationRecord>,
    /// Source order id a hook fired on.
    pub hooked_id: Option<String>,
    /// Main leg outcome, set by trailing stops.
    pub main: Option<Box<AttemptOutcome>>,
}

impl AttemptOutcome {
    pub fn new(cl_ord_id: impl Into<String>, reason: EndReason) -> Self {
        Self {
            cl_ord_id: cl_ord_id.into(),
            reason,
            record: None,
            hooked_id: None,
            main: None,
        }
    }

    pub fn validated(&self) -> bool {
        self.record.as_ref().is_some_and(|r| r.success)
    }

    /// The primary leg: the main leg of a trailing stop, else this outcome.
    pub fn primary(&self) -> &AttemptOutcome {
        self.main.as_deref().unwrap_or(self)
    }

    /// Hooked source id of this attempt or of its main leg.
    pub fn hooked_id(&self) -> Option<&str> {
        self.hooked_id
            .as_deref()
            .or_else(|| self.main.as_ref().and_then(|m| m.hooked_id.as_deref()))
    }
}

/// Shared stop flag. Stopping is cooperative: attempts check it between
/// steps and wake from their pauses when it is set.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle stopped together with `parent`.
    #[must_use]
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
        }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sleep for `duration`. Returns false when woken by a stop.
    pub async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.token.cancelled() => false,
        }
    }
}
