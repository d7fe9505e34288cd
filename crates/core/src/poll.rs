//! Bookkeeping for a single submit/poll/retry cycle.
//!
//! The I/O loop lives in `scrooge-client`; this module only decides what a
//! response means for the loop and which phase the tracker is in.

use std::time::Duration;

use serde::Serialize;

use crate::types::JobId;

/// Delay between two consecutive status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Consecutive transport errors after which a poll loop gives up.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Message surfaced when the error budget is exhausted.
pub const SERVER_ERROR_MESSAGE: &str = "Server error. Please try again later.";

/// Tunables shared by the job and report pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_consecutive_errors: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

/// What to do after a failed status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorVerdict {
    /// Still under the ceiling; check again after the interval.
    Retry { attempt: u32 },
    /// The ceiling was reached; the loop must stop.
    Exhausted,
}

/// Per-loop tracking state. One exists for every submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    pub job_id: JobId,
    pub consecutive_error_count: u32,
    pub is_polling: bool,
}

impl PollState {
    pub fn new(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: job_id.into(),
            consecutive_error_count: 0,
            is_polling: true,
        }
    }

    /// Any successful response resets the error budget.
    pub fn record_success(&mut self) {
        self.consecutive_error_count = 0;
    }

    /// Count one failed check against `max_consecutive_errors`.
    pub fn record_error(&mut self, max_consecutive_errors: u32) -> ErrorVerdict {
        self.consecutive_error_count += 1;
        if self.consecutive_error_count < max_consecutive_errors {
            ErrorVerdict::Retry {
                attempt: self.consecutive_error_count,
            }
        } else {
            self.is_polling = false;
            ErrorVerdict::Exhausted
        }
    }

    pub fn stop(&mut self) {
        self.is_polling = false;
    }
}

/// Lifecycle of a tracker.
///
/// `Finished`, `Failed` and `Cancelled` are absorbing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    #[default]
    Idle,
    Submitting,
    Polling,
    Finished,
    Failed,
    Cancelled,
}

impl PollPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }
}

/// Update emitted by the job poller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PollOutcome {
    /// The server accepted the job.
    Accepted { job_id: JobId, message: String },
    /// Intermediate snapshot; `data` is a preview when present.
    Progress {
        progress: u8,
        data: Option<Vec<serde_json::Value>>,
    },
    Finished { data: Vec<serde_json::Value> },
    Failed { message: String },
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed { .. })
    }

    /// Phase a tracker enters after emitting this outcome.
    pub fn phase(&self) -> PollPhase {
        match self {
            Self::Accepted { .. } | Self::Progress { .. } => PollPhase::Polling,
            Self::Finished { .. } => PollPhase::Finished,
            Self::Failed { .. } => PollPhase::Failed,
        }
    }
}
