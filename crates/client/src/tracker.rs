//! Consumer-side handle of a background poll loop.
//!
//! A [`Tracker`] owns the receiving end of the loop's outcome channel, a view
//! of its [`PollPhase`] and the loop's [`CancellationToken`]. Dropping the
//! tracker cancels the loop, so polling never outlives the code that is
//! interested in its result.

use scrooge_core::poll::{PollOutcome, PollPhase};
use scrooge_core::report::ReportOutcome;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Outcomes that can end a poll loop.
pub trait Outcome {
    fn is_terminal(&self) -> bool;
}

impl Outcome for PollOutcome {
    fn is_terminal(&self) -> bool {
        PollOutcome::is_terminal(self)
    }
}

impl Outcome for ReportOutcome {
    fn is_terminal(&self) -> bool {
        ReportOutcome::is_terminal(self)
    }
}

/// Handle to one running poll loop.
pub struct Tracker<O> {
    outcomes: mpsc::Receiver<O>,
    phase: watch::Receiver<PollPhase>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl<O: Outcome> Tracker<O> {
    pub(crate) fn new(
        outcomes: mpsc::Receiver<O>,
        phase: watch::Receiver<PollPhase>,
        cancel: CancellationToken,
    ) -> Self {
        let guard = cancel.clone().drop_guard();
        Self {
            outcomes,
            phase,
            cancel,
            _guard: guard,
        }
    }

    /// Next outcome, or `None` once the loop has ended and every outcome
    /// was consumed.
    pub async fn next(&mut self) -> Option<O> {
        self.outcomes.recv().await
    }

    pub fn phase(&self) -> PollPhase {
        *self.phase.borrow()
    }

    /// Wait until the phase changes, returning the new phase.
    ///
    /// Returns `None` once the loop has exited.
    pub async fn phase_changed(&mut self) -> Option<PollPhase> {
        self.phase.changed().await.ok()?;
        Some(*self.phase.borrow_and_update())
    }

    /// Stop the loop. Any in-flight request is abandoned; no further checks
    /// are scheduled and no terminal outcome is emitted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A token that cancels this loop, e.g. to tie it to a Ctrl-C handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain outcomes until the loop ends and return the terminal one.
    ///
    /// Returns `None` when the loop was cancelled before reaching a
    /// terminal state.
    pub async fn wait(mut self) -> Option<O> {
        let mut last = None;
        while let Some(outcome) = self.next().await {
            if outcome.is_terminal() {
                last = Some(outcome);
            }
        }
        last
    }
}
