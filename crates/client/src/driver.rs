//! Shared fixed-interval poll loop.
//!
//! Both the job poller and the report poller repeat one status check until
//! it reports a terminal state. [`drive`] owns the timing, the error budget
//! and cancellation; the caller decides what a response means.

use std::future::Future;
use std::time::Duration;

use scrooge_core::poll::{ErrorVerdict, PollState, PollerConfig};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::api::ApiError;

/// Capacity of the outcome channel between a loop and its tracker.
pub(crate) const OUTCOME_CHANNEL_CAPACITY: usize = 32;

/// Interpretation of one successful status check.
#[derive(Debug)]
pub(crate) enum Step<O> {
    /// Emit the outcome and check again after the interval.
    Continue(O),
    /// The outcome is terminal; stop polling.
    Done(O),
}

/// How a loop ended.
#[derive(Debug)]
pub(crate) enum LoopEnd<O> {
    Terminal(O),
    /// `max_consecutive_errors` transport errors in a row.
    Exhausted,
    /// The token was cancelled or the tracker went away.
    Cancelled,
}

/// Run `check` every `config.interval` until it returns [`Step::Done`],
/// the error budget is exhausted, or `cancel` fires.
///
/// The first check waits `first_delay`. Each check starts only after the
/// previous one resolved, so requests never overlap. Intermediate outcomes
/// are offered on `outcomes` without waiting (see [`offer`]); the terminal
/// one is returned to the caller.
pub(crate) async fn drive<O, F, Fut>(
    state: &mut PollState,
    config: &PollerConfig,
    first_delay: Duration,
    cancel: &CancellationToken,
    outcomes: &mpsc::Sender<O>,
    mut check: F,
) -> LoopEnd<O>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Step<O>, ApiError>>,
{
    let mut delay = first_delay;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return LoopEnd::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = config.interval;

        let result = tokio::select! {
            _ = cancel.cancelled() => return LoopEnd::Cancelled,
            result = check() => result,
        };

        match result {
            Ok(Step::Continue(outcome)) => {
                state.record_success();
                if !offer(outcomes, outcome) {
                    tracing::debug!(job_id = %state.job_id, "Tracker gone, stopping poll loop");
                    return LoopEnd::Cancelled;
                }
            }
            Ok(Step::Done(outcome)) => {
                state.record_success();
                state.stop();
                return LoopEnd::Terminal(outcome);
            }
            Err(e) => match state.record_error(config.max_consecutive_errors) {
                ErrorVerdict::Retry { attempt } => {
                    tracing::warn!(
                        job_id = %state.job_id,
                        attempt,
                        error = %e,
                        "Status check failed, retrying",
                    );
                }
                ErrorVerdict::Exhausted => {
                    tracing::error!(
                        job_id = %state.job_id,
                        attempts = state.consecutive_error_count,
                        error = %e,
                        "Status check failed too many times, giving up",
                    );
                    return LoopEnd::Exhausted;
                }
            },
        }
    }
}

/// Hand an intermediate outcome to the tracker without waiting.
///
/// The last free slot of the channel is kept for the terminal outcome, so a
/// consumer that only watches the phase never stalls the loop. Outcomes that
/// do not fit are dropped. Returns `false` when the tracker is gone.
pub(crate) fn offer<O>(outcomes: &mpsc::Sender<O>, outcome: O) -> bool {
    if outcomes.is_closed() {
        return false;
    }
    if outcomes.capacity() <= 1 {
        tracing::debug!("Outcome channel full, dropping intermediate outcome");
        return true;
    }
    match outcomes.try_send(outcome) {
        Ok(()) | Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Send an outcome to the tracker, waiting for capacity.
///
/// Returns `false` when the tracker was dropped or the loop was cancelled
/// while waiting for channel capacity.
pub(crate) async fn emit<O>(
    outcomes: &mpsc::Sender<O>,
    outcome: O,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = outcomes.send(outcome) => sent.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offer_keeps_the_last_slot_free() {
        let (tx, mut rx) = mpsc::channel(3);
        for n in 0..5 {
            assert!(offer(&tx, n));
        }
        assert_eq!(tx.capacity(), 1);

        let cancel = CancellationToken::new();
        assert!(emit(&tx, 99, &cancel).await);

        assert_eq!(rx.recv().await, Some(0));
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(99));
    }

    #[tokio::test]
    async fn offer_reports_a_dropped_receiver() {
        let (tx, rx) = mpsc::channel::<u8>(4);
        drop(rx);
        assert!(!offer(&tx, 1));
    }

    #[tokio::test]
    async fn emit_gives_up_on_cancel_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        assert!(emit(&tx, 1, &cancel).await);

        cancel.cancel();
        assert!(!emit(&tx, 2, &cancel).await);
    }
}
