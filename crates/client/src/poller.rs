//! Cost recalculation job poller.
//!
//! [`JobPoller::submit`] starts a recalculation on the server and spawns a
//! task that polls the job's status every [`PollerConfig::interval`] until
//! it is `finished` or `failed`, or until
//! [`PollerConfig::max_consecutive_errors`] status checks in a row fail.
//!
//! Each call to `submit` gets its own task, state and [`JobTracker`];
//! nothing is shared between two jobs.

use std::sync::Arc;

use scrooge_core::flash::FlashMessage;
use scrooge_core::job::{AcceptResponse, JobRequest, JobState, JobStatus};
use scrooge_core::poll::{PollOutcome, PollPhase, PollState, PollerConfig, SERVER_ERROR_MESSAGE};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, RecalculationApi};
use crate::driver::{self, LoopEnd, Step, OUTCOME_CHANNEL_CAPACITY};
use crate::notify::Notifier;
use crate::tracker::Tracker;

/// Message shown when the server reports the job as finished.
pub const RECALCULATED_MESSAGE: &str = "Costs recalculated.";

/// Message shown when the server reports the job as failed.
pub const RECALCULATE_FAILED_MESSAGE: &str = "Recalculate failed.";

/// Handle to one submitted recalculation.
pub type JobTracker = Tracker<PollOutcome>;

/// Submits recalculation jobs and tracks them to completion.
pub struct JobPoller<A> {
    api: Arc<A>,
    config: PollerConfig,
    notifier: Arc<Notifier>,
}

impl<A: RecalculationApi + 'static> JobPoller<A> {
    pub fn new(api: Arc<A>, config: PollerConfig, notifier: Arc<Notifier>) -> Self {
        Self {
            api,
            config,
            notifier,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Submit a recalculation and start tracking it.
    ///
    /// Must be called from within a Tokio runtime. The returned tracker
    /// yields [`PollOutcome::Accepted`], then any number of
    /// [`PollOutcome::Progress`], then exactly one terminal outcome. A
    /// failed submit yields a single [`PollOutcome::Failed`] and no polling
    /// happens.
    pub fn submit(&self, request: JobRequest) -> JobTracker {
        let cancel = CancellationToken::new();
        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);
        let (phase_tx, phase_rx) = watch::channel(PollPhase::Submitting);

        let job = JobRun {
            api: Arc::clone(&self.api),
            config: self.config,
            notifier: Arc::clone(&self.notifier),
            cancel: cancel.clone(),
            outcomes: outcome_tx,
            phase: phase_tx,
        };
        tokio::spawn(job.run(request));

        Tracker::new(outcome_rx, phase_rx, cancel)
    }

    /// Mark the costs of the request's range as accepted.
    ///
    /// The server's answer is published as an info message either way; a
    /// transport failure is published as a danger message and returned.
    pub async fn accept_costs(&self, request: &JobRequest) -> Result<AcceptResponse, ApiError> {
        match self.api.accept_costs(request).await {
            Ok(response) => {
                tracing::info!(
                    start = %request.start(),
                    end = %request.end(),
                    forecast = request.forecast(),
                    accepted = response.is_ok(),
                    "Cost acceptance answered",
                );
                self.notifier.publish(FlashMessage::info(&response.message));
                Ok(response)
            }
            Err(e) => {
                tracing::error!(error = %e, "Cost acceptance failed");
                self.notifier.publish(FlashMessage::danger(e.user_message()));
                Err(e)
            }
        }
    }
}

/// Map one status snapshot to the loop's next step.
///
/// `finished` is terminal whatever `progress` says; a finished job without
/// rows yields an empty row set.
fn interpret(status: JobStatus) -> Step<PollOutcome> {
    match status.status {
        JobState::Finished => Step::Done(PollOutcome::Finished {
            data: status.data.unwrap_or_default(),
        }),
        JobState::Failed => Step::Done(PollOutcome::Failed {
            message: RECALCULATE_FAILED_MESSAGE.to_string(),
        }),
        JobState::Pending => Step::Continue(PollOutcome::Progress {
            progress: status.progress,
            data: status.data,
        }),
    }
}

/// Everything the background task of one job owns.
struct JobRun<A> {
    api: Arc<A>,
    config: PollerConfig,
    notifier: Arc<Notifier>,
    cancel: CancellationToken,
    outcomes: mpsc::Sender<PollOutcome>,
    phase: watch::Sender<PollPhase>,
}

impl<A: RecalculationApi + 'static> JobRun<A> {
    async fn run(self, request: JobRequest) {
        let submitted = tokio::select! {
            _ = self.cancel.cancelled() => {
                self.phase.send_replace(PollPhase::Cancelled);
                return;
            }
            result = self.api.submit_recalculation(&request) => result,
        };

        let response = match submitted {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    start = %request.start(),
                    end = %request.end(),
                    error = %e,
                    "Recalculation submit failed",
                );
                self.finish(PollOutcome::Failed {
                    message: e.user_message(),
                })
                .await;
                return;
            }
        };

        tracing::info!(
            job_id = %response.job_id,
            start = %request.start(),
            end = %request.end(),
            forecast = request.forecast(),
            "Recalculation accepted",
        );
        if !response.message.is_empty() {
            self.notifier.publish(FlashMessage::info(&response.message));
        }

        self.phase.send_replace(PollPhase::Polling);
        let accepted = PollOutcome::Accepted {
            job_id: response.job_id.clone(),
            message: response.message.clone(),
        };
        if !driver::emit(&self.outcomes, accepted, &self.cancel).await {
            self.phase.send_replace(PollPhase::Cancelled);
            return;
        }

        let mut state = PollState::new(response.job_id);
        let job_id = state.job_id.clone();
        let api = &self.api;

        let end = driver::drive(
            &mut state,
            &self.config,
            self.config.interval,
            &self.cancel,
            &self.outcomes,
            || {
                let api = Arc::clone(api);
                let job_id = job_id.clone();
                async move {
                    let status = api.job_status(&job_id).await?;
                    tracing::debug!(
                        job_id = %job_id,
                        status = ?status.status,
                        progress = status.progress,
                        "Job status checked",
                    );
                    Ok(interpret(status))
                }
            },
        )
        .await;

        match end {
            LoopEnd::Terminal(outcome) => {
                tracing::info!(job_id = %job_id, outcome = ?outcome.phase(), "Recalculation ended");
                self.finish(outcome).await;
            }
            LoopEnd::Exhausted => {
                self.finish(PollOutcome::Failed {
                    message: SERVER_ERROR_MESSAGE.to_string(),
                })
                .await;
            }
            LoopEnd::Cancelled => {
                tracing::info!(job_id = %job_id, "Recalculation tracking cancelled");
                self.phase.send_replace(PollPhase::Cancelled);
            }
        }
    }

    /// Publish the terminal message, move to the terminal phase, and hand
    /// the outcome to the tracker.
    async fn finish(&self, outcome: PollOutcome) {
        match &outcome {
            PollOutcome::Finished { .. } => {
                self.notifier.publish(FlashMessage::success(RECALCULATED_MESSAGE));
            }
            PollOutcome::Failed { message } => {
                self.notifier.publish(FlashMessage::danger(message));
            }
            PollOutcome::Accepted { .. } | PollOutcome::Progress { .. } => {}
        }
        self.phase.send_replace(outcome.phase());
        // The tracker may already be gone; the phase is still recorded.
        driver::emit(&self.outcomes, outcome, &self.cancel).await;
    }
}
