//! Report generation poller.
//!
//! Reports have no server-assigned handle: the same progress request is
//! repeated until the server answers `finished: true`, then the CSV URL is
//! handed to the caller. Transport errors use the same budget as the job
//! poller.

use std::sync::Arc;

use scrooge_core::flash::FlashMessage;
use scrooge_core::poll::{PollPhase, PollState, PollerConfig, SERVER_ERROR_MESSAGE};
use scrooge_core::report::{ReportOutcome, ReportProgress, ReportRequest};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::api::ReportApi;
use crate::driver::{self, LoopEnd, Step, OUTCOME_CHANNEL_CAPACITY};
use crate::notify::Notifier;
use crate::tracker::Tracker;

/// Message shown when report generation starts.
pub const REPORT_PENDING_MESSAGE: &str = "Please wait for report file.";

/// Message shown when the report is ready for download.
pub const REPORT_READY_MESSAGE: &str = "File generated.";

/// Handle to one report being generated.
pub type ReportTracker = Tracker<ReportOutcome>;

/// Starts report generation loops and hands out their trackers.
pub struct ReportPoller<A> {
    api: Arc<A>,
    config: PollerConfig,
    notifier: Arc<Notifier>,
}

impl<A: ReportApi + 'static> ReportPoller<A> {
    pub fn new(api: Arc<A>, config: PollerConfig, notifier: Arc<Notifier>) -> Self {
        Self {
            api,
            config,
            notifier,
        }
    }

    /// Start polling for `report`.
    ///
    /// The first check is issued immediately, later ones every
    /// [`PollerConfig::interval`]. Must be called from within a Tokio
    /// runtime.
    pub fn track(&self, report: ReportRequest) -> ReportTracker {
        let cancel = CancellationToken::new();
        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);
        let (phase_tx, phase_rx) = watch::channel(PollPhase::Polling);

        let run = ReportRun {
            api: Arc::clone(&self.api),
            config: self.config,
            notifier: Arc::clone(&self.notifier),
            cancel: cancel.clone(),
            outcomes: outcome_tx,
            phase: phase_tx,
        };
        tokio::spawn(run.run(report));

        Tracker::new(outcome_rx, phase_rx, cancel)
    }
}

fn interpret(progress: ReportProgress, download_url: &str) -> Step<ReportOutcome> {
    if progress.finished {
        Step::Done(ReportOutcome::Ready {
            download_url: download_url.to_string(),
        })
    } else {
        Step::Continue(ReportOutcome::Progress {
            progress: progress.progress,
        })
    }
}

struct ReportRun<A> {
    api: Arc<A>,
    config: PollerConfig,
    notifier: Arc<Notifier>,
    cancel: CancellationToken,
    outcomes: mpsc::Sender<ReportOutcome>,
    phase: watch::Sender<PollPhase>,
}

impl<A: ReportApi + 'static> ReportRun<A> {
    async fn run(self, report: ReportRequest) {
        let section = report.section();

        let download_url = match self.api.download_url(&report) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::error!(report = section, error = %e, "Cannot build report URL");
                self.finish(ReportOutcome::Failed {
                    message: e.user_message(),
                })
                .await;
                return;
            }
        };

        self.notifier.publish(FlashMessage::info(REPORT_PENDING_MESSAGE));
        tracing::info!(report = section, "Waiting for report generation");

        let mut state = PollState::new(section);
        let api = &self.api;
        let report = &report;
        let download_url = download_url.as_str();

        let end = driver::drive(
            &mut state,
            &self.config,
            std::time::Duration::ZERO,
            &self.cancel,
            &self.outcomes,
            || {
                let api = Arc::clone(api);
                let report = report.clone();
                let download_url = download_url.to_string();
                async move {
                    let progress = api.report_progress(&report).await?;
                    tracing::debug!(
                        report = report.section(),
                        progress = progress.progress,
                        finished = progress.finished,
                        "Report progress checked",
                    );
                    Ok(interpret(progress, &download_url))
                }
            },
        )
        .await;

        match end {
            LoopEnd::Terminal(outcome) => self.finish(outcome).await,
            LoopEnd::Exhausted => {
                self.finish(ReportOutcome::Failed {
                    message: SERVER_ERROR_MESSAGE.to_string(),
                })
                .await;
            }
            LoopEnd::Cancelled => {
                tracing::info!(report = section, "Report tracking cancelled");
                self.phase.send_replace(PollPhase::Cancelled);
            }
        }
    }

    async fn finish(&self, outcome: ReportOutcome) {
        let phase = match &outcome {
            ReportOutcome::Ready { download_url } => {
                tracing::info!(url = %download_url, "Report ready");
                self.notifier.publish(FlashMessage::success(REPORT_READY_MESSAGE));
                PollPhase::Finished
            }
            ReportOutcome::Failed { message } => {
                self.notifier.publish(FlashMessage::danger(message));
                PollPhase::Failed
            }
            ReportOutcome::Progress { .. } => PollPhase::Polling,
        };
        self.phase.send_replace(phase);
        // The tracker may already be gone; the phase is still recorded.
        driver::emit(&self.outcomes, outcome, &self.cancel).await;
    }
}
