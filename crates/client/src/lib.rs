//! Async client for the Scrooge cost dashboard REST API.
//!
//! - [`api::ScroogeApi`] wraps the HTTP endpoints using [`reqwest`].
//! - [`poller::JobPoller`] submits a cost recalculation and tracks it to a
//!   terminal state with bounded retry.
//! - [`report::ReportPoller`] waits for a report to be generated and yields
//!   its CSV download URL.
//! - [`notify::Notifier`] fans out user-facing flash messages.
//!
//! Every background loop is bound to a [`tracker::Tracker`]; dropping the
//! tracker cancels the loop.

pub mod api;
pub mod config;
mod driver;
pub mod notify;
pub mod poller;
pub mod report;
pub mod tracker;

pub use api::{ApiError, RecalculationApi, ReportApi, ScroogeApi};
pub use config::{ClientConfig, ConfigError};
pub use notify::Notifier;
pub use poller::{JobPoller, JobTracker};
pub use report::{ReportPoller, ReportTracker};
