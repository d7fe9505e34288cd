//! `scrooge` -- command line client for the Scrooge cost dashboard.
//!
//! Recalculates monthly costs, accepts them, generates CSV reports and
//! prints allocation totals against a running Scrooge server.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                 | Description                        |
//! |------------------------|----------|-------------------------|------------------------------------|
//! | `SCROOGE_BASE_URL`     | no       | `http://localhost:8000` | Server root                        |
//! | `SCROOGE_CSRF_TOKEN`   | no       | --                      | Sent as `X-CSRFToken`              |
//! | `POLL_INTERVAL_MS`     | no       | `5000`                  | Delay between status checks        |
//! | `MAX_API_ERRORS`       | no       | `10`                    | Consecutive failures before giving up |
//! | `REQUEST_TIMEOUT_SECS` | no       | `30`                    | Per-request HTTP timeout           |
//! | `RUST_LOG`             | no       | `scrooge=info`          | Log filter                         |
//!
//! Endpoint paths can be overridden too, see [`ClientConfig::from_env`].

mod args;
mod commands;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use scrooge_client::{ClientConfig, Notifier, ScroogeApi};
use scrooge_core::flash::{FlashMessage, DEFAULT_FLASH_TTL};
use scrooge_core::types::Timestamp;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use args::Cli;
use commands::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scrooge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = ClientConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        base_url = %config.base_url,
        interval_ms = config.poller.interval.as_millis() as u64,
        max_consecutive_errors = config.poller.max_consecutive_errors,
        "Starting scrooge client",
    );

    let api = Arc::new(ScroogeApi::new(&config)?);
    let notifier = Arc::new(Notifier::default());
    let printer = tokio::spawn(print_flashes(notifier.subscribe()));

    let session = Session {
        config,
        api,
        notifier: Arc::clone(&notifier),
    };
    let result = commands::run(cli.command, session).await;

    // Closing the last sender lets the printer drain and exit.
    drop(notifier);
    let _ = printer.await;

    result
}

/// Print flash messages as they arrive until the notifier goes away.
async fn print_flashes(mut flashes: broadcast::Receiver<FlashMessage>) {
    loop {
        match flashes.recv().await {
            Ok(flash) => {
                if let Some(line) = render(&flash, chrono::Utc::now()) {
                    println!("{line}");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Flash printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Banner line for `flash`, or `None` once it would already have been
/// dismissed.
fn render(flash: &FlashMessage, now: Timestamp) -> Option<String> {
    if flash.is_expired_at(now, DEFAULT_FLASH_TTL) {
        return None;
    }
    Some(format!("[{}] {}", flash.level, flash.text))
}
