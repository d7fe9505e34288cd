//! Subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use scrooge_client::{ClientConfig, JobPoller, Notifier, ReportPoller, ScroogeApi};
use scrooge_core::allocation::{AllocationCategory, AllocationScope};
use scrooge_core::filters::{FilterKey, FilterState, RefreshDecision};
use scrooge_core::job::JobRequest;
use scrooge_core::poll::PollOutcome;
use scrooge_core::report::{ReportOutcome, ReportRequest};
use tokio_util::sync::CancellationToken;

use crate::args::{AllocationArgs, Command, CostRange};

/// Everything a subcommand needs to talk to the server.
pub struct Session {
    pub config: ClientConfig,
    pub api: Arc<ScroogeApi>,
    pub notifier: Arc<Notifier>,
}

pub async fn run(command: Command, ctx: Session) -> anyhow::Result<()> {
    match command {
        Command::Recalculate { range, accept } => recalculate(&ctx, range, accept).await,
        Command::Accept { range } => accept(&ctx, range).await,
        Command::CostsReport {
            range,
            only_active,
            output,
        } => {
            let report =
                ReportRequest::costs(range.start, range.end, range.forecast, only_active)?;
            report_to_file(&ctx, report, output).await
        }
        Command::UsagesReport {
            start,
            end,
            usage_types,
            output,
        } => {
            let report = ReportRequest::usages(start, end, usage_types)?;
            report_to_file(&ctx, report, output).await
        }
        Command::UsageTypes => usage_types(&ctx).await,
        Command::Allocations(args) => allocations(&ctx, args).await,
    }
}

fn job_request(range: &CostRange) -> anyhow::Result<JobRequest> {
    Ok(JobRequest::new(range.start, range.end, range.forecast)?)
}

/// Cancel `token` when the user presses Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    tracing::warn!("Interrupted, cancelling");
                    token.cancel();
                }
            }
        }
    });
}

async fn recalculate(ctx: &Session, range: CostRange, accept_after: bool) -> anyhow::Result<()> {
    let request = job_request(&range)?;
    let poller = JobPoller::new(
        Arc::clone(&ctx.api),
        ctx.config.poller,
        Arc::clone(&ctx.notifier),
    );

    let mut tracker = poller.submit(request.clone());
    cancel_on_ctrl_c(tracker.cancellation_token());

    let mut rows = None;
    while let Some(outcome) = tracker.next().await {
        match outcome {
            PollOutcome::Accepted { job_id, .. } => {
                tracing::info!(job_id = %job_id, "Job submitted");
            }
            PollOutcome::Progress { progress, .. } => println!("progress: {progress}%"),
            PollOutcome::Finished { data } => rows = Some(data),
            PollOutcome::Failed { message } => bail!("recalculation failed: {message}"),
        }
    }

    let Some(rows) = rows else {
        bail!("recalculation cancelled");
    };
    println!("{}", serde_json::to_string_pretty(&rows)?);

    if accept_after {
        poller.accept_costs(&request).await?;
    }
    Ok(())
}

async fn accept(ctx: &Session, range: CostRange) -> anyhow::Result<()> {
    let request = job_request(&range)?;
    let poller = JobPoller::new(
        Arc::clone(&ctx.api),
        ctx.config.poller,
        Arc::clone(&ctx.notifier),
    );
    let response = poller.accept_costs(&request).await?;
    if !response.is_ok() {
        bail!("costs not accepted: {}", response.message);
    }
    Ok(())
}

async fn report_to_file(
    ctx: &Session,
    report: ReportRequest,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let dest = output.unwrap_or_else(|| PathBuf::from(format!("{}.csv", report.section())));
    let poller = ReportPoller::new(
        Arc::clone(&ctx.api),
        ctx.config.poller,
        Arc::clone(&ctx.notifier),
    );

    let mut tracker = poller.track(report);
    cancel_on_ctrl_c(tracker.cancellation_token());

    let mut download_url = None;
    while let Some(outcome) = tracker.next().await {
        match outcome {
            ReportOutcome::Progress { progress } => println!("progress: {progress}%"),
            ReportOutcome::Ready { download_url: url } => download_url = Some(url),
            ReportOutcome::Failed { message } => bail!("report failed: {message}"),
        }
    }

    let Some(url) = download_url else {
        bail!("report cancelled");
    };
    let bytes = ctx
        .api
        .download(&url, &dest)
        .await
        .with_context(|| format!("downloading {url}"))?;
    tracing::info!(path = %dest.display(), bytes, "Report saved");
    println!("{}", dest.display());
    Ok(())
}

async fn usage_types(ctx: &Session) -> anyhow::Result<()> {
    for usage_type in ctx.api.usage_types().await? {
        println!("{}\t{}", usage_type.id, usage_type.name);
    }
    Ok(())
}

/// Filter values the allocation view is loaded for.
fn allocation_filters(args: &AllocationArgs) -> anyhow::Result<FilterState> {
    let mut filters = FilterState::new();
    filters.request(FilterKey::Subpage, "allocationclient");
    filters.request(FilterKey::Year, args.year.to_string());
    filters.request(FilterKey::Month, args.month.to_string());
    filters.request(FilterKey::Day, "1");

    match (&args.service, &args.env, &args.team) {
        (Some(service), Some(env), None) => {
            filters.request(FilterKey::LeftMenu, "services");
            filters.request(FilterKey::Service, service.as_str());
            filters.request(FilterKey::Env, env.as_str());
        }
        (None, None, Some(team)) => {
            filters.request(FilterKey::LeftMenu, "teams");
            filters.request(FilterKey::Team, team.as_str());
        }
        _ => bail!("pass either --service with --env, or --team"),
    }

    match filters.reconcile() {
        RefreshDecision::Refetch => Ok(filters),
        decision => bail!("filters not ready to fetch: {decision:?}"),
    }
}

async fn allocations(ctx: &Session, args: AllocationArgs) -> anyhow::Result<()> {
    let filters = allocation_filters(&args)?;
    let scope = AllocationScope::from_filters(&filters)?;
    tracing::debug!(path = %scope.path(), "Loading allocations");

    let data = ctx.api.allocation_client(&scope).await?;

    let categories: Vec<AllocationCategory> = match args.category {
        Some(category) => vec![category],
        None => AllocationCategory::ALL.to_vec(),
    };
    for category in categories {
        match category.total(&data) {
            Some(total) => println!("{category}\t{total:.2}"),
            None => println!("{category}\t-"),
        }
    }
    Ok(())
}
