use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use scrooge_core::allocation::AllocationCategory;
use scrooge_core::types::UsageTypeId;

/// Command line client for the Scrooge cost dashboard.
///
/// Server address, CSRF token and poll tunables come from the environment
/// (a `.env` file is honoured).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recalculate monthly costs for a date range and wait for the result.
    Recalculate {
        #[command(flatten)]
        range: CostRange,
        /// Accept the recalculated costs once the job has finished.
        #[arg(long, default_value_t = false)]
        accept: bool,
    },
    /// Mark the costs of a date range as accepted.
    Accept {
        #[command(flatten)]
        range: CostRange,
    },
    /// Generate the services costs report and download it as CSV.
    CostsReport {
        #[command(flatten)]
        range: CostRange,
        /// Only include active service environments.
        #[arg(long, default_value_t = false)]
        only_active: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate the services usages report and download it as CSV.
    UsagesReport {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        /// Usage type id to include; repeat for several. All when omitted.
        #[arg(long = "usage-type")]
        usage_types: Vec<UsageTypeId>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the usage types known to the server.
    UsageTypes,
    /// Show allocation totals of a service environment or a team.
    Allocations(AllocationArgs),
}

/// Date range of a cost operation.
#[derive(Args, Debug, Clone)]
pub struct CostRange {
    /// First day, `YYYY-MM-DD`.
    #[arg(long)]
    pub start: NaiveDate,
    /// Last day, `YYYY-MM-DD`.
    #[arg(long)]
    pub end: NaiveDate,
    /// Use forecast prices instead of real ones.
    #[arg(long, default_value_t = false)]
    pub forecast: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AllocationArgs {
    #[arg(long)]
    pub year: i32,
    #[arg(long)]
    pub month: u32,
    /// Service UID; requires `--env`.
    #[arg(long, requires = "env", conflicts_with = "team")]
    pub service: Option<String>,
    #[arg(long, requires = "service")]
    pub env: Option<String>,
    /// Team id.
    #[arg(long)]
    pub team: Option<String>,
    /// Only print this category (`serviceDivision`, `serviceExtraCost`,
    /// `teamDivision`).
    #[arg(long)]
    pub category: Option<AllocationCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recalculate_with_forecast() {
        let cli = Cli::try_parse_from([
            "scrooge",
            "recalculate",
            "--start",
            "2021-01-01",
            "--end",
            "2021-01-31",
            "--forecast",
        ])
        .unwrap();

        match cli.command {
            Command::Recalculate { range, accept } => {
                assert_eq!(range.start, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
                assert_eq!(range.end, NaiveDate::from_ymd_opt(2021, 1, 31).unwrap());
                assert!(range.forecast);
                assert!(!accept);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn usage_types_repeat() {
        let cli = Cli::try_parse_from([
            "scrooge",
            "usages-report",
            "--start",
            "2021-02-01",
            "--end",
            "2021-02-28",
            "--usage-type",
            "3",
            "--usage-type",
            "7",
        ])
        .unwrap();

        match cli.command {
            Command::UsagesReport { usage_types, .. } => assert_eq!(usage_types, vec![3, 7]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_date() {
        let result = Cli::try_parse_from([
            "scrooge",
            "accept",
            "--start",
            "2021-13-01",
            "--end",
            "2021-01-31",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn service_and_team_conflict() {
        let result = Cli::try_parse_from([
            "scrooge",
            "allocations",
            "--year",
            "2021",
            "--month",
            "1",
            "--service",
            "sc-1",
            "--env",
            "prod",
            "--team",
            "7",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_allocation_category() {
        let cli = Cli::try_parse_from([
            "scrooge",
            "allocations",
            "--year",
            "2021",
            "--month",
            "1",
            "--team",
            "7",
            "--category",
            "teamDivision",
        ])
        .unwrap();

        match cli.command {
            Command::Allocations(args) => {
                assert_eq!(args.category, Some(AllocationCategory::TeamDivision));
                assert_eq!(args.team.as_deref(), Some("7"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
