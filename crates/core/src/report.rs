//! Report generation requests and their progress payloads.
//!
//! Reports are built server-side in the background. The client repeats the
//! same `GET` with identical query parameters until the response says
//! `finished`, then downloads the file by adding `report_format=csv`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::deserialize_percent;
use crate::types::UsageTypeId;

/// Query parameter selecting the CSV rendition of a finished report.
pub const REPORT_FORMAT_PARAM: (&str, &str) = ("report_format", "csv");

/// A report the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportRequest {
    /// Costs per service environment.
    Costs {
        start: NaiveDate,
        end: NaiveDate,
        forecast: bool,
        only_active: bool,
    },
    /// Usages per service environment, optionally limited to some usage types.
    Usages {
        start: NaiveDate,
        end: NaiveDate,
        usage_types: Vec<UsageTypeId>,
    },
}

impl ReportRequest {
    pub fn costs(
        start: NaiveDate,
        end: NaiveDate,
        forecast: bool,
        only_active: bool,
    ) -> Result<Self, CoreError> {
        check_range(start, end)?;
        Ok(Self::Costs {
            start,
            end,
            forecast,
            only_active,
        })
    }

    pub fn usages(
        start: NaiveDate,
        end: NaiveDate,
        usage_types: Vec<UsageTypeId>,
    ) -> Result<Self, CoreError> {
        check_range(start, end)?;
        Ok(Self::Usages {
            start,
            end,
            usage_types,
        })
    }

    /// Short name, also used as the default download file stem.
    pub fn section(&self) -> &'static str {
        match self {
            Self::Costs { .. } => "services-costs-report",
            Self::Usages { .. } => "services-usages-report",
        }
    }

    /// Query string pairs of the progress request, in wire order.
    ///
    /// Usage types repeat the `usage_types` key once per selected id.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Costs {
                start,
                end,
                forecast,
                only_active,
            } => vec![
                ("start", format_date(*start)),
                ("end", format_date(*end)),
                ("forecast", flag(*forecast)),
                ("is_active", flag(*only_active)),
            ],
            Self::Usages {
                start,
                end,
                usage_types,
            } => {
                let mut pairs = vec![("start", format_date(*start)), ("end", format_date(*end))];
                pairs.extend(usage_types.iter().map(|id| ("usage_types", id.to_string())));
                pairs
            }
        }
    }

    /// Query pairs of the download request.
    pub fn download_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = self.query_pairs();
        pairs.push((REPORT_FORMAT_PARAM.0, REPORT_FORMAT_PARAM.1.to_string()));
        pairs
    }
}

/// Progress payload of a report endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportProgress {
    #[serde(default, deserialize_with = "deserialize_percent")]
    pub progress: u8,
    #[serde(default)]
    pub finished: bool,
}

/// Update emitted by the report poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportOutcome {
    Progress { progress: u8 },
    /// The report is ready at `download_url`.
    Ready { download_url: String },
    Failed { message: String },
}

impl ReportOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// A selectable usage type, as listed by the usage-types endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageType {
    pub id: UsageTypeId,
    pub name: String,
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), CoreError> {
    if start > end {
        return Err(CoreError::Validation(
            "End date can not be less than start date.".to_string(),
        ));
    }
    Ok(())
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn costs_query_uses_only_active_for_is_active() {
        let report = ReportRequest::costs(date("2021-01-01"), date("2021-01-31"), true, false).unwrap();
        assert_eq!(
            report.query_pairs(),
            vec![
                ("start", "2021-01-01".to_string()),
                ("end", "2021-01-31".to_string()),
                ("forecast", "1".to_string()),
                ("is_active", "0".to_string()),
            ]
        );
    }

    #[test]
    fn usages_query_repeats_usage_types() {
        let report =
            ReportRequest::usages(date("2021-03-01"), date("2021-03-02"), vec![4, 9]).unwrap();
        let pairs = report.query_pairs();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[2], ("usage_types", "4".to_string()));
        assert_eq!(pairs[3], ("usage_types", "9".to_string()));
    }

    #[test]
    fn download_query_appends_csv_format() {
        let report = ReportRequest::usages(date("2021-03-01"), date("2021-03-02"), vec![]).unwrap();
        let pairs = report.download_query_pairs();
        assert_eq!(pairs.last(), Some(&("report_format", "csv".to_string())));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = ReportRequest::costs(date("2021-03-02"), date("2021-03-01"), false, false);
        assert_matches!(err, Err(CoreError::Validation(_)));
    }

    #[test]
    fn progress_payload_decodes() {
        let p: ReportProgress =
            serde_json::from_value(json!({"status": true, "progress": 99.6, "finished": false}))
                .unwrap();
        assert_eq!(p.progress, 100);
        assert!(!p.finished);

        let p: ReportProgress = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.progress, 0);
        assert!(!p.finished);
    }

    #[test]
    fn sections() {
        let costs = ReportRequest::costs(date("2021-01-01"), date("2021-01-01"), false, true).unwrap();
        assert_eq!(costs.section(), "services-costs-report");
    }
}
