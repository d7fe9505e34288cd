//! Allocation views of the dashboard.
//!
//! Allocation data is fetched either for a service environment or for a
//! team, always for one month. The response is a JSON object keyed by
//! [`AllocationCategory`], each entry holding a list of rows with a `value`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;
use crate::filters::{FilterKey, FilterState};

/// Base path of the allocation endpoints.
pub const ALLOCATION_CLIENT_PATH: &str = "/scrooge/rest/allocateclient";

/// Which allocation data to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "menu", rename_all = "snake_case")]
pub enum AllocationScope {
    Services {
        service: String,
        env: String,
        year: i32,
        month: u32,
    },
    Teams {
        team: String,
        year: i32,
        month: u32,
    },
}

impl AllocationScope {
    /// Endpoint path for this scope, relative to the server root.
    pub fn path(&self) -> String {
        match self {
            Self::Services {
                service,
                env,
                year,
                month,
            } => format!("{ALLOCATION_CLIENT_PATH}/{service}/{env}/{year}/{month}"),
            Self::Teams { team, year, month } => {
                format!("{ALLOCATION_CLIENT_PATH}/{team}/{year}/{month}")
            }
        }
    }

    /// Build a scope from the current (already reconciled) filter values.
    pub fn from_filters(filters: &FilterState) -> Result<Self, CoreError> {
        let year = required(filters, FilterKey::Year)?
            .parse::<i32>()
            .map_err(|_| CoreError::Validation("year must be a number".to_string()))?;
        let month = required(filters, FilterKey::Month)?
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| CoreError::Validation("month must be between 1 and 12".to_string()))?;

        match required(filters, FilterKey::LeftMenu)? {
            "services" => Ok(Self::Services {
                service: required(filters, FilterKey::Service)?.to_string(),
                env: required(filters, FilterKey::Env)?.to_string(),
                year,
                month,
            }),
            "teams" => Ok(Self::Teams {
                team: required(filters, FilterKey::Team)?.to_string(),
                year,
                month,
            }),
            other => Err(CoreError::Validation(format!("Unknown left menu: {other}"))),
        }
    }
}

fn required(filters: &FilterState, key: FilterKey) -> Result<&str, CoreError> {
    filters
        .current(key)
        .ok_or_else(|| CoreError::Validation(format!("{key} is not selected")))
}

/// Tabs of the allocation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AllocationCategory {
    ServiceDivision,
    ServiceExtraCost,
    TeamDivision,
}

impl AllocationCategory {
    pub const ALL: [AllocationCategory; 3] = [
        Self::ServiceDivision,
        Self::ServiceExtraCost,
        Self::TeamDivision,
    ];

    /// Key of this category in the allocation response.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServiceDivision => "serviceDivision",
            Self::ServiceExtraCost => "serviceExtraCost",
            Self::TeamDivision => "teamDivision",
        }
    }

    /// Sum of the `value` column of this category's rows.
    ///
    /// Values may be numbers or numeric strings; anything else counts as 0.
    /// Returns `None` when the category is missing from `data`.
    pub fn total(self, data: &serde_json::Value) -> Option<f64> {
        let rows = data.get(self.as_str())?.get("rows")?.as_array()?;
        Some(rows.iter().map(row_value).sum())
    }
}

impl fmt::Display for AllocationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown allocation category: {s}")))
    }
}

fn row_value(row: &serde_json::Value) -> f64 {
    match row.get("value") {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
