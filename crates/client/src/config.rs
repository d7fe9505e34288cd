//! Client configuration: server root, CSRF token, endpoint paths and poll
//! tunables, read from the environment.

use std::str::FromStr;
use std::time::Duration;

use scrooge_core::poll::{PollerConfig, DEFAULT_MAX_CONSECUTIVE_ERRORS, DEFAULT_POLL_INTERVAL};

/// Paths of the REST endpoints, relative to the server root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub monthly_costs: String,
    pub accept_costs: String,
    pub costs_report: String,
    pub usages_report: String,
    pub usage_types: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            monthly_costs: "/scrooge/rest/monthly_costs/".into(),
            accept_costs: "/scrooge/rest/accept_monthly_costs/".into(),
            costs_report: "/scrooge/rest/services-costs-report".into(),
            usages_report: "/scrooge/rest/services-usages-report".into(),
            usage_types: "/scrooge/rest/usage_types/".into(),
        }
    }
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local development server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Value sent in the `X-CSRFToken` header, when set.
    pub csrf_token: Option<String>,
    pub endpoints: Endpoints,
    pub poller: PollerConfig,
    /// Timeout of a single HTTP request.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            csrf_token: None,
            endpoints: Endpoints::default(),
            poller: PollerConfig::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                |
    /// |------------------------|----------------------------------------|
    /// | `SCROOGE_BASE_URL`     | `http://localhost:8000`                |
    /// | `SCROOGE_CSRF_TOKEN`   | unset                                  |
    /// | `MONTHLY_COSTS_PATH`   | `/scrooge/rest/monthly_costs/`         |
    /// | `ACCEPT_COSTS_PATH`    | `/scrooge/rest/accept_monthly_costs/`  |
    /// | `COSTS_REPORT_PATH`    | `/scrooge/rest/services-costs-report`  |
    /// | `USAGES_REPORT_PATH`   | `/scrooge/rest/services-usages-report` |
    /// | `USAGE_TYPES_PATH`     | `/scrooge/rest/usage_types/`           |
    /// | `POLL_INTERVAL_MS`     | `5000`                                 |
    /// | `MAX_API_ERRORS`       | `10`                                   |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Endpoints::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);

        let endpoints = Endpoints {
            monthly_costs: text("MONTHLY_COSTS_PATH", defaults.monthly_costs),
            accept_costs: text("ACCEPT_COSTS_PATH", defaults.accept_costs),
            costs_report: text("COSTS_REPORT_PATH", defaults.costs_report),
            usages_report: text("USAGES_REPORT_PATH", defaults.usages_report),
            usage_types: text("USAGE_TYPES_PATH", defaults.usage_types),
        };

        let interval_ms: u64 = parse(
            &lookup,
            "POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL.as_millis() as u64,
        )?;
        let max_consecutive_errors: u32 =
            parse(&lookup, "MAX_API_ERRORS", DEFAULT_MAX_CONSECUTIVE_ERRORS)?;
        if max_consecutive_errors == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_API_ERRORS",
                value: "0".into(),
            });
        }
        let timeout_secs: u64 =
            parse(&lookup, "REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        Ok(Self {
            base_url: text("SCROOGE_BASE_URL", "http://localhost:8000".into()),
            csrf_token: lookup("SCROOGE_CSRF_TOKEN").filter(|t| !t.is_empty()),
            endpoints,
            poller: PollerConfig {
                interval: Duration::from_millis(interval_ms),
                max_consecutive_errors,
            },
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
