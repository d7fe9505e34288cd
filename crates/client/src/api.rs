//! REST API client for the Scrooge HTTP endpoints.
//!
//! Wraps cost recalculation, cost acceptance, report generation and the
//! lookup endpoints using [`reqwest`]. The pollers only see the
//! [`RecalculationApi`] and [`ReportApi`] traits so they can be driven by a
//! fake server in tests.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use scrooge_core::allocation::AllocationScope;
use scrooge_core::job::{AcceptResponse, JobRequest, JobStatus, SubmitResponse};
use scrooge_core::poll::SERVER_ERROR_MESSAGE;
use scrooge_core::report::{ReportProgress, ReportRequest, UsageType};

use crate::config::{ClientConfig, Endpoints};

/// Header carrying the CSRF token expected by the server.
const CSRF_HEADER: &str = "x-csrftoken";

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server refused the request (HTTP 400 or 412) with a message
    /// meant for the user.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Any other non-2xx status.
    #[error("Scrooge API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// A 2xx response whose body is not the expected JSON.
    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Text to show the user for this error.
    ///
    /// Only rejections carry a server-provided message; everything else is
    /// reported with the generic server-error text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            _ => SERVER_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Endpoints used by the job poller.
#[async_trait]
pub trait RecalculationApi: Send + Sync {
    /// `POST <monthly_costs>` with `{start, end, forecast}`.
    async fn submit_recalculation(&self, request: &JobRequest) -> Result<SubmitResponse, ApiError>;

    /// `GET <monthly_costs>/<job_id>`.
    async fn job_status(&self, job_id: &str) -> Result<JobStatus, ApiError>;

    /// `POST <accept_costs>` with `{start, end, forecast}`.
    async fn accept_costs(&self, request: &JobRequest) -> Result<AcceptResponse, ApiError>;
}

/// Endpoints used by the report poller.
#[async_trait]
pub trait ReportApi: Send + Sync {
    /// One progress check of a report.
    async fn report_progress(&self, report: &ReportRequest) -> Result<ReportProgress, ApiError>;

    /// URL of the finished report's CSV file.
    fn download_url(&self, report: &ReportRequest) -> Result<Url, ApiError>;
}

/// HTTP client for one Scrooge server.
pub struct ScroogeApi {
    client: reqwest::Client,
    base_url: Url,
    endpoints: Endpoints,
}

impl ScroogeApi {
    /// Build a client from configuration.
    ///
    /// Every request carries `Content-Type: application/json` and, when a
    /// token is configured, the `X-CSRFToken` header.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(default_headers(config.csrf_token.as_deref())?)
            .build()?;
        Self::with_client(client, config)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        Ok(Self {
            client,
            base_url,
            endpoints: config.endpoints.clone(),
        })
    }

    /// URL of the status endpoint of one job.
    pub fn job_status_url(&self, job_id: &str) -> Result<Url, ApiError> {
        let path = format!(
            "{}/{}",
            self.endpoints.monthly_costs.trim_end_matches('/'),
            job_id
        );
        self.endpoint(&path)
    }

    /// URL of a report endpoint with the given query pairs.
    pub fn report_url(
        &self,
        report: &ReportRequest,
        pairs: &[(&'static str, String)],
    ) -> Result<Url, ApiError> {
        let path = match report {
            ReportRequest::Costs { .. } => &self.endpoints.costs_report,
            ReportRequest::Usages { .. } => &self.endpoints.usages_report,
        };
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    /// List the usage types selectable in the usages report.
    pub async fn usage_types(&self) -> Result<Vec<UsageType>, ApiError> {
        let url = self.endpoint(&self.endpoints.usage_types)?;
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    /// Fetch the raw allocation data of a scope.
    pub async fn allocation_client(
        &self,
        scope: &AllocationScope,
    ) -> Result<serde_json::Value, ApiError> {
        let url = self.endpoint(&scope.path())?;
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    /// Download a file (typically a finished report) to `dest`.
    ///
    /// Returns the number of bytes written.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, ApiError> {
        let url = Url::parse(url).map_err(|e| ApiError::InvalidUrl(format!("{url}: {e}")))?;
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }

    // ---- private helpers ----

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    /// Ensure the response has a success status code.
    ///
    /// 400 and 412 become [`ApiError::Rejected`] with the body's `message`
    /// field (or the whole body when there is none); other failures become
    /// [`ApiError::Status`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if status == StatusCode::BAD_REQUEST || status == StatusCode::PRECONDITION_FAILED {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body),
            });
        }

        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl RecalculationApi for ScroogeApi {
    async fn submit_recalculation(&self, request: &JobRequest) -> Result<SubmitResponse, ApiError> {
        let url = self.endpoint(&self.endpoints.monthly_costs)?;
        let response = self.client.post(url).json(request).send().await?;
        Self::parse_response(response).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        let url = self.job_status_url(job_id)?;
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    async fn accept_costs(&self, request: &JobRequest) -> Result<AcceptResponse, ApiError> {
        let url = self.endpoint(&self.endpoints.accept_costs)?;
        let response = self.client.post(url).json(request).send().await?;
        Self::parse_response(response).await
    }
}

#[async_trait]
impl ReportApi for ScroogeApi {
    async fn report_progress(&self, report: &ReportRequest) -> Result<ReportProgress, ApiError> {
        let url = self.report_url(report, &report.query_pairs())?;
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    fn download_url(&self, report: &ReportRequest) -> Result<Url, ApiError> {
        self.report_url(report, &report.download_query_pairs())
    }
}

fn default_headers(csrf_token: Option<&str>) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = csrf_token {
        let value =
            HeaderValue::from_str(token).map_err(|e| ApiError::InvalidHeader(e.to_string()))?;
        headers.insert(HeaderName::from_static(CSRF_HEADER), value);
    }
    Ok(headers)
}

fn rejection_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
