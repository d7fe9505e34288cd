#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use serde_json::{json, Value};
use tokio::time::Instant;

use scrooge_client::api::{ApiError, RecalculationApi, ReportApi};
use scrooge_core::job::{AcceptResponse, JobRequest, JobStatus, SubmitResponse};
use scrooge_core::report::{ReportProgress, ReportRequest};

/// One scripted answer of the fake server.
pub enum Reply {
    /// HTTP 200 with this JSON body.
    Body(Value),
    /// A non-2xx answer with this status code.
    Http(u16),
    /// HTTP 200 whose body is not JSON.
    Malformed,
}

impl Reply {
    fn into_result<T: serde::de::DeserializeOwned + std::fmt::Debug>(self) -> Result<T, ApiError> {
        match self {
            Reply::Body(body) => Ok(serde_json::from_value(body).expect("scripted body decodes")),
            Reply::Http(status) => Err(ApiError::Status {
                status,
                body: "scripted failure".to_string(),
            }),
            Reply::Malformed => Err(ApiError::from(
                serde_json::from_str::<T>("<html>Proxy error</html>").unwrap_err(),
            )),
        }
    }
}

pub fn http_errors(n: usize) -> Vec<Reply> {
    (0..n).map(|_| Reply::Http(500)).collect()
}

pub fn malformed(n: usize) -> Vec<Reply> {
    (0..n).map(|_| Reply::Malformed).collect()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// `{start: 2021-01-01, end: 2021-01-31, forecast: 0}`.
pub fn january() -> JobRequest {
    JobRequest::new(date("2021-01-01"), date("2021-01-31"), false).unwrap()
}

/// Assert that `later - earlier` is `expected`, within a millisecond.
pub fn assert_gap(earlier: Instant, later: Instant, expected: Duration) {
    let gap = later - earlier;
    assert!(
        gap >= expected && gap < expected + Duration::from_millis(1),
        "expected a gap of {expected:?}, got {gap:?}"
    );
}

// ---------------------------------------------------------------------------
// FakeCostsServer
// ---------------------------------------------------------------------------

/// In-memory stand-in for the monthly-costs endpoints.
///
/// Jobs are handed out ids from `job_ids` in order. Each job answers status
/// checks from its own script; an exhausted script answers `pending`.
#[derive(Default)]
pub struct FakeCostsServer {
    job_ids: Mutex<VecDeque<String>>,
    submit_failure: Mutex<Option<ApiError>>,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    status_calls: Mutex<Vec<(String, Instant)>>,
    submits: Mutex<Vec<JobRequest>>,
}

impl FakeCostsServer {
    pub fn new(job_ids: &[&str]) -> Self {
        Self {
            job_ids: Mutex::new(job_ids.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn script(self, job_id: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(job_id.to_string(), replies.into_iter().collect());
        self
    }

    pub fn failing_submit(self, error: ApiError) -> Self {
        *self.submit_failure.lock().unwrap() = Some(error);
        self
    }

    pub fn status_calls(&self, job_id: &str) -> Vec<Instant> {
        self.status_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == job_id)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn total_status_calls(&self) -> usize {
        self.status_calls.lock().unwrap().len()
    }

    pub fn submits(&self) -> Vec<JobRequest> {
        self.submits.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecalculationApi for FakeCostsServer {
    async fn submit_recalculation(&self, request: &JobRequest) -> Result<SubmitResponse, ApiError> {
        self.submits.lock().unwrap().push(request.clone());
        if let Some(error) = self.submit_failure.lock().unwrap().take() {
            return Err(error);
        }
        let job_id = self
            .job_ids
            .lock()
            .unwrap()
            .pop_front()
            .expect("a job id is scripted for every submit");
        Ok(SubmitResponse {
            job_id,
            message: "Please wait for costs recalculation.".to_string(),
        })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        self.status_calls
            .lock()
            .unwrap()
            .push((job_id.to_string(), Instant::now()));
        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Reply::Body(json!({"status": "pending", "progress": 50})));
        reply.into_result()
    }

    async fn accept_costs(&self, _request: &JobRequest) -> Result<AcceptResponse, ApiError> {
        Ok(AcceptResponse {
            status: Some("ok".to_string()),
            message: "Costs were accepted!".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeReportServer
// ---------------------------------------------------------------------------

/// In-memory stand-in for a report endpoint.
#[derive(Default)]
pub struct FakeReportServer {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Instant>>,
}

impl FakeReportServer {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportApi for FakeReportServer {
    async fn report_progress(&self, _report: &ReportRequest) -> Result<ReportProgress, ApiError> {
        self.calls.lock().unwrap().push(Instant::now());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::Body(json!({"progress": 10, "finished": false})));
        reply.into_result()
    }

    fn download_url(&self, report: &ReportRequest) -> Result<Url, ApiError> {
        let mut url = Url::parse("http://scrooge.test/report").unwrap();
        url.query_pairs_mut()
            .extend_pairs(report.download_query_pairs().iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }
}
