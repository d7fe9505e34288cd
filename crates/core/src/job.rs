//! Wire types for the monthly-costs recalculation endpoints.
//!
//! A recalculation is started with `POST <monthly_costs_url>` carrying a
//! [`JobRequest`] and answered with a [`SubmitResponse`]. Progress is read
//! with `GET <monthly_costs_url><job_id>`, which returns a [`JobStatus`].

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::types::JobId;

/// Parameters of a cost recalculation (or cost acceptance) request.
///
/// Serializes to `{"start": "YYYY-MM-DD", "end": "YYYY-MM-DD", "forecast": 0|1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRequest {
    start: NaiveDate,
    end: NaiveDate,
    #[serde(serialize_with = "serialize_flag")]
    forecast: bool,
}

impl JobRequest {
    /// Build a request for the inclusive range `start..=end`.
    ///
    /// The server rejects ranges that end before they start, so they are
    /// refused here as well.
    pub fn new(start: NaiveDate, end: NaiveDate, forecast: bool) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::Validation(
                "End date can not be less than start date.".to_string(),
            ));
        }
        Ok(Self {
            start,
            end,
            forecast,
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn forecast(&self) -> bool {
        self.forecast
    }
}

/// Handle of a job the server accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: JobId,
}

/// Response of the submit endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    #[serde(default)]
    pub message: String,
}

impl SubmitResponse {
    pub fn handle(&self) -> JobHandle {
        JobHandle {
            job_id: self.job_id.clone(),
        }
    }
}

/// Response of the accept-costs endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AcceptResponse {
    /// `"ok"` or `"failed"`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl AcceptResponse {
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }
}

/// Server-side state of a job.
///
/// The set is closed: anything the server sends besides `finished` and
/// `failed` (including its own `running`, `null` or a missing field) reads
/// as [`JobState::Pending`] so the client keeps polling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Pending,
    Finished,
    Failed,
}

impl JobState {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "finished" => Self::Finished,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

impl<'de> Deserialize<'de> for JobState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(Self::from_wire).unwrap_or_default())
    }
}

/// One snapshot of a job read from the status endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub status: JobState,
    /// Completion percentage (0-100).
    #[serde(default, deserialize_with = "deserialize_percent")]
    pub progress: u8,
    /// Partial or final result rows, passed through untouched.
    #[serde(default)]
    pub data: Option<Vec<serde_json::Value>>,
}

fn serialize_flag<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

/// Read a percentage that may arrive as an integer, a float or garbage.
///
/// Floats are rounded, everything is clamped to `0..=100`, and values that
/// are not numbers read as 0.
pub(crate) fn deserialize_percent<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<u8, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    let value = raw.as_f64().unwrap_or(0.0).round().clamp(0.0, 100.0);
    Ok(value as u8)
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
    fn request_serializes_forecast_as_integer() {
        let req = JobRequest::new(date("2021-01-01"), date("2021-01-31"), false).unwrap();
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({"start": "2021-01-01", "end": "2021-01-31", "forecast": 0})
        );

        let req = JobRequest::new(date("2021-01-01"), date("2021-01-01"), true).unwrap();
        assert_eq!(serde_json::to_value(&req).unwrap()["forecast"], 1);
    }

    #[test]
    fn request_rejects_reversed_range() {
        let err = JobRequest::new(date("2021-02-01"), date("2021-01-31"), false);
        assert_matches!(err, Err(CoreError::Validation(_)));
    }

    #[test]
    fn known_states_decode() {
        let s: JobStatus = serde_json::from_value(json!({"status": "finished"})).unwrap();
        assert_eq!(s.status, JobState::Finished);
        let s: JobStatus = serde_json::from_value(json!({"status": "failed"})).unwrap();
        assert_eq!(s.status, JobState::Failed);
        let s: JobStatus = serde_json::from_value(json!({"status": "pending"})).unwrap();
        assert_eq!(s.status, JobState::Pending);
    }

    #[test]
    fn unrecognized_state_reads_as_pending() {
        for body in [
            json!({"status": "running", "progress": 10}),
            json!({"status": null}),
            json!({"status": 3}),
            json!({"progress": 50}),
            json!({}),
        ] {
            let s: JobStatus = serde_json::from_value(body.clone()).unwrap();
            assert_eq!(s.status, JobState::Pending, "body: {body}");
        }
    }

    #[test]
    fn progress_is_rounded_and_clamped() {
        let s: JobStatus = serde_json::from_value(json!({"progress": 33.4})).unwrap();
        assert_eq!(s.progress, 33);
        let s: JobStatus = serde_json::from_value(json!({"progress": 66.6})).unwrap();
        assert_eq!(s.progress, 67);
        let s: JobStatus = serde_json::from_value(json!({"progress": 140})).unwrap();
        assert_eq!(s.progress, 100);
        let s: JobStatus = serde_json::from_value(json!({"progress": -5})).unwrap();
        assert_eq!(s.progress, 0);
        let s: JobStatus = serde_json::from_value(json!({"progress": "lots"})).unwrap();
        assert_eq!(s.progress, 0);
    }

    #[test]
    fn data_rows_are_kept_verbatim() {
        let s: JobStatus = serde_json::from_value(json!({
            "status": "finished",
            "progress": 100,
            "data": [{"date": "2021-01-01", "accepted": true}, ["2021-01-02", {"ok": false}]],
        }))
        .unwrap();
        let data = s.data.unwrap();
        assert_eq!(data[0], json!({"date": "2021-01-01", "accepted": true}));
        assert_eq!(data[1], json!(["2021-01-02", {"ok": false}]));
    }

    #[test]
    fn submit_response_yields_handle() {
        let r: SubmitResponse =
            serde_json::from_value(json!({"job_id": "abc", "message": "Please wait"})).unwrap();
        assert_eq!(r.handle().job_id, "abc");
        assert_eq!(r.message, "Please wait");
    }

    #[test]
    fn accept_response_status() {
        let r: AcceptResponse =
            serde_json::from_value(json!({"status": "ok", "message": "Costs were accepted!"}))
                .unwrap();
        assert!(r.is_ok());
        let r: AcceptResponse = serde_json::from_value(json!({"message": "nope"})).unwrap();
        assert!(!r.is_ok());
    }
}
