/// Server-assigned identifier of a recalculation job.
pub type JobId = String;

/// Identifier of a usage type row on the server.
pub type UsageTypeId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
