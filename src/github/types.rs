use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Raw workflow run record as returned by the GitHub Actions API.
///
/// The `id` field is required: a record without it fails deserialization,
/// which is treated as a fatal response error rather than a skippable run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRecord {
    /// Unique identifier for the workflow run
    pub id: u64,
    /// Name of the workflow
    pub name: Option<String>,
    /// Status of the run (queued, in_progress, completed)
    pub status: Option<String>,
    /// Conclusion of the run; absent until the run completes
    pub conclusion: Option<String>,
    /// When the run was created
    pub created_at: Option<DateTime<Utc>>,
    /// Path to the workflow file
    #[serde(default)]
    pub path: String,
}

/// Raw job record, with its steps embedded.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRecord {
    /// Unique identifier for the job; required
    pub id: u64,
    /// Name of the job
    pub name: Option<String>,
    /// Status of the job
    pub status: Option<String>,
    /// Conclusion of the job
    pub conclusion: Option<String>,
    /// Steps in this job
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

/// Raw step record within a job.
#[derive(Debug, Clone, Deserialize)]
pub struct StepRecord {
    /// Name of the step
    pub name: Option<String>,
    /// Status of the step
    pub status: Option<String>,
    /// Conclusion of the step
    pub conclusion: Option<String>,
}
