use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::github::{GhClient, JobRecord, RetryMode, RunRecord, StepRecord};

/// Conclusions that count as a failure worth retrying.
const FAILED_CONCLUSIONS: [&str; 3] = ["failure", "timed_out", "cancelled"];
const SUCCESS_CONCLUSION: &str = "success";

fn is_failed_conclusion(conclusion: Option<&str>) -> bool {
    conclusion.is_some_and(|c| FAILED_CONCLUSIONS.contains(&c))
}

/// A step within a workflow job.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
}

impl From<StepRecord> for WorkflowStep {
    fn from(record: StepRecord) -> Self {
        Self {
            name: record.name,
            status: record.status,
            conclusion: record.conclusion,
        }
    }
}

impl WorkflowStep {
    pub fn is_failed(&self) -> bool {
        is_failed_conclusion(self.conclusion.as_deref())
    }
}

/// A job within a workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowJob {
    pub id: u64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub steps: Vec<WorkflowStep>,
}

impl From<JobRecord> for WorkflowJob {
    fn from(record: JobRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            status: record.status,
            conclusion: record.conclusion,
            steps: record.steps.into_iter().map(WorkflowStep::from).collect(),
        }
    }
}

impl WorkflowJob {
    /// Whether the job itself concluded in a failed state, independent of
    /// its steps.
    pub fn is_failed(&self) -> bool {
        is_failed_conclusion(self.conclusion.as_deref())
    }

    /// First step with the given name that failed, in listed order.
    ///
    /// Name matching is exact and case-sensitive.
    pub fn find_failed_step(&self, step_name: &str) -> Option<&WorkflowStep> {
        self.steps
            .iter()
            .find(|step| step.name.as_deref() == Some(step_name) && step.is_failed())
    }
}

/// A workflow run, constructed from one API snapshot.
///
/// Jobs and the retry count are fetched on first access and cached for the
/// run's lifetime; everything else is immutable.
pub struct WorkflowRun<'a> {
    client: &'a GhClient,
    pub id: u64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub path: String,
    jobs: Option<Vec<WorkflowJob>>,
    retry_count: Option<u32>,
}

impl<'a> WorkflowRun<'a> {
    pub fn new(client: &'a GhClient, record: RunRecord) -> Self {
        Self {
            client,
            id: record.id,
            name: record.name,
            status: record.status,
            conclusion: record.conclusion,
            created_at: record.created_at,
            path: record.path,
            jobs: None,
            retry_count: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        is_failed_conclusion(self.conclusion.as_deref())
    }

    pub fn succeeded(&self) -> bool {
        self.conclusion.as_deref() == Some(SUCCESS_CONCLUSION)
    }

    /// Jobs of this run, fetched once and cached.
    ///
    /// # Errors
    ///
    /// Fails only on a malformed job record; a transport failure yields an
    /// empty (and cached) list.
    pub fn jobs(&mut self) -> Result<&[WorkflowJob]> {
        if self.jobs.is_none() {
            let records = self.client.list_jobs_for_run(self.id)?;
            self.jobs = Some(records.into_iter().map(WorkflowJob::from).collect());
        }
        Ok(self.jobs.as_deref().unwrap_or_default())
    }

    /// Number of retries already performed, fetched once and cached.
    ///
    /// Derived as attempt ordinal minus one; an unobtainable attempt
    /// counts as zero retries.
    pub fn retry_count(&mut self) -> u32 {
        if self.retry_count.is_none() {
            let attempt = self.client.run_attempt(self.id);
            self.retry_count = Some(attempt.saturating_sub(1));
        }
        self.retry_count.unwrap_or(0)
    }

    /// Request a rerun of this run. Returns whether the request was
    /// accepted.
    pub fn retry(&self, mode: RetryMode) -> bool {
        self.client.rerun(self.id, mode)
    }
}
