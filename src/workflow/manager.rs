use log::{error, info, warn};

use crate::error::Result;
use crate::github::{GhClient, RetryMode};

use super::decision;
use super::model::WorkflowRun;

/// Result of one retry check, reported as output variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
    /// Run conclusion, falling back to its status, or "not_found"
    pub status: String,
    /// Retries performed so far, counting one issued by this invocation
    pub retry_count: u32,
    /// Whether this invocation triggered a retry
    pub was_retried: bool,
    /// Identifier of the inspected run, if one was found
    pub run_id: Option<u64>,
}

impl RetryOutcome {
    fn not_retried(status: String, run_id: Option<u64>) -> Self {
        Self {
            status,
            retry_count: 0,
            was_retried: false,
            run_id,
        }
    }
}

/// Resolves the latest run for a branch and workflow, applies the retry
/// decision, and enforces the retry budget.
pub struct RetryManager {
    client: GhClient,
    branch: String,
    workflow: String,
    max_retries: u32,
    retry_mode: RetryMode,
}

impl RetryManager {
    pub fn new(
        repo: String,
        branch: String,
        workflow: String,
        max_retries: u32,
        retry_mode: RetryMode,
    ) -> Self {
        Self {
            client: GhClient::new(repo),
            branch,
            workflow,
            max_retries,
            retry_mode,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_client(
        client: GhClient,
        branch: String,
        workflow: String,
        max_retries: u32,
        retry_mode: RetryMode,
    ) -> Self {
        Self {
            client,
            branch,
            workflow,
            max_retries,
            retry_mode,
        }
    }

    /// A run belongs to the configured workflow when its display name
    /// matches, or its declaring file path ends with "/<workflow>".
    fn matches_workflow(&self, run: &WorkflowRun<'_>) -> bool {
        run.name.as_deref() == Some(self.workflow.as_str())
            || run.path.ends_with(&format!("/{}", self.workflow))
    }

    /// Most recent matching run on the latest commit of the branch.
    fn latest_workflow_run(&self) -> Result<Option<WorkflowRun<'_>>> {
        let sha = self.client.latest_commit_sha(&self.branch)?;
        info!("Latest commit on {}: {}", self.branch, sha);
        info!(
            "Querying workflow runs for: workflow={}, branch={}, commit={}",
            self.workflow,
            self.branch,
            &sha[..sha.len().min(8)]
        );

        let records = self.client.list_runs_for_commit(&self.branch, &sha)?;
        let mut runs: Vec<WorkflowRun<'_>> = records
            .into_iter()
            .map(|r| WorkflowRun::new(&self.client, r))
            .filter(|r| self.matches_workflow(r))
            .collect();
        info!("Found {} matching workflow runs", runs.len());

        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs.into_iter().next())
    }

    /// Run the complete retry check.
    ///
    /// # Errors
    ///
    /// Fails when the latest commit cannot be resolved or a job/run record
    /// is malformed; every other remote failure degrades to a "no retry"
    /// outcome.
    pub fn execute(
        &self,
        job_filter: Option<&str>,
        step_filter: Option<&str>,
    ) -> Result<RetryOutcome> {
        info!("Repository: {}", self.client.repo());

        let Some(mut run) = self.latest_workflow_run()? else {
            info!(
                "No workflow run found for '{}' on branch '{}'",
                self.workflow, self.branch
            );
            return Ok(RetryOutcome::not_retried("not_found".to_string(), None));
        };

        info!("Workflow run ID: {}", run.id);
        info!(
            "Workflow status: {}",
            run.conclusion.as_deref().unwrap_or("unknown")
        );

        // Success short-circuits before any job or attempt fetch.
        if run.succeeded() {
            info!("Workflow succeeded, no retry needed");
            let status = run.conclusion.clone().unwrap_or_else(|| "unknown".to_string());
            return Ok(RetryOutcome::not_retried(status, Some(run.id)));
        }

        let decision = decision::evaluate(&mut run, job_filter, step_filter)?;
        info!("Retry decision: {}", decision.reason());

        if !decision.should_retry() {
            info!("Not retrying: {}", decision.reason());
            let status = run
                .conclusion
                .clone()
                .or_else(|| run.status.clone())
                .unwrap_or_else(|| "unknown".to_string());
            return Ok(RetryOutcome::not_retried(status, Some(run.id)));
        }

        // The attempt count is only needed once a retry is on the table.
        let mut retry_count = run.retry_count();
        info!("Current retry count: {retry_count}");

        let mut was_retried = false;
        if retry_count < self.max_retries {
            info!(
                "Retrying workflow (mode: {}, attempt {}/{})...",
                self.retry_mode,
                retry_count + 1,
                self.max_retries
            );
            was_retried = run.retry(self.retry_mode);
            if was_retried {
                info!("Workflow retry initiated successfully");
                retry_count += 1;
            } else {
                error!("Failed to retry workflow");
            }
        } else {
            warn!(
                "Max retries ({}) already reached, not retrying",
                self.max_retries
            );
        }

        Ok(RetryOutcome {
            status: run.conclusion.clone().unwrap_or_else(|| "unknown".to_string()),
            retry_count,
            was_retried,
            run_id: Some(run.id),
        })
    }
}
