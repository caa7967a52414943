use crate::error::Result;

use super::model::WorkflowRun;

/// Outcome of the retry decision, with a human-readable reason.
///
/// The reason strings are part of the tool's observable contract: they are
/// logged, surfaced in the step summary, and asserted in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Retry { reason: String },
    Skip { reason: String },
}

impl Decision {
    fn retry(reason: String) -> Self {
        Self::Retry { reason }
    }

    fn skip(reason: String) -> Self {
        Self::Skip { reason }
    }

    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Retry { reason } | Self::Skip { reason } => reason,
        }
    }
}

/// Decide whether a run should be retried, given optional job and step
/// name filters.
///
/// Rules are evaluated in order, first match wins:
/// 1. no conclusion yet (still running) -> skip
/// 2. concluded successfully -> skip
/// 3. both filters -> retry only if the named step failed in the named job
/// 4. step filter -> retry if the named step failed in any job
/// 5. job filter -> retry if the named job failed
/// 6. no filters -> retry on any failure
///
/// With both filters given, a job-level failure that is not the named
/// step's failure does not trigger a retry.
///
/// # Errors
///
/// Propagates a malformed job record from the lazy jobs fetch; rules that
/// need no job data never fetch it.
pub fn evaluate(
    run: &mut WorkflowRun<'_>,
    job_filter: Option<&str>,
    step_filter: Option<&str>,
) -> Result<Decision> {
    if run.conclusion.is_none() {
        let status = run.status.clone().unwrap_or_else(|| "unknown".to_string());
        return Ok(Decision::skip(format!(
            "Workflow is still in progress (status: {status}), not retrying"
        )));
    }

    if run.succeeded() {
        let conclusion = run.conclusion.clone().unwrap_or_default();
        return Ok(Decision::skip(format!(
            "Workflow status is '{conclusion}', no retry needed"
        )));
    }

    let decision = match (job_filter, step_filter) {
        (Some(job_name), Some(step_name)) => {
            match run.jobs()?.iter().find(|j| j.name.as_deref() == Some(job_name)) {
                Some(job) => {
                    if job.find_failed_step(step_name).is_some() {
                        Decision::retry(format!(
                            "Step '{step_name}' in job '{job_name}' failed"
                        ))
                    } else {
                        Decision::skip(format!(
                            "Step '{step_name}' in job '{job_name}' did not fail \
                             (other failures ignored)"
                        ))
                    }
                }
                None => Decision::skip(format!("Job '{job_name}' not found")),
            }
        }
        (None, Some(step_name)) => {
            match run
                .jobs()?
                .iter()
                .find(|j| j.find_failed_step(step_name).is_some())
            {
                Some(job) => {
                    let job_name = job.name.clone().unwrap_or_default();
                    Decision::retry(format!("Step '{step_name}' failed in job '{job_name}'"))
                }
                None => Decision::skip(format!(
                    "Step '{step_name}' did not fail (other failures ignored)"
                )),
            }
        }
        (Some(job_name), None) => {
            match run.jobs()?.iter().find(|j| j.name.as_deref() == Some(job_name)) {
                Some(job) if job.is_failed() => {
                    Decision::retry(format!("Job '{job_name}' failed"))
                }
                Some(_) => Decision::skip(format!(
                    "Job '{job_name}' did not fail (other failures ignored)"
                )),
                None => Decision::skip(format!("Job '{job_name}' not found")),
            }
        }
        (None, None) => Decision::retry("Workflow has failures".to_string()),
    };

    Ok(decision)
}

#[cfg(test)]
mod tests {
    use crate::github::testing::FakeGh;
    use crate::github::GhClient;

    use super::*;

    const JOBS_ENDPOINT: &str = "repos/owner/repo/actions/runs/9/jobs";

    // Job "build" failed at step "Test"; job "lint" failed as a whole but
    // at a different step; job "deploy" succeeded.
    const JOBS_JSON: &str = concat!(
        r#"{"id": 1, "name": "build", "conclusion": "failure", "steps": [{"name": "Checkout", "conclusion": "success"}, {"name": "Test", "conclusion": "failure"}]}"#,
        "\n",
        r#"{"id": 2, "name": "lint", "conclusion": "failure", "steps": [{"name": "Lint", "conclusion": "failure"}]}"#,
        "\n",
        r#"{"id": 3, "name": "deploy", "conclusion": "success", "steps": [{"name": "Deploy", "conclusion": "success"}]}"#,
    );

    fn failed_run(client: &GhClient) -> WorkflowRun<'_> {
        let record = serde_json::from_str(
            r#"{"id": 9, "status": "completed", "conclusion": "failure"}"#,
        )
        .unwrap();
        WorkflowRun::new(client, record)
    }

    fn client_with_jobs() -> GhClient {
        let fake = FakeGh::new().respond(JOBS_ENDPOINT, JOBS_JSON);
        GhClient::with_runner("owner/repo".to_string(), Box::new(fake))
    }

    #[test]
    fn in_progress_run_is_never_retried() {
        let client = client_with_jobs();
        let record =
            serde_json::from_str(r#"{"id": 9, "status": "in_progress"}"#).unwrap();
        let mut run = WorkflowRun::new(&client, record);

        let decision = evaluate(&mut run, Some("build"), Some("Test")).unwrap();
        assert!(!decision.should_retry());
        assert_eq!(
            decision.reason(),
            "Workflow is still in progress (status: in_progress), not retrying"
        );
    }

    #[test]
    fn successful_run_is_never_retried() {
        let client = client_with_jobs();
        let record = serde_json::from_str(
            r#"{"id": 9, "status": "completed", "conclusion": "success"}"#,
        )
        .unwrap();
        let mut run = WorkflowRun::new(&client, record);

        let decision = evaluate(&mut run, Some("build"), Some("Test")).unwrap();
        assert!(!decision.should_retry());
        assert_eq!(decision.reason(), "Workflow status is 'success', no retry needed");
    }

    #[test]
    fn both_filters_match_named_failed_step() {
        let client = client_with_jobs();
        let mut run = failed_run(&client);
        let decision = evaluate(&mut run, Some("build"), Some("Test")).unwrap();
        assert!(decision.should_retry());
        assert_eq!(decision.reason(), "Step 'Test' in job 'build' failed");
    }

    #[test]
    fn both_filters_ignore_other_failures_in_named_job() {
        // "lint" failed, but not at a step named "Test".
        let client = client_with_jobs();
        let mut run = failed_run(&client);
        let decision = evaluate(&mut run, Some("lint"), Some("Test")).unwrap();
        assert!(!decision.should_retry());
        assert_eq!(
            decision.reason(),
            "Step 'Test' in job 'lint' did not fail (other failures ignored)"
        );
    }

    #[test]
    fn both_filters_report_missing_job() {
        let client = client_with_jobs();
        let mut run = failed_run(&client);
        let decision = evaluate(&mut run, Some("publish"), Some("Test")).unwrap();
        assert!(!decision.should_retry());
        assert_eq!(decision.reason(), "Job 'publish' not found");
    }

    #[test]
    fn step_filter_scans_all_jobs_in_listed_order() {
        let client = client_with_jobs();
        let mut run = failed_run(&client);
        let decision = evaluate(&mut run, None, Some("Lint")).unwrap();
        assert!(decision.should_retry());
        assert_eq!(decision.reason(), "Step 'Lint' failed in job 'lint'");
    }

    #[test]
    fn step_filter_without_match_skips() {
        let client = client_with_jobs();
        let mut run = failed_run(&client);
        let decision = evaluate(&mut run, None, Some("Deploy")).unwrap();
        assert!(!decision.should_retry());
        assert_eq!(
            decision.reason(),
            "Step 'Deploy' did not fail (other failures ignored)"
        );
    }

    #[test]
    fn job_filter_matches_failed_job() {
        let client = client_with_jobs();
        let mut run = failed_run(&client);
        let decision = evaluate(&mut run, Some("lint"), None).unwrap();
        assert!(decision.should_retry());
        assert_eq!(decision.reason(), "Job 'lint' failed");
    }

    #[test]
    fn job_filter_skips_job_that_did_not_fail() {
        let client = client_with_jobs();
        let mut run = failed_run(&client);
        let decision = evaluate(&mut run, Some("deploy"), None).unwrap();
        assert!(!decision.should_retry());
        assert_eq!(
            decision.reason(),
            "Job 'deploy' did not fail (other failures ignored)"
        );
    }

    #[test]
    fn job_filter_reports_missing_job() {
        let client = client_with_jobs();
        let mut run = failed_run(&client);
        let decision = evaluate(&mut run, Some("publish"), None).unwrap();
        assert!(!decision.should_retry());
        assert_eq!(decision.reason(), "Job 'publish' not found");
    }

    #[test]
    fn no_filters_retry_any_failure() {
        // No jobs endpoint scripted: rule 6 must not fetch jobs.
        let client = GhClient::with_runner("owner/repo".to_string(), Box::new(FakeGh::new()));
        let mut run = failed_run(&client);
        let decision = evaluate(&mut run, None, None).unwrap();
        assert!(decision.should_retry());
        assert_eq!(decision.reason(), "Workflow has failures");
    }
}
