use std::process::Command;

use clap::ValueEnum;
use log::{error, warn};
use serde::de::DeserializeOwned;

use crate::error::{Result, RetryError};

use super::types::{JobRecord, RunRecord};

/// Which jobs a rerun resubmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RetryMode {
    /// Resubmit every job in the run
    All,
    /// Resubmit only the jobs that did not succeed
    FailedOnly,
}

impl std::fmt::Display for RetryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::FailedOnly => write!(f, "failed-only"),
        }
    }
}

/// Executes `gh` invocations for a repository.
///
/// Production code uses [`GhProcess`]; tests inject a fake to script
/// responses and record the issued commands.
pub trait GhRunner {
    /// Run `gh` with the given arguments, returning trimmed stdout.
    fn run(&self, repo: &str, args: &[&str]) -> Result<String>;
}

/// Runs the real `gh` binary with `GH_REPO` set in the child environment.
pub struct GhProcess;

impl GhRunner for GhProcess {
    fn run(&self, repo: &str, args: &[&str]) -> Result<String> {
        let output = Command::new("gh")
            .args(args)
            .env("GH_REPO", repo)
            .output()
            .map_err(RetryError::GhSpawn)?;

        if !output.status.success() {
            return Err(RetryError::GhCommand {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// GitHub API client for a single repository, backed by the `gh` CLI.
///
/// Reads degrade gracefully: a failed run or job listing yields an empty
/// sequence with a warning, and an unreadable run attempt yields 0. Writes
/// (rerun requests) report failure as `false` and never propagate. Only the
/// commit lookup lets a transport error escape to the caller.
pub struct GhClient {
    repo: String,
    runner: Box<dyn GhRunner>,
}

impl GhClient {
    /// Create a client for `owner/repo`, using the real `gh` binary.
    pub fn new(repo: String) -> Self {
        Self::with_runner(repo, Box::new(GhProcess))
    }

    pub fn with_runner(repo: String, runner: Box<dyn GhRunner>) -> Self {
        Self { repo, runner }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Execute a GET API request, optionally paginated and jq-filtered.
    fn api_get(&self, endpoint: &str, jq: Option<&str>, paginate: bool) -> Result<String> {
        let mut args = vec!["api", endpoint];
        if paginate {
            args.push("--paginate");
        }
        if let Some(filter) = jq {
            args.push("--jq");
            args.push(filter);
        }
        self.runner.run(&self.repo, &args)
    }

    /// Execute a POST API request. Returns whether it succeeded.
    fn api_post(&self, endpoint: &str) -> bool {
        match self
            .runner
            .run(&self.repo, &["api", endpoint, "--method", "POST"])
        {
            Ok(_) => true,
            Err(e) => {
                error!("POST {endpoint} failed: {e}");
                false
            }
        }
    }

    /// SHA of the latest commit on the branch.
    ///
    /// # Errors
    ///
    /// Propagates `gh` failures: without a resolvable commit there is
    /// nothing to decide, so the caller exits with the tool's error text.
    pub fn latest_commit_sha(&self, branch: &str) -> Result<String> {
        self.api_get(
            &format!("repos/{}/commits/{}", self.repo, branch),
            Some(".sha"),
            false,
        )
    }

    /// All workflow runs for a commit on a branch, across every page.
    ///
    /// # Errors
    ///
    /// Only on a malformed record; transport failures degrade to an empty
    /// list with a warning.
    pub fn list_runs_for_commit(&self, branch: &str, sha: &str) -> Result<Vec<RunRecord>> {
        let endpoint = format!(
            "repos/{}/actions/runs?branch={}&head_sha={}",
            self.repo, branch, sha
        );
        match self.api_get(&endpoint, Some(".workflow_runs[]"), true) {
            Ok(output) => parse_json_lines(&output),
            Err(e) => {
                warn!("Failed to query workflow runs: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// All jobs of a workflow run, with their steps, across every page.
    ///
    /// # Errors
    ///
    /// Only on a malformed record (a job without an id is a fatal response
    /// error); transport failures degrade to an empty list.
    pub fn list_jobs_for_run(&self, run_id: u64) -> Result<Vec<JobRecord>> {
        let endpoint = format!("repos/{}/actions/runs/{}/jobs", self.repo, run_id);
        match self.api_get(&endpoint, Some(".jobs[]"), true) {
            Ok(output) => parse_json_lines(&output),
            Err(e) => {
                warn!("Failed to query jobs for run {run_id}: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// Current attempt ordinal of a run (1 = first attempt).
    ///
    /// Returns 0 when the attempt cannot be fetched or parsed.
    pub fn run_attempt(&self, run_id: u64) -> u32 {
        let endpoint = format!("repos/{}/actions/runs/{}", self.repo, run_id);
        match self.api_get(&endpoint, Some(".run_attempt"), false) {
            Ok(output) => output.parse().unwrap_or(0),
            Err(e) => {
                warn!("Failed to fetch run attempt for run {run_id}: {e}");
                0
            }
        }
    }

    /// Request a rerun of the given run. Returns whether the request was
    /// accepted.
    pub fn rerun(&self, run_id: u64, mode: RetryMode) -> bool {
        let endpoint = match mode {
            RetryMode::All => format!("repos/{}/actions/runs/{}/rerun", self.repo, run_id),
            RetryMode::FailedOnly => {
                format!("repos/{}/actions/runs/{}/rerun-failed-jobs", self.repo, run_id)
            }
        };
        self.api_post(&endpoint)
    }
}

/// Parse the JSON-lines output produced by `gh api --jq ".xs[]"`.
fn parse_json_lines<T: DeserializeOwned>(output: &str) -> Result<Vec<T>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(RetryError::from))
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;

    /// Scripted stand-in for the `gh` binary.
    ///
    /// Responses are keyed by endpoint (the argument after `api`); any
    /// endpoint without a scripted response fails like a non-zero `gh`
    /// exit. Every invocation is recorded for assertions; clone `calls()`
    /// before handing the fake to a client.
    #[derive(Default)]
    pub struct FakeGh {
        responses: HashMap<String, String>,
        calls: Rc<RefCell<Vec<Vec<String>>>>,
    }

    impl FakeGh {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, endpoint: &str, output: &str) -> Self {
            self.responses.insert(endpoint.to_string(), output.to_string());
            self
        }

        /// Shared handle onto the invocation log.
        pub fn calls(&self) -> Rc<RefCell<Vec<Vec<String>>>> {
            Rc::clone(&self.calls)
        }
    }

    /// Endpoints hit, in invocation order.
    pub fn endpoints(calls: &Rc<RefCell<Vec<Vec<String>>>>) -> Vec<String> {
        calls
            .borrow()
            .iter()
            .filter_map(|args| args.get(1).cloned())
            .collect()
    }

    impl GhRunner for FakeGh {
        fn run(&self, _repo: &str, args: &[&str]) -> Result<String> {
            self.calls
                .borrow_mut()
                .push(args.iter().map(|s| (*s).to_string()).collect());
            let endpoint = args.get(1).copied().unwrap_or_default();
            match self.responses.get(endpoint) {
                Some(output) => Ok(output.clone()),
                None => Err(RetryError::GhCommand {
                    stderr: format!("HTTP 404: Not Found ({endpoint})"),
                }),
            }
        }
    }
}
