use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::error::RetryError;
use crate::github::RetryMode;
use crate::output::{self, SummaryContext};
use crate::workflow::RetryManager;

const DEFAULT_SERVER_URL: &str = "https://github.com";

#[derive(Parser)]
#[command(name = "retry-workflow")]
#[command(
    version,
    about = "Retry the latest GitHub Actions workflow run on a branch when it failed"
)]
pub struct Cli {
    /// Branch name to check
    #[arg(long)]
    branch: String,

    /// Workflow to check, matched by name or by workflow file name
    #[arg(long)]
    workflow: String,

    /// Maximum number of retries allowed
    #[arg(long, default_value_t = 1)]
    max_retries: u32,

    /// Retry behavior
    #[arg(long, value_enum, default_value_t = RetryMode::FailedOnly)]
    retry_mode: RetryMode,

    /// Only retry if this specific job failed
    #[arg(long)]
    job_name: Option<String>,

    /// Only retry if this specific step failed
    #[arg(long)]
    step_name: Option<String>,

    /// File to append output variables to (GITHUB_OUTPUT)
    #[arg(long)]
    output_file: Option<PathBuf>,
}

impl Cli {
    pub fn execute(&self) -> Result<()> {
        let repo = std::env::var("GITHUB_REPOSITORY").map_err(|_| RetryError::MissingRepository)?;

        let manager = RetryManager::new(
            repo.clone(),
            self.branch.clone(),
            self.workflow.clone(),
            self.max_retries,
            self.retry_mode,
        );

        let outcome = manager.execute(
            non_empty(self.job_name.as_deref()),
            non_empty(self.step_name.as_deref()),
        )?;
        info!(
            "Decision complete: status={}, was_retried={}",
            outcome.status, outcome.was_retried
        );

        output::write_outputs(self.output_file.as_deref(), &outcome)?;

        let server_url =
            std::env::var("GITHUB_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        output::write_step_summary(&SummaryContext {
            workflow: &self.workflow,
            branch: &self.branch,
            max_retries: self.max_retries,
            retry_mode: self.retry_mode,
            outcome: &outcome,
            repository: Some(&repo),
            server_url: &server_url,
        });

        Ok(())
    }
}

/// An empty filter string means "no filter", matching how the action
/// passes unset inputs through as "".
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
