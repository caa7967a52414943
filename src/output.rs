use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use log::warn;

use crate::error::Result;
use crate::github::RetryMode;
use crate::workflow::RetryOutcome;

const SUCCESS_CONCLUSION: &str = "success";
const FAILED_CONCLUSIONS: [&str; 3] = ["failure", "timed_out", "cancelled"];

/// Everything the step summary needs to describe one retry check.
pub struct SummaryContext<'a> {
    pub workflow: &'a str,
    pub branch: &'a str,
    pub max_retries: u32,
    pub retry_mode: RetryMode,
    pub outcome: &'a RetryOutcome,
    /// "owner/repo", used to build the run link
    pub repository: Option<&'a str>,
    /// Server base URL for the run link
    pub server_url: &'a str,
}

/// Append `key=value` output variables to the file (when given) and echo
/// them to stdout.
pub fn write_outputs(output_file: Option<&Path>, outcome: &RetryOutcome) -> Result<()> {
    let variables = [
        ("status", outcome.status.clone()),
        ("retry_count", outcome.retry_count.to_string()),
        ("was_retried", outcome.was_retried.to_string()),
    ];

    if let Some(path) = output_file {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for (key, value) in &variables {
            writeln!(file, "{key}={value}")?;
        }
    }

    println!("\nOutput variables:");
    for (key, value) in &variables {
        println!("  {key}={value}");
    }

    Ok(())
}

/// Append the Markdown summary to the step-summary file named by
/// `GITHUB_STEP_SUMMARY`. Silently skipped when the variable is unset;
/// write failures are logged, never fatal.
pub fn write_step_summary(ctx: &SummaryContext<'_>) {
    let Ok(summary_file) = std::env::var("GITHUB_STEP_SUMMARY") else {
        return;
    };

    let summary = render_step_summary(ctx);
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&summary_file)
        .and_then(|mut file| file.write_all(summary.as_bytes()));

    if let Err(e) = result {
        warn!("Could not write to step summary: {e}");
    }
}

/// Render the Markdown step summary.
pub fn render_step_summary(ctx: &SummaryContext<'_>) -> String {
    let outcome = ctx.outcome;
    let status = outcome.status.as_str();

    let (emoji, status_msg) = match status {
        "not_found" => ("🔍", "Workflow run not found".to_string()),
        SUCCESS_CONCLUSION => ("✅", "Workflow succeeded".to_string()),
        "failure" => ("❌", "Workflow failure".to_string()),
        "timed_out" => ("⏱️", "Workflow timed_out".to_string()),
        "cancelled" => ("🚫", "Workflow cancelled".to_string()),
        "in_progress" => ("🔄", "Workflow is still in progress".to_string()),
        other => ("ℹ️", format!("Workflow {other}")),
    };

    let failed = FAILED_CONCLUSIONS.contains(&status);
    let (retry_emoji, retry_msg) = if outcome.was_retried {
        (
            "🔄",
            format!(
                "**Retry triggered** (mode: `{}`, attempt {}/{})",
                ctx.retry_mode, outcome.retry_count, ctx.max_retries
            ),
        )
    } else if outcome.retry_count >= ctx.max_retries && failed {
        (
            "🛑",
            format!(
                "**Max retries reached** ({}/{})",
                outcome.retry_count, ctx.max_retries
            ),
        )
    } else if failed {
        ("⏭️", "**No retry** (filters did not match)".to_string())
    } else {
        ("ℹ️", "**No retry needed**".to_string())
    };

    let mut summary = format!(
        "## {emoji} Workflow Retry Summary\n\n\
         ### Workflow Information\n\
         - **Workflow:** `{}`\n\
         - **Branch:** `{}`\n\
         - **Status:** {emoji} {status_msg}\n",
        ctx.workflow, ctx.branch
    );

    if let (Some(run_id), Some(repository)) = (outcome.run_id, ctx.repository) {
        let _ = writeln!(
            summary,
            "- **Run ID:** [{run_id}]({}/{repository}/actions/runs/{run_id})",
            ctx.server_url
        );
    }

    let _ = write!(
        summary,
        "\n### Retry Information\n\
         {retry_emoji} {retry_msg}\n\n\
         | Setting | Value |\n\
         |---------|-------|\n\
         | Retry Count | {} |\n\
         | Max Retries | {} |\n\
         | Retry Mode | `{}` |\n\
         | Was Retried | {} |\n",
        outcome.retry_count,
        ctx.max_retries,
        ctx.retry_mode,
        if outcome.was_retried { "✅ Yes" } else { "No" }
    );

    let footnote = if outcome.was_retried {
        Some(
            "✅ **Action taken:** The workflow has been retried. Check the workflow run page \
             for progress."
                .to_string(),
        )
    } else if status == "not_found" {
        Some(format!(
            "ℹ️ **Note:** No workflow run found for `{}` on the latest commit of branch `{}`.",
            ctx.workflow, ctx.branch
        ))
    } else if status == "in_progress" {
        Some(
            "🔄 **In Progress:** The workflow is still running. Will check again on the next \
             retry schedule."
                .to_string(),
        )
    } else if outcome.retry_count >= ctx.max_retries && failed {
        Some(format!(
            "⚠️ **Note:** Maximum retries ({}) have been reached. Manual intervention may be \
             required.",
            ctx.max_retries
        ))
    } else if status == SUCCESS_CONCLUSION {
        Some("✅ **Success:** The workflow completed successfully. No retry needed.".to_string())
    } else {
        None
    };

    if let Some(footnote) = footnote {
        let _ = write!(summary, "\n---\n{footnote}\n");
    }

    summary
}

#[cfg(test)]
mod tests {
    use std::io::Read as _;

    use tempfile::NamedTempFile;

    use super::*;

    fn outcome(status: &str, retry_count: u32, was_retried: bool, run_id: Option<u64>) -> RetryOutcome {
        RetryOutcome {
            status: status.to_string(),
            retry_count,
            was_retried,
            run_id,
        }
    }

    fn context<'a>(outcome: &'a RetryOutcome) -> SummaryContext<'a> {
        SummaryContext {
            workflow: "CI",
            branch: "main",
            max_retries: 2,
            retry_mode: RetryMode::FailedOnly,
            outcome,
            repository: Some("owner/repo"),
            server_url: "https://github.com",
        }
    }

    #[test]
    fn outputs_are_appended_as_key_value_lines() {
        let mut file = NamedTempFile::new().unwrap();
        let out = outcome("failure", 1, true, Some(7));

        write_outputs(Some(file.path()), &out).unwrap();

        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "status=failure\nretry_count=1\nwas_retried=true\n");
    }

    #[test]
    fn outputs_append_preserves_existing_lines() {
        let mut file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"existing=1\n").unwrap();
        let out = outcome("success", 0, false, Some(7));

        write_outputs(Some(file.path()), &out).unwrap();

        let mut contents = String::new();
        std::fs::File::open(file.path())
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert!(contents.starts_with("existing=1\n"));
        assert!(contents.contains("status=success\n"));
    }

    #[test]
    fn summary_for_retried_run_links_the_run() {
        let out = outcome("failure", 1, true, Some(42));
        let summary = render_step_summary(&context(&out));

        assert!(summary.contains("**Retry triggered** (mode: `failed-only`, attempt 1/2)"));
        assert!(summary.contains("[42](https://github.com/owner/repo/actions/runs/42)"));
        assert!(summary.contains("**Action taken:**"));
        assert!(summary.contains("| Was Retried | ✅ Yes |"));
    }

    #[test]
    fn summary_for_not_found_run_has_no_link() {
        let out = outcome("not_found", 0, false, None);
        let summary = render_step_summary(&context(&out));

        assert!(summary.contains("Workflow run not found"));
        assert!(!summary.contains("actions/runs"));
        assert!(summary.contains("No workflow run found for `CI`"));
    }

    #[test]
    fn summary_reports_exhausted_budget() {
        let out = outcome("failure", 2, false, Some(42));
        let summary = render_step_summary(&context(&out));

        assert!(summary.contains("**Max retries reached** (2/2)"));
        assert!(summary.contains("Manual intervention may be required"));
    }

    #[test]
    fn summary_for_success_needs_no_retry() {
        let out = outcome("success", 0, false, Some(42));
        let summary = render_step_summary(&context(&out));

        assert!(summary.contains("Workflow succeeded"));
        assert!(summary.contains("**No retry needed**"));
        assert!(summary.contains("completed successfully"));
    }
}
