//! CI status from the check-runs API and the legacy commit status API.
//!
//! Counts from the two sources are added together without deduplication.

use std::io::Write;

use anyhow::Result;

use crate::{
    client::{RestClient, get_json},
    text::{Style, format_pr_link},
    types::{CheckRun, CheckRunsResponse, CombinedStatus, Repo, StatusCheck},
};

const ICON_PASSED: &str = "✅";
const ICON_FAILED: &str = "❌";
const ICON_PENDING: &str = "🟡";
const ICON_CANCELLED: &str = "⚫";
const ICON_SKIPPED: &str = "⚪";
const ICON_UNKNOWN: &str = "❓";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckStatus {
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub total: usize,
}

impl CheckStatus {
    pub fn from_sources(check_runs: &[CheckRun], statuses: &[StatusCheck]) -> Self {
        let mut status = Self::default();
        check_runs.iter().for_each(|run| status.add_check_run(run));
        statuses.iter().for_each(|check| status.add_status(check));
        status
    }

    /// Every run counts towards `total`, even with an unrecognised outcome.
    pub fn add_check_run(&mut self, run: &CheckRun) {
        self.total += 1;
        match run.status.as_str() {
            "completed" => match run.conclusion.as_str() {
                "success" => self.passed += 1,
                "failure" | "timed_out" | "action_required" => self.failed += 1,
                "cancelled" => self.cancelled += 1,
                "skipped" | "neutral" => self.skipped += 1,
                _ => {}
            },
            "queued" | "in_progress" => self.pending += 1,
            _ => {}
        }
    }

    pub fn add_status(&mut self, check: &StatusCheck) {
        self.total += 1;
        match check.state.as_str() {
            "success" => self.passed += 1,
            "failure" | "error" => self.failed += 1,
            "pending" => self.pending += 1,
            _ => {}
        }
    }

    /// Failed outranks pending, which outranks passed.
    pub fn overall_icon(&self) -> &'static str {
        if self.failed > 0 {
            ICON_FAILED
        } else if self.pending > 0 {
            ICON_PENDING
        } else if self.passed > 0 {
            ICON_PASSED
        } else {
            ICON_SKIPPED
        }
    }

    /// `✅ 3 passed, ❌ 1 failed`, omitting zero counts.
    pub fn summary(&self) -> String {
        [
            (self.passed, ICON_PASSED, "passed"),
            (self.failed, ICON_FAILED, "failed"),
            (self.pending, ICON_PENDING, "pending"),
            (self.cancelled, ICON_CANCELLED, "cancelled"),
            (self.skipped, ICON_SKIPPED, "skipped"),
        ]
        .iter()
        .filter(|(count, _, _)| *count > 0)
        .map(|(count, icon, label)| format!("{icon} {count} {label}"))
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Raw results of both check sources for one commit.
#[derive(Debug)]
pub struct CheckReport {
    pub check_runs: Result<Vec<CheckRun>>,
    pub statuses: Result<Vec<StatusCheck>>,
}

impl CheckReport {
    /// Aggregates whichever sources were fetched successfully.
    pub fn status(&self) -> CheckStatus {
        let runs = self.check_runs.as_deref().unwrap_or_default();
        let statuses = self.statuses.as_deref().unwrap_or_default();
        CheckStatus::from_sources(runs, statuses)
    }
}

pub async fn fetch_checks<C: RestClient + ?Sized>(client: &C, repo: &Repo, sha: &str) -> CheckReport {
    let check_runs = get_json::<CheckRunsResponse, _>(client, &repo.check_runs_path(sha))
        .await
        .map(|response| response.check_runs);
    let statuses = get_json::<CombinedStatus, _>(client, &repo.commit_status_path(sha))
        .await
        .map(|response| response.statuses);

    CheckReport {
        check_runs,
        statuses,
    }
}

/// One-line summary as shown in the PR detail view.
pub fn write_check_summary<W: Write>(report: &CheckReport, writer: &mut W) -> Result<()> {
    if let Err(err) = &report.check_runs {
        tracing::debug!(error = %err, "Check runs unavailable");
        writeln!(writer, "   ⚠️  Could not fetch check runs: {err}")?;
    }
    if let Err(err) = &report.statuses {
        tracing::debug!(error = %err, "Commit statuses unavailable");
        writeln!(writer, "   ⚠️  Could not fetch status checks: {err}")?;
    }

    let status = report.status();
    if status.total == 0 {
        writeln!(writer, "   {ICON_PASSED} No checks configured")?;
        return Ok(());
    }

    writeln!(
        writer,
        "   {} Checks ({} total): {} (press 'c' during approval to view details)",
        status.overall_icon(),
        status.total,
        status.summary()
    )?;
    Ok(())
}

fn check_run_line(run: &CheckRun) -> (&'static str, String) {
    match (run.status.as_str(), run.conclusion.as_str()) {
        ("completed", "success") => (ICON_PASSED, "passed".to_string()),
        ("completed", c @ ("failure" | "timed_out" | "action_required")) => {
            (ICON_FAILED, format!("failed ({c})"))
        }
        ("completed", "cancelled") => (ICON_CANCELLED, "cancelled".to_string()),
        ("completed", c @ ("skipped" | "neutral")) => (ICON_SKIPPED, format!("skipped ({c})")),
        ("completed", c) => (ICON_UNKNOWN, c.to_string()),
        ("queued", _) => (ICON_PENDING, "queued".to_string()),
        ("in_progress", _) => (ICON_PENDING, "running".to_string()),
        (s, _) => (ICON_UNKNOWN, s.to_string()),
    }
}

fn status_icon(state: &str) -> &'static str {
    match state {
        "success" => ICON_PASSED,
        "failure" | "error" => ICON_FAILED,
        "pending" => ICON_PENDING,
        _ => ICON_UNKNOWN,
    }
}

/// Every check run and legacy status with its own glyph.
pub fn write_check_details<W: Write>(
    repo: &Repo,
    pr_number: u64,
    report: &CheckReport,
    style: Style,
    writer: &mut W,
) -> Result<()> {
    writeln!(
        writer,
        "\n🔍 Detailed check status for PR {}:",
        format_pr_link(&repo.pull_url(pr_number), pr_number, style)
    )?;

    if let Ok(runs) = &report.check_runs
        && !runs.is_empty()
    {
        writeln!(writer, "\n📋 Check Runs:")?;
        for run in runs {
            let (icon, status) = check_run_line(run);
            writeln!(writer, "   {icon} {}: {status}", run.name)?;
        }
    }

    if let Ok(statuses) = &report.statuses
        && !statuses.is_empty()
    {
        writeln!(writer, "\n📋 Status Checks:")?;
        for check in statuses {
            let description = if check.description.is_empty() {
                &check.state
            } else {
                &check.description
            };
            writeln!(
                writer,
                "   {} {}: {description}",
                status_icon(&check.state),
                check.context
            )?;
        }
    }

    writeln!(writer)?;
    Ok(())
}
