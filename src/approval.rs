//! Interactive approval session.
//!
//! The session alternates between picking a PR from the remaining ones
//! (`Browsing`) and deciding on it (`Reviewing`). Each reviewed PR is removed
//! from later tables. `q`, end of input, or running out of approvable PRs
//! finishes the session; the summary is printed in every case.

use std::{
    collections::HashSet,
    io::{self, BufRead, Write},
};

use anyhow::Result;
use tracing::{debug, warn};

use crate::{
    actions::{add_comment, approve_pr, hold_pr},
    cache::PrDetailsCache,
    checks::{fetch_checks, write_check_details, write_check_summary},
    classify::{has_approved_review, has_migration_warning, is_approvable, is_on_hold},
    client::{RestClient, get_json},
    enrich::EnrichedPr,
    table::{title_width, write_table},
    tekton::{TektonCheck, check_tekton_files},
    text::{Style, bold, colorize_diff, format_pr_link, format_relative_time, green, red, yellow},
    types::{PrFile, PullRequest, Repo},
};

/// The decision taken at the per-PR prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalResult {
    Skip,
    Approve,
    Hold,
    Quit,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApprovalConfig {
    pub is_konflux: bool,
    pub show_files: bool,
    pub show_diff: bool,
    pub style: Style,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApprovalSummary {
    pub approved: usize,
    pub skipped: usize,
    pub already_approved: usize,
    pub held: usize,
    pub commented: usize,
    pub failed: usize,
}

impl ApprovalSummary {
    pub fn total_processed(&self) -> usize {
        self.approved
            + self.skipped
            + self.already_approved
            + self.held
            + self.commented
            + self.failed
    }

    fn record(&mut self, outcome: ReviewOutcome) {
        match outcome {
            ReviewOutcome::Approved => self.approved += 1,
            ReviewOutcome::Skipped => self.skipped += 1,
            ReviewOutcome::AlreadyApproved => self.already_approved += 1,
            ReviewOutcome::Held => self.held += 1,
            ReviewOutcome::Commented => self.commented += 1,
            ReviewOutcome::Failed => self.failed += 1,
            ReviewOutcome::Quit | ReviewOutcome::EndOfInput => {}
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "{}", rule())?;
        writeln!(writer, "📊 Final Approval Summary:")?;
        writeln!(writer, "   ✅ Approved: {}", self.approved)?;
        writeln!(writer, "   ❌ Skipped: {}", self.skipped)?;
        writeln!(writer, "   🔁 Already approved: {}", self.already_approved)?;
        writeln!(writer, "   ⏸️  Put on hold: {}", self.held)?;
        writeln!(writer, "   💬 Commented: {}", self.commented)?;
        writeln!(writer, "   ⚠️  Failed: {}", self.failed)?;
        writeln!(writer, "   📊 Total processed: {}", self.total_processed())?;
        Ok(())
    }
}

/// How the review of one PR ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReviewOutcome {
    Approved,
    Skipped,
    AlreadyApproved,
    Held,
    Commented,
    Failed,
    Quit,
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Browsing,
    Reviewing(u64),
    Finished,
}

/// A line of user input. `Eof` ends the session; `Failed` carries a read
/// error that only affects the current PR.
enum Input {
    Line(String),
    Eof,
    Failed(io::Error),
}

fn rule() -> String {
    "═".repeat(63)
}

const FILE_GLYPHS: &[(&str, &str, &str)] = &[
    ("added", "🟢", "+"),
    ("modified", "🟡", "~"),
    ("removed", "🔴", "-"),
    ("renamed", "🔵", "→"),
];

pub fn write_file_list<W: Write>(files: &[PrFile], writer: &mut W) -> Result<()> {
    for file in files {
        let (icon, marker) = FILE_GLYPHS
            .iter()
            .find(|(status, _, _)| *status == file.status)
            .map_or(("⚪", "?"), |(_, icon, marker)| (*icon, *marker));
        writeln!(writer, "      {icon} {marker} {}", file.filename)?;
    }
    Ok(())
}

struct Session<'a, C: ?Sized, R, W> {
    client: &'a C,
    repo: &'a Repo,
    config: &'a ApprovalConfig,
    cache: &'a PrDetailsCache,
    input: &'a mut R,
    output: &'a mut W,
}

impl<C, R, W> Session<'_, C, R, W>
where
    C: RestClient + ?Sized,
    R: BufRead,
    W: Write,
{
    fn link(&self, pr_number: u64) -> String {
        format_pr_link(
            &self.repo.pull_url(pr_number),
            pr_number,
            self.config.style,
        )
    }

    fn read_input(&mut self) -> Result<Input> {
        self.output.flush()?;
        let mut line = String::new();
        Ok(match self.input.read_line(&mut line) {
            Ok(0) => Input::Eof,
            Ok(_) => Input::Line(line.trim().to_string()),
            Err(err) => Input::Failed(err),
        })
    }

    /// Renders the remaining PRs and asks which one to review next.
    async fn browse(
        &mut self,
        items: &[EnrichedPr],
        processed: &HashSet<u64>,
    ) -> Result<SessionState> {
        let remaining: Vec<EnrichedPr> = items
            .iter()
            .filter(|item| !processed.contains(&item.pr.number))
            .cloned()
            .collect();

        if remaining.is_empty() {
            writeln!(self.output, "\n✅ All PRs have been processed!")?;
            return Ok(SessionState::Finished);
        }

        writeln!(self.output, "{}", rule())?;
        write_table(
            &remaining,
            self.repo,
            self.config.is_konflux,
            self.config.style,
            title_width(self.config.is_konflux),
            self.output,
        )?;
        writeln!(self.output, "{}", rule())?;

        let approvable: Vec<u64> = remaining
            .iter()
            .filter(|item| is_approvable(&item.pr))
            .map(|item| item.pr.number)
            .collect();
        let Some(&first) = approvable.first() else {
            writeln!(
                self.output,
                "❌ No more PRs available for approval (remaining are closed, draft, or on hold)"
            )?;
            return Ok(SessionState::Finished);
        };

        let available = approvable
            .iter()
            .map(|n| format!("#{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(self.output, "\n📝 Select PR to approve:")?;
        writeln!(
            self.output,
            "   Enter PR number (default: {first} for first approvable PR)"
        )?;
        writeln!(self.output, "   Or press 'q' to quit")?;
        writeln!(self.output, "   Available for approval: {available}")?;
        write!(self.output, "\nPR to approve: ")?;

        let input = match self.read_input()? {
            Input::Line(line) => line,
            Input::Eof => {
                writeln!(self.output, "(EOF - exiting approval process)")?;
                return Ok(SessionState::Finished);
            }
            Input::Failed(err) => {
                writeln!(self.output, "Error reading input: {err}")?;
                return Ok(SessionState::Finished);
            }
        };

        if matches!(input.to_lowercase().as_str(), "q" | "quit") {
            writeln!(self.output, "Exiting approval process.")?;
            return Ok(SessionState::Finished);
        }

        if input.is_empty() {
            writeln!(self.output, "Using default PR: #{first}")?;
            return Ok(SessionState::Reviewing(first));
        }

        let number = input.trim_start_matches('#');
        let Ok(pr_number) = number.parse::<u64>() else {
            writeln!(self.output, "❌ Invalid PR number: {number}")?;
            writeln!(self.output, "Press Enter to continue or 'q' to quit.")?;
            return Ok(SessionState::Browsing);
        };

        if !approvable.contains(&pr_number) {
            writeln!(
                self.output,
                "❌ PR #{pr_number} is not available for approval (may be closed, draft, on hold, or not exist)"
            )?;
            writeln!(self.output, "   Available PRs: {available}")?;
            writeln!(self.output, "Press Enter to continue or 'q' to quit.")?;
            return Ok(SessionState::Browsing);
        }

        writeln!(self.output, "Selected PR: #{pr_number}")?;
        Ok(SessionState::Reviewing(pr_number))
    }

    fn write_commands_help(&mut self) -> Result<()> {
        let mut options = vec![
            "[y]es to approve",
            "[N]o to skip (default)",
            "[h]old",
            "co[m]ment",
            "[q]uit",
        ];
        if !self.config.show_files {
            options.push("[f]iles to view");
        }
        if !self.config.show_diff {
            options.push("[d]iff to view");
        }
        options.push("[c]hecks to view");
        writeln!(self.output, "Commands: {}", options.join(", "))?;
        writeln!(self.output, "{}", rule())?;
        Ok(())
    }

    async fn write_file_view(&mut self, pr_number: u64) -> Result<()> {
        let path = self.repo.pull_files_path(pr_number);
        match get_json::<Vec<PrFile>, _>(self.client, &path).await {
            Ok(files) => {
                write_file_list(&files, self.output)?;
                writeln!(self.output, "\nTotal: {} files changed", files.len())?;
            }
            Err(err) => writeln!(self.output, "   ❌ Could not fetch file list: {err}")?,
        }
        Ok(())
    }

    async fn write_diff(&mut self, pr_number: u64) -> Result<()> {
        let diff = match self.client.get_diff(self.repo, pr_number).await {
            Ok(diff) => diff,
            Err(err) => {
                writeln!(self.output, "   ⚠️  Could not fetch diff: {err}")?;
                return Ok(());
            }
        };

        writeln!(self.output, "\n📄 Diff for PR {}:", self.link(pr_number))?;
        writeln!(self.output, "{}", rule())?;
        if self.config.style.color {
            write!(self.output, "{}", colorize_diff(&diff))?;
        } else {
            write!(self.output, "{diff}")?;
        }
        if !diff.ends_with('\n') {
            writeln!(self.output)?;
        }
        writeln!(self.output, "{}", rule())?;
        Ok(())
    }

    async fn write_check_view(&mut self, pr: &PullRequest) -> Result<()> {
        if pr.head.sha.is_empty() {
            writeln!(self.output, "   ❌ No commit SHA available for check status")?;
            return Ok(());
        }
        let report = fetch_checks(self.client, self.repo, &pr.head.sha).await;
        write_check_details(self.repo, pr.number, &report, self.config.style, self.output)
    }

    /// Everything known about the PR, shown before the decision prompt.
    async fn write_details(&mut self, item: &EnrichedPr) -> Result<()> {
        let pr = &item.pr;
        writeln!(
            self.output,
            "\n🔍 Review PR {}:",
            bold(&self.link(pr.number), self.config.style)
        )?;
        writeln!(self.output, "   Title: {}", pr.title)?;
        writeln!(self.output, "   Author: @{}", pr.user.login)?;
        writeln!(
            self.output,
            "   Branch: {} → {}",
            pr.head.ref_name, pr.base.ref_name
        )?;
        if let Some(age) = format_relative_time(&pr.created_at) {
            writeln!(self.output, "   Created: {age}")?;
        }

        if self.cache.needs_rebase(self.client, self.repo, pr).await == Some(true) {
            writeln!(
                self.output,
                "   🔄 Rebase needed: PR is behind the target branch or has conflicts"
            )?;
        }
        if self.cache.is_blocked(self.client, self.repo, pr).await == Some(true) {
            writeln!(
                self.output,
                "   🚫 Blocked: PR is blocked from merging (failed checks, missing reviews, etc.)"
            )?;
        }

        let path = self.repo.pull_files_path(pr.number);
        match get_json::<Vec<PrFile>, _>(self.client, &path).await {
            Ok(files) if self.config.show_files => {
                writeln!(self.output, "   📁 Files changed ({}):", files.len())?;
                write_file_list(&files, self.output)?;
            }
            Ok(files) => writeln!(
                self.output,
                "   📁 Files changed: {} (press 'f' during approval to view)",
                files.len()
            )?,
            Err(err) => writeln!(self.output, "   ⚠️  Could not fetch file list: {err}")?,
        }

        if !pr.head.sha.is_empty() {
            let report = fetch_checks(self.client, self.repo, &pr.head.sha).await;
            write_check_summary(&report, self.output)?;
        }

        if self.config.show_diff {
            self.write_diff(pr.number).await?;
        }

        if self.config.is_konflux {
            let tekton = match &item.tekton {
                Some(check) => Ok(check.clone()),
                None => check_tekton_files(self.client, self.repo, pr.number).await,
            };
            self.write_tekton_banner(tekton)?;
            if has_migration_warning(pr) {
                writeln!(
                    self.output,
                    "   🚨 MIGRATION WARNING: This PR contains migration notes - review carefully!"
                )?;
            }
        }

        if is_on_hold(pr) {
            let status = yellow("ON HOLD", self.config.style);
            writeln!(
                self.output,
                "   ⚠️  Status: {status} (has 'do-not-merge/hold' label)"
            )?;
        }
        Ok(())
    }

    fn write_tekton_banner(&mut self, tekton: Result<TektonCheck>) -> Result<()> {
        match tekton {
            Ok(check) if check.exclusive => writeln!(
                self.output,
                "   ✅ ONLY modifies Tekton files: {}",
                check.matched_files.join(", ")
            )?,
            Ok(_) => writeln!(
                self.output,
                "   ❌ Does NOT exclusively modify target Tekton files"
            )?,
            Err(err) => writeln!(self.output, "   ⚠️  Could not check Tekton files: {err:#}")?,
        }
        Ok(())
    }

    fn decision_prompt(&self, pr: &PullRequest) -> String {
        let mut options = vec!["y/N/q/h/m"];
        let mut help = vec!["h=hold", "m=comment"];
        if !self.config.show_files {
            options.push("f");
            help.push("f=show files");
        }
        if !self.config.show_diff {
            options.push("d");
            help.push("d=show diff");
        }
        if !pr.head.sha.is_empty() {
            options.push("c");
            help.push("c=show checks");
        }
        format!(
            "\nApprove this PR? [{}] ({}): ",
            options.join("/"),
            help.join(", ")
        )
    }

    /// Loops until a decision is made. View commands and failed holds or
    /// comments re-prompt. `None` means input ended.
    async fn prompt_decision(&mut self, pr: &PullRequest) -> Result<Option<ApprovalResult>> {
        loop {
            let prompt = self.decision_prompt(pr);
            write!(self.output, "{prompt}")?;

            let response = match self.read_input()? {
                Input::Line(line) => line.to_lowercase(),
                Input::Eof => {
                    writeln!(self.output, "(EOF - exiting approval process)")?;
                    return Ok(None);
                }
                Input::Failed(err) => {
                    warn!(pr_number = pr.number, error = %err, "Failed to read decision");
                    writeln!(self.output, "Error reading input: {err} (skipping PR)")?;
                    return Ok(Some(ApprovalResult::Skip));
                }
            };

            match response.as_str() {
                "y" | "yes" => return Ok(Some(ApprovalResult::Approve)),
                "q" | "quit" => {
                    writeln!(self.output, "Quitting approval process.")?;
                    return Ok(Some(ApprovalResult::Quit));
                }
                "h" | "hold" => {
                    write!(
                        self.output,
                        "Enter an optional comment to add with /hold (or press Enter for none): "
                    )?;
                    let extra = match self.read_input()? {
                        Input::Line(line) => line,
                        Input::Eof => String::new(),
                        Input::Failed(err) => {
                            writeln!(self.output, "Error reading comment: {err}")?;
                            String::new()
                        }
                    };
                    if let Err(err) = hold_pr(self.client, self.repo, pr.number, &extra).await {
                        writeln!(
                            self.output,
                            "❌ Failed to hold PR {}: {err:#}",
                            self.link(pr.number)
                        )?;
                        continue;
                    }
                    writeln!(self.output, "⏸️  Put PR {} on hold", self.link(pr.number))?;
                    return Ok(Some(ApprovalResult::Hold));
                }
                "m" | "comment" => {
                    write!(self.output, "Enter your comment: ")?;
                    let text = match self.read_input()? {
                        Input::Line(line) => line,
                        Input::Eof => continue,
                        Input::Failed(err) => {
                            writeln!(self.output, "Error reading comment: {err}")?;
                            continue;
                        }
                    };
                    if text.is_empty() {
                        writeln!(self.output, "Empty comment, skipping.")?;
                        continue;
                    }
                    if let Err(err) = add_comment(self.client, self.repo, pr.number, &text).await {
                        writeln!(
                            self.output,
                            "❌ Failed to add comment to PR {}: {err:#}",
                            self.link(pr.number)
                        )?;
                        continue;
                    }
                    writeln!(self.output, "💬 Added comment to PR {}", self.link(pr.number))?;
                    return Ok(Some(ApprovalResult::Comment));
                }
                "f" | "files" => {
                    if self.config.show_files {
                        writeln!(self.output, "\n📁 File list already shown above.")?;
                    } else {
                        writeln!(
                            self.output,
                            "\n📁 Detailed file list for PR {}:",
                            self.link(pr.number)
                        )?;
                        self.write_file_view(pr.number).await?;
                    }
                }
                "d" | "diff" => {
                    if self.config.show_diff {
                        writeln!(self.output, "\n📄 Diff already shown above.")?;
                    } else {
                        self.write_diff(pr.number).await?;
                    }
                }
                "c" | "checks" => self.write_check_view(pr).await?,
                "" | "n" | "no" => {
                    writeln!(self.output, "Skipping PR {}", self.link(pr.number))?;
                    return Ok(Some(ApprovalResult::Skip));
                }
                other => writeln!(
                    self.output,
                    "Invalid option '{other}'. Please choose from the available options."
                )?,
            }
        }
    }

    /// `None` means input ended. Declining, or failing to read, skips.
    fn confirm(&mut self, prompt: &str) -> Result<Option<bool>> {
        write!(self.output, "{prompt}")?;
        Ok(match self.read_input()? {
            Input::Line(line) => Some(matches!(line.to_lowercase().as_str(), "y" | "yes")),
            Input::Eof => None,
            Input::Failed(err) => {
                writeln!(self.output, "Error reading confirmation: {err}")?;
                Some(false)
            }
        })
    }

    async fn review(&mut self, item: &EnrichedPr) -> Result<ReviewOutcome> {
        let pr = &item.pr;
        writeln!(self.output, "{}", rule())?;
        self.write_commands_help()?;

        match has_approved_review(self.client, self.repo, pr.number).await {
            Ok(true) => {
                writeln!(
                    self.output,
                    "✅ PR {} is already approved: {}",
                    self.link(pr.number),
                    pr.title
                )?;
                match self.confirm("Do you want to continue anyway? [y/N]: ")? {
                    None => return Ok(ReviewOutcome::EndOfInput),
                    Some(false) => {
                        writeln!(self.output, "Skipping already approved PR.")?;
                        return Ok(ReviewOutcome::AlreadyApproved);
                    }
                    Some(true) => {}
                }
            }
            Ok(false) => {}
            Err(err) => writeln!(
                self.output,
                "⚠️  Could not check existing reviews for {}: {err:#}",
                self.link(pr.number)
            )?,
        }

        self.write_details(item).await?;

        let decision = match self.prompt_decision(pr).await? {
            None => return Ok(ReviewOutcome::EndOfInput),
            Some(decision) => decision,
        };
        debug!(pr_number = pr.number, ?decision, "Approval decision");

        match decision {
            ApprovalResult::Skip => {
                writeln!(self.output, "❌ Skipped PR {}", self.link(pr.number))?;
                Ok(ReviewOutcome::Skipped)
            }
            ApprovalResult::Hold => Ok(ReviewOutcome::Held),
            ApprovalResult::Comment => Ok(ReviewOutcome::Commented),
            ApprovalResult::Quit => Ok(ReviewOutcome::Quit),
            ApprovalResult::Approve => self.approve(pr).await,
        }
    }

    async fn approve(&mut self, pr: &PullRequest) -> Result<ReviewOutcome> {
        if has_migration_warning(pr) {
            let banner = red("MIGRATION WARNING DETECTED", self.config.style);
            writeln!(self.output, "\n🚨 ⚠️  {banner} ⚠️  🚨")?;
            writeln!(
                self.output,
                "This PR contains migration warnings which may indicate breaking changes or"
            )?;
            writeln!(self.output, "require special attention during deployment.\n")?;
            let confirmed = self.confirm(
                "Are you sure you want to approve this PR with migration warnings? [y/N]: ",
            )?;
            match confirmed {
                None => return Ok(ReviewOutcome::EndOfInput),
                Some(false) => {
                    writeln!(
                        self.output,
                        "❌ Approval cancelled due to migration warnings. Skipping PR {}",
                        self.link(pr.number)
                    )?;
                    return Ok(ReviewOutcome::Skipped);
                }
                Some(true) => writeln!(
                    self.output,
                    "✅ Confirmed - proceeding with approval despite migration warnings."
                )?,
            }
        }

        writeln!(
            self.output,
            "✅ Approving {}: {}",
            self.link(pr.number),
            pr.title
        )?;
        match approve_pr(self.client, self.repo, pr.number).await {
            Ok(()) => {
                let done = green("✓ Successfully approved", self.config.style);
                writeln!(self.output, "   {done} {}", self.link(pr.number))?;
                Ok(ReviewOutcome::Approved)
            }
            Err(err) => {
                warn!(pr_number = pr.number, error = %err, "Approval failed");
                writeln!(
                    self.output,
                    "❌ Failed to approve {}: {err:#}",
                    self.link(pr.number)
                )?;
                Ok(ReviewOutcome::Failed)
            }
        }
    }
}

/// Runs the interactive session over `items` and returns the tallies,
/// which have already been written to `output`.
pub async fn run_approval_session<C, R, W>(
    client: &C,
    repo: &Repo,
    items: &[EnrichedPr],
    config: &ApprovalConfig,
    cache: &PrDetailsCache,
    input: &mut R,
    output: &mut W,
) -> Result<ApprovalSummary>
where
    C: RestClient + ?Sized,
    R: BufRead,
    W: Write,
{
    writeln!(
        output,
        "\n🎯 Interactive approval mode for {} PRs",
        items.len()
    )?;

    let mut session = Session {
        client,
        repo,
        config,
        cache,
        input,
        output,
    };
    let mut processed = HashSet::new();
    let mut summary = ApprovalSummary::default();
    let mut state = SessionState::Browsing;

    loop {
        state = match state {
            SessionState::Browsing => session.browse(items, &processed).await?,
            SessionState::Reviewing(pr_number) => {
                // Selection only offers listed PRs.
                let Some(item) = items.iter().find(|item| item.pr.number == pr_number) else {
                    state = SessionState::Browsing;
                    continue;
                };
                let outcome = session.review(item).await?;
                processed.insert(pr_number);
                summary.record(outcome);
                match outcome {
                    ReviewOutcome::Quit => {
                        writeln!(session.output, "Exiting approval process.")?;
                        SessionState::Finished
                    }
                    ReviewOutcome::EndOfInput => SessionState::Finished,
                    _ => {
                        writeln!(session.output)?;
                        SessionState::Browsing
                    }
                }
            }
            SessionState::Finished => break,
        };
    }

    summary.write(session.output)?;
    Ok(summary)
}
