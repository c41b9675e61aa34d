use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::warn;

use crate::{
    approval::ApprovalConfig,
    client::DEFAULT_MAX_CONCURRENT_REQUESTS,
    sort::SortKey,
    text::Style,
    types::Repo,
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

/// Overrides the bound on concurrent enrichment requests.
pub const MAX_CONCURRENT_REQUESTS_ENV: &str = "GHPRS_MAX_CONCURRENT_REQUESTS";

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrState {
    #[default]
    Open,
    Closed,
    All,
}

impl PrState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrState::Open => "open",
            PrState::Closed => "closed",
            PrState::All => "all",
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
struct ApprovalArgs {
    /// Review PRs one at a time and approve, hold or comment
    #[arg(long, help_heading = "Approval")]
    pub approve: bool,

    /// List changed files in the review view
    #[arg(long = "show-files", help_heading = "Approval")]
    pub show_files: bool,

    /// Show the full diff in the review view
    #[arg(long = "show-diff", help_heading = "Approval")]
    pub show_diff: bool,
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Repositories as 'owner/repo' or GitHub URLs (defaults to the origin remote of the current checkout)
    #[arg(value_name = "OWNER/REPO")]
    pub repos: Vec<String>,

    /// PR state to list
    #[arg(short = 's', long, value_enum, default_value_t = PrState::Open, help_heading = "Filters")]
    pub state: PrState,

    /// Maximum number of PRs to fetch per repository
    #[arg(short = 'L', long, default_value = "30", value_name = "NUM", help_heading = "Filters")]
    pub limit: usize,

    /// Sort order: newest, oldest, updated, number, priority
    #[arg(long = "sort-by", default_value = "newest", value_name = "KEY")]
    pub sort_by: String,

    #[command(flatten)]
    pub approval: ApprovalArgs,

    /// Disable colours and terminal hyperlinks
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

#[derive(Args, Debug, Clone)]
struct KonfluxArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Only PRs that modify nothing but Tekton pipeline files
    #[arg(long = "tekton-only", help_heading = "Filters")]
    pub tekton_only: bool,

    /// Only PRs whose description carries a migration warning
    #[arg(long = "migration-only", help_heading = "Filters")]
    pub migration_only: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// List pull requests
    List(CommonArgs),
    /// List pull requests opened by the Konflux bot
    Konflux(KonfluxArgs),
}

#[derive(Parser, Debug)]
#[command(
    name = "ghprs",
    about = "List GitHub pull requests with review, rebase and CI status, and approve them interactively"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
pub struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

impl CliArgs {
    fn common(&self) -> &CommonArgs {
        match &self.command {
            Command::List(common) => common,
            Command::Konflux(args) => &args.common,
        }
    }

    pub fn debug(&self) -> bool {
        self.common().debug
    }

    /// Resolves the parsed arguments into run options. Ignored values are
    /// logged as warnings here, so install the subscriber first.
    ///
    /// The concurrency bound comes from `GHPRS_MAX_CONCURRENT_REQUESTS`, colour
    /// from `--no-color`, `NO_COLOR` and whether stdout is a terminal.
    pub fn into_options(self) -> Result<ListOptions> {
        let max_concurrent =
            max_concurrent_from(std::env::var(MAX_CONCURRENT_REQUESTS_ENV).ok().as_deref());
        options_from_cli(self, max_concurrent)
    }
}

/// Everything a run needs, fixed once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Empty means the repository of the current checkout.
    pub repos: Vec<Repo>,
    pub state: PrState,
    pub limit: usize,
    pub sort_key: SortKey,
    pub approve: bool,
    pub konflux: bool,
    pub tekton_only: bool,
    pub migration_only: bool,
    pub debug: bool,
    pub max_concurrent: usize,
    pub approval: ApprovalConfig,
}

impl ListOptions {
    pub fn style(&self) -> Style {
        self.approval.style
    }
}

/// Reads the concurrency bound; anything but a positive integer falls back
/// to the default.
pub fn max_concurrent_from(value: Option<&str>) -> usize {
    let Some(value) = value else {
        return DEFAULT_MAX_CONCURRENT_REQUESTS;
    };
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            warn!(
                value,
                default = DEFAULT_MAX_CONCURRENT_REQUESTS,
                "Ignoring invalid {MAX_CONCURRENT_REQUESTS_ENV}"
            );
            DEFAULT_MAX_CONCURRENT_REQUESTS
        }
    }
}

fn parse_repos(repos: &[String]) -> Result<Vec<Repo>> {
    repos
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(|r| {
            Repo::parse(r).map_err(|e| anyhow::anyhow!("Invalid repository format '{}': {}", r, e))
        })
        .collect()
}

fn build_options(
    common: CommonArgs,
    konflux: bool,
    tekton_only: bool,
    migration_only: bool,
    max_concurrent: usize,
) -> Result<ListOptions> {
    if common.limit == 0 {
        anyhow::bail!("--limit must be at least 1");
    }

    Ok(ListOptions {
        repos: parse_repos(&common.repos)?,
        state: common.state,
        limit: common.limit,
        sort_key: SortKey::parse(&common.sort_by),
        approve: common.approval.approve,
        konflux,
        tekton_only,
        migration_only,
        debug: common.debug,
        max_concurrent,
        approval: ApprovalConfig {
            is_konflux: konflux,
            show_files: common.approval.show_files,
            show_diff: common.approval.show_diff,
            style: Style::detect(common.no_color),
        },
    })
}

fn options_from_cli(cli: CliArgs, max_concurrent: usize) -> Result<ListOptions> {
    match cli.command {
        Command::List(common) => build_options(common, false, false, false, max_concurrent),
        Command::Konflux(args) => build_options(
            args.common,
            true,
            args.tekton_only,
            args.migration_only,
            max_concurrent,
        ),
    }
}

/// Parses command-line arguments without interpreting them. Nothing is
/// logged at this stage.
pub fn parse_cli<I, T>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Ok(CliArgs::try_parse_from(args)?)
}

/// Parses command-line arguments into the options for one run.
pub fn parse_args<I, T>(args: I) -> Result<ListOptions>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    parse_cli(args)?.into_options()
}
