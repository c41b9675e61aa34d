//! ghprs: GitHub pull request triage from the terminal.
//!
//! Lists the pull requests of one or more repositories with their review,
//! rebase, merge-blocking and CI state, ranks them, and optionally walks
//! through them in an interactive approval session that can approve, hold or
//! comment. A `konflux` mode narrows the list to PRs opened by the Konflux
//! bot and flags Tekton-only changes and migration warnings.
//!
//! All network access goes through the [`RestClient`] trait; [`GitHub`] is
//! the production implementation and [`mock::MockClient`] the in-memory one
//! used by the tests.

pub mod actions;
pub mod approval;
pub mod cache;
pub mod checks;
pub mod classify;
pub mod cli;
pub mod client;
pub mod enrich;
pub mod github;
pub mod mock;
pub mod query;
pub mod sort;
pub mod table;
pub mod tekton;
pub mod text;
pub mod types;

pub use approval::{ApprovalConfig, ApprovalResult, ApprovalSummary, run_approval_session};
pub use cache::PrDetailsCache;
pub use checks::CheckStatus;
pub use cli::{CliArgs, ListOptions, PrState, parse_args, parse_cli};
pub use client::RestClient;
pub use enrich::{EnrichedPr, MergeFlag};
pub use github::GitHub;
pub use query::run;
pub use sort::SortKey;
pub use tekton::TektonCheck;
pub use text::Style;
pub use types::{
    CheckRun, KnownLabel, Label, MergeableState, PrFile, PullRequest, Repo, RepoError, Review,
};
