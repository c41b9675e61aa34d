//! Per-PR status gathered once before display and sorting.

use futures::{StreamExt, stream};
use tracing::debug;

use crate::{
    cache::PrDetailsCache,
    classify::{has_migration_warning, is_on_hold, is_reviewed},
    client::RestClient,
    sort::Sortable,
    tekton::{TektonCheck, check_tekton_files},
    types::{PullRequest, Repo},
};

/// Rebase or blocked state as shown in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeFlag {
    /// Not evaluated because the PR is on hold.
    NotApplicable,
    /// Upstream has not computed the mergeable state yet.
    Unknown,
    Known(bool),
}

impl MergeFlag {
    fn from_resolved(value: Option<bool>) -> Self {
        value.map_or(MergeFlag::Unknown, MergeFlag::Known)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, MergeFlag::Known(true))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedPr {
    pub pr: PullRequest,
    pub reviewed: bool,
    pub needs_rebase: MergeFlag,
    pub blocked: MergeFlag,
    /// Only evaluated for Konflux runs.
    pub tekton: Option<TektonCheck>,
    /// Only evaluated for Konflux runs.
    pub migration: bool,
}

impl Sortable for EnrichedPr {
    fn pr(&self) -> &PullRequest {
        &self.pr
    }

    fn tekton_exclusive(&self) -> bool {
        self.tekton.as_ref().is_some_and(|check| check.exclusive)
    }
}

async fn merge_flags<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    cache: &PrDetailsCache,
    pr: &PullRequest,
) -> (MergeFlag, MergeFlag) {
    if is_on_hold(pr) {
        return (MergeFlag::NotApplicable, MergeFlag::NotApplicable);
    }
    let rebase = cache.needs_rebase(client, repo, pr).await;
    let blocked = cache.is_blocked(client, repo, pr).await;
    (
        MergeFlag::from_resolved(rebase),
        MergeFlag::from_resolved(blocked),
    )
}

async fn tekton_status<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    pr_number: u64,
    konflux: bool,
) -> Option<TektonCheck> {
    if !konflux {
        return None;
    }
    match check_tekton_files(client, repo, pr_number).await {
        Ok(check) => Some(check),
        Err(err) => {
            debug!(pr_number, error = %err, "Tekton check failed");
            Some(TektonCheck::default())
        }
    }
}

pub async fn enrich_pull_request<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    cache: &PrDetailsCache,
    pr: PullRequest,
    konflux: bool,
) -> EnrichedPr {
    let (reviewed, (needs_rebase, blocked), tekton) = futures::join!(
        is_reviewed(client, repo, pr.number, &pr.labels),
        merge_flags(client, repo, cache, &pr),
        tekton_status(client, repo, pr.number, konflux),
    );
    let migration = konflux && has_migration_warning(&pr);

    EnrichedPr {
        pr,
        reviewed,
        needs_rebase,
        blocked,
        tekton,
        migration,
    }
}

/// Enriches `prs` with at most `max_concurrent` PRs in flight, keeping
/// the input order.
pub async fn enrich_pull_requests<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    cache: &PrDetailsCache,
    prs: Vec<PullRequest>,
    konflux: bool,
    max_concurrent: usize,
) -> Vec<EnrichedPr> {
    stream::iter(prs)
        .map(|pr| enrich_pull_request(client, repo, cache, pr, konflux))
        .buffered(max_concurrent.max(1))
        .collect()
        .await
}
