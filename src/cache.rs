//! Memoised full pull request records.
//!
//! List responses usually omit `mergeable_state`. Resolving it needs one
//! detail fetch per PR, and this cache makes sure that fetch happens at most
//! once per PR number for the lifetime of the process, even when enrichment
//! runs concurrently.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::{
    classify,
    client::{RestClient, get_json},
    types::{PullRequest, Repo},
};

#[derive(Debug, Default)]
pub struct PrDetailsCache {
    entries: Mutex<HashMap<u64, Arc<OnceCell<Arc<PullRequest>>>>>,
}

impl PrDetailsCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, pr_number: u64) -> Arc<OnceCell<Arc<PullRequest>>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(pr_number).or_default())
    }

    /// Number of PRs with a resolved entry.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the record carrying the most authoritative mergeable state.
    ///
    /// An `original` whose state is already computed is returned as-is
    /// without touching the cache. Otherwise the first call for
    /// `pr_number` fetches the full record; a failed fetch stores the
    /// original so the failure is not retried.
    pub async fn get_or_fetch<C: RestClient + ?Sized>(
        &self,
        client: &C,
        repo: &Repo,
        pr_number: u64,
        original: &PullRequest,
    ) -> Arc<PullRequest> {
        if original.mergeable_state.is_computed() {
            return Arc::new(original.clone());
        }

        let cell = self.cell(pr_number);
        let resolved = cell
            .get_or_init(|| async {
                debug!(pr_number, "Fetching full PR details");
                match get_json::<PullRequest, _>(client, &repo.pull_path(pr_number)).await {
                    Ok(full) => Arc::new(full),
                    Err(err) => {
                        warn!(pr_number, error = %err, "Failed to fetch PR details");
                        Arc::new(original.clone())
                    }
                }
            })
            .await;
        Arc::clone(resolved)
    }

    /// `None` when the mergeable state is still not known.
    pub async fn needs_rebase<C: RestClient + ?Sized>(
        &self,
        client: &C,
        repo: &Repo,
        pr: &PullRequest,
    ) -> Option<bool> {
        let resolved = self.get_or_fetch(client, repo, pr.number, pr).await;
        resolved
            .mergeable_state
            .is_computed()
            .then(|| classify::needs_rebase(&resolved))
    }

    /// `None` when the mergeable state is still not known.
    pub async fn is_blocked<C: RestClient + ?Sized>(
        &self,
        client: &C,
        repo: &Repo,
        pr: &PullRequest,
    ) -> Option<bool> {
        let resolved = self.get_or_fetch(client, repo, pr.number, pr).await;
        resolved
            .mergeable_state
            .is_computed()
            .then(|| classify::is_blocked(&resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockClient, PrBuilder};

    fn repo() -> Repo {
        Repo::new("owner", "repo").unwrap()
    }

    #[tokio::test]
    async fn test_computed_state_skips_cache() {
        let client = MockClient::new();
        let cache = PrDetailsCache::new();
        let pr = PrBuilder::new(1).mergeable_state("dirty").build();

        let resolved = cache.get_or_fetch(&client, &repo(), 1, &pr).await;
        assert_eq!(*resolved, pr);
        assert!(client.requests().is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_single_fetch_for_repeated_calls() {
        let client = MockClient::new();
        let full = PrBuilder::new(1).mergeable_state("clean").build();
        client.add_response("repos/owner/repo/pulls/1", &full);
        let cache = PrDetailsCache::new();
        let listed = PrBuilder::new(1).build();

        for _ in 0..5 {
            let resolved = cache.get_or_fetch(&client, &repo(), 1, &listed).await;
            assert_eq!(resolved.mergeable_state.as_str(), "clean");
        }
        assert_eq!(client.request_count("repos/owner/repo/pulls/1"), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_state_triggers_fetch() {
        let client = MockClient::new();
        client.add_response(
            "repos/owner/repo/pulls/2",
            &PrBuilder::new(2).mergeable_state("behind").build(),
        );
        let cache = PrDetailsCache::new();
        let listed = PrBuilder::new(2).mergeable_state("unknown").build();

        assert_eq!(cache.needs_rebase(&client, &repo(), &listed).await, Some(true));
        assert_eq!(cache.is_blocked(&client, &repo(), &listed).await, Some(false));
        assert_eq!(client.request_count("pulls/2"), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_cached_as_original() {
        let client = MockClient::new();
        client.add_error_response("repos/owner/repo/pulls/3", "server error");
        let cache = PrDetailsCache::new();
        let listed = PrBuilder::new(3).title("listed").build();

        let first = cache.get_or_fetch(&client, &repo(), 3, &listed).await;
        let second = cache.get_or_fetch(&client, &repo(), 3, &listed).await;
        assert_eq!(first.title, "listed");
        assert_eq!(second.title, "listed");
        assert_eq!(client.request_count("pulls/3"), 1);
        assert_eq!(cache.needs_rebase(&client, &repo(), &listed).await, None);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let client = MockClient::new().with_latency(std::time::Duration::from_millis(20));
        client.add_response(
            "repos/owner/repo/pulls/4",
            &PrBuilder::new(4).mergeable_state("blocked").build(),
        );
        let cache = PrDetailsCache::new();
        let listed = PrBuilder::new(4).build();
        let repo = repo();

        let calls = (0..8).map(|_| cache.is_blocked(&client, &repo, &listed));
        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(|r| *r == Some(true)));
        assert_eq!(client.request_count("pulls/4"), 1);
    }
}
