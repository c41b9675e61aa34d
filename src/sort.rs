use std::cmp::Ordering;

use tracing::warn;

use crate::{classify::has_migration_warning, types::PullRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Upstream order, which is already newest first.
    #[default]
    Newest,
    Oldest,
    Updated,
    Number,
    /// Migration warnings first, then newest.
    Priority,
}

impl SortKey {
    /// Keys are case-sensitive. Unrecognised keys fall back to `Newest`.
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "newest" => SortKey::Newest,
            "oldest" => SortKey::Oldest,
            "updated" => SortKey::Updated,
            "number" => SortKey::Number,
            "priority" => SortKey::Priority,
            other => {
                warn!(sort_by = other, "Unknown sort key, using newest");
                SortKey::Newest
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Newest => "newest",
            SortKey::Oldest => "oldest",
            SortKey::Updated => "updated",
            SortKey::Number => "number",
            SortKey::Priority => "priority",
        }
    }
}

/// Anything that can be ordered as a pull request.
pub trait Sortable {
    fn pr(&self) -> &PullRequest;

    /// Only consulted when sorting with the Tekton tier. The flag is
    /// fetched during enrichment, so sorting itself never does I/O.
    fn tekton_exclusive(&self) -> bool {
        false
    }
}

impl Sortable for PullRequest {
    fn pr(&self) -> &PullRequest {
        self
    }
}

fn priority_order<T: Sortable>(a: &T, b: &T, tekton_tier: bool) -> Ordering {
    // `true` sorts first in each tier.
    let migration = has_migration_warning(b.pr()).cmp(&has_migration_warning(a.pr()));
    let tekton = if tekton_tier {
        b.tekton_exclusive().cmp(&a.tekton_exclusive())
    } else {
        Ordering::Equal
    };
    migration
        .then(tekton)
        .then_with(|| b.pr().created_at.cmp(&a.pr().created_at))
}

/// Stable sort of `items` by `key`. `tekton_tier` inserts Tekton-exclusive
/// PRs between migration warnings and the rest under `Priority`.
pub fn sort_items<T: Sortable>(items: &mut [T], key: SortKey, tekton_tier: bool) {
    match key {
        SortKey::Newest => {}
        SortKey::Oldest => items.sort_by(|a, b| a.pr().created_at.cmp(&b.pr().created_at)),
        SortKey::Updated => items.sort_by(|a, b| b.pr().updated_at.cmp(&a.pr().updated_at)),
        SortKey::Number => items.sort_by_key(|item| item.pr().number),
        SortKey::Priority => items.sort_by(|a, b| priority_order(a, b, tekton_tier)),
    }
}

/// Sorts without any I/O.
pub fn sort_pull_requests(prs: &mut [PullRequest], key: SortKey) {
    sort_items(prs, key, false);
}
