//! Predicates deriving triage status from pull request data.

use tracing::debug;

use crate::{
    client::{RestClient, get_json},
    types::{KnownLabel, Label, MergeableState, PullRequest, Repo, Review},
};

pub const KONFLUX_BOT: &str = "red-hat-konflux[bot]";

const MIGRATION_MARKERS: &[&str] = &[
    "⚠️[migration]",
    ":warning:[migration]",
    "⚠️migration⚠️",
    "[migration]",
];

const SECURITY_KEYWORDS: &[&str] = &["security", "cve"];

pub fn is_on_hold(pr: &PullRequest) -> bool {
    pr.has_known_label(KnownLabel::DoNotMergeHold)
}

pub fn is_konflux_nudge(pr: &PullRequest) -> bool {
    pr.has_known_label(KnownLabel::KonfluxNudge)
}

pub fn is_konflux_author(pr: &PullRequest) -> bool {
    pr.user.login == KONFLUX_BOT
}

pub fn needs_rebase(pr: &PullRequest) -> bool {
    matches!(
        pr.mergeable_state,
        MergeableState::Dirty | MergeableState::Behind
    )
}

pub fn is_blocked(pr: &PullRequest) -> bool {
    pr.mergeable_state == MergeableState::Blocked
}

pub fn has_security(pr: &PullRequest) -> bool {
    let title = pr.title.to_lowercase();
    SECURITY_KEYWORDS.iter().any(|keyword| title.contains(keyword))
}

/// Only the bracketed/warning markers count; the bare word does not.
pub fn has_migration_warning(pr: &PullRequest) -> bool {
    let body = pr.body.to_lowercase();
    MIGRATION_MARKERS
        .iter()
        .any(|marker| body.contains(&marker.to_lowercase()))
}

fn has_review_label(labels: &[Label]) -> bool {
    labels.iter().any(|label| {
        label.name == KnownLabel::Approved.as_str() || label.name == KnownLabel::Lgtm.as_str()
    })
}

/// True when an `approved`/`lgtm` label is present, otherwise when any
/// review is `APPROVED`. A failed review fetch counts as not reviewed.
pub async fn is_reviewed<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    pr_number: u64,
    labels: &[Label],
) -> bool {
    if has_review_label(labels) {
        return true;
    }

    match get_json::<Vec<Review>, _>(client, &repo.pull_reviews_path(pr_number)).await {
        Ok(reviews) => reviews.iter().any(Review::is_approved),
        Err(err) => {
            debug!(pr_number, error = %err, "Failed to fetch reviews");
            false
        }
    }
}

/// Any `APPROVED` review from any user.
pub async fn has_approved_review<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    pr_number: u64,
) -> anyhow::Result<bool> {
    let reviews: Vec<Review> = get_json(client, &repo.pull_reviews_path(pr_number)).await?;
    Ok(reviews.iter().any(Review::is_approved))
}

pub const ICON_DRAFT: &str = "🟡";
pub const ICON_HOLD: &str = "🔶";
pub const ICON_OPEN: &str = "🟢";
pub const ICON_CLOSED: &str = "🔴";
pub const ICON_MERGED: &str = "🟣";
pub const ICON_OTHER: &str = "⚪";

/// Status glyph: draft first, then hold, then the PR state.
pub fn status_icon(pr: &PullRequest) -> &'static str {
    if pr.draft {
        return ICON_DRAFT;
    }
    if is_on_hold(pr) {
        return ICON_HOLD;
    }
    match pr.state.as_str() {
        "open" => ICON_OPEN,
        "closed" => ICON_CLOSED,
        "merged" => ICON_MERGED,
        _ => ICON_OTHER,
    }
}

/// Open, non-draft and not on hold.
pub fn is_approvable(pr: &PullRequest) -> bool {
    pr.is_open() && !pr.draft && !is_on_hold(pr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockClient, PrBuilder, mock_reviews};

    fn repo() -> Repo {
        Repo::new("owner", "repo").unwrap()
    }

    #[test]
    fn test_zero_value_pr_is_safe() {
        let pr = PullRequest::default();
        assert!(!is_on_hold(&pr));
        assert!(!is_konflux_nudge(&pr));
        assert!(!needs_rebase(&pr));
        assert!(!is_blocked(&pr));
        assert!(!has_security(&pr));
        assert!(!has_migration_warning(&pr));
        assert_eq!(status_icon(&pr), ICON_OTHER);
    }

    #[test]
    fn test_is_on_hold_requires_exact_label() {
        assert!(is_on_hold(&PrBuilder::new(1).label("do-not-merge/hold").build()));
        assert!(!is_on_hold(&PrBuilder::new(1).label("do-not-merge/hold-please").build()));
        assert!(!is_on_hold(&PrBuilder::new(1).label("DO-NOT-MERGE/HOLD").build()));
        assert!(!is_on_hold(&PrBuilder::new(1).label("do-not-merge").build()));
    }

    #[test]
    fn test_is_konflux_nudge() {
        assert!(is_konflux_nudge(&PrBuilder::new(1).label("konflux-nudge").build()));
        assert!(!is_konflux_nudge(&PrBuilder::new(1).label("konflux").build()));
    }

    #[test]
    fn test_needs_rebase_and_blocked_for_every_state() {
        let states = [
            ("", false, false),
            ("clean", false, false),
            ("dirty", true, false),
            ("behind", true, false),
            ("blocked", false, true),
            ("unstable", false, false),
            ("unknown", false, false),
            ("draft", false, false),
        ];
        for (state, rebase, blocked) in states {
            let pr = PrBuilder::new(1).mergeable_state(state).build();
            assert_eq!(needs_rebase(&pr), rebase, "state {state:?}");
            assert_eq!(is_blocked(&pr), blocked, "state {state:?}");
        }
    }

    #[test]
    fn test_has_security() {
        assert!(has_security(&PrBuilder::new(1).title("Fix Security issue").build()));
        assert!(has_security(&PrBuilder::new(1).title("Patch CVE-2024-1234").build()));
        assert!(!has_security(&PrBuilder::new(1).title("Update docs").build()));
    }

    #[test]
    fn test_has_migration_warning() {
        let cases = [
            ("⚠️[migration] db change", true),
            (":warning:[migration] see notes", true),
            ("⚠️migration⚠️ required", true),
            ("details [MIGRATION] inside", true),
            ("Migration guide here", false),
            ("", false),
        ];
        for (body, expected) in cases {
            let pr = PrBuilder::new(1).body(body).build();
            assert_eq!(has_migration_warning(&pr), expected, "body {body:?}");
        }
    }

    #[test]
    fn test_status_icon_precedence() {
        let draft_held = PrBuilder::new(1).draft(true).label("do-not-merge/hold").build();
        assert_eq!(status_icon(&draft_held), ICON_DRAFT);

        let held = PrBuilder::new(1).label("do-not-merge/hold").build();
        assert_eq!(status_icon(&held), ICON_HOLD);

        let closed_held = PrBuilder::new(1)
            .state("closed")
            .label("do-not-merge/hold")
            .build();
        assert_eq!(status_icon(&closed_held), ICON_HOLD);

        assert_eq!(status_icon(&PrBuilder::new(1).build()), ICON_OPEN);
        assert_eq!(status_icon(&PrBuilder::new(1).state("closed").build()), ICON_CLOSED);
        assert_eq!(status_icon(&PrBuilder::new(1).state("merged").build()), ICON_MERGED);
        assert_eq!(status_icon(&PrBuilder::new(1).state("weird").build()), ICON_OTHER);
    }

    #[tokio::test]
    async fn test_is_reviewed_label_short_circuits() {
        let client = MockClient::new();
        let labels = vec![Label::new("lgtm")];
        assert!(is_reviewed(&client, &repo(), 1, &labels).await);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_is_reviewed_from_reviews() {
        let client = MockClient::new();
        client.add_response("repos/owner/repo/pulls/1/reviews", &mock_reviews(true));
        client.add_response("repos/owner/repo/pulls/2/reviews", &mock_reviews(false));

        assert!(is_reviewed(&client, &repo(), 1, &[]).await);
        assert!(!is_reviewed(&client, &repo(), 2, &[]).await);
        // No response registered: fetch fails, treated as not reviewed.
        assert!(!is_reviewed(&client, &repo(), 3, &[]).await);
    }

    #[test]
    fn test_is_approvable() {
        assert!(is_approvable(&PrBuilder::new(1).build()));
        assert!(!is_approvable(&PrBuilder::new(1).draft(true).build()));
        assert!(!is_approvable(&PrBuilder::new(1).state("closed").build()));
        assert!(!is_approvable(
            &PrBuilder::new(1).label("do-not-merge/hold").build()
        ));
    }
}
