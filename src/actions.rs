//! Remote mutations issued from the approval session.

use anyhow::{Context, Result};
use tracing::debug;

use crate::{
    client::{RestClient, post_json},
    types::{CommentRequest, KnownLabel, LabelRequest, Repo, ReviewRequest},
};

pub const APPROVE_EVENT: &str = "APPROVE";
pub const LGTM_COMMAND: &str = "/lgtm";
pub const HOLD_COMMAND: &str = "/hold";

/// Submits an `APPROVE` review with a `/lgtm` body.
pub async fn approve_pr<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    pr_number: u64,
) -> Result<()> {
    let review = ReviewRequest {
        body: LGTM_COMMAND.to_string(),
        event: APPROVE_EVENT.to_string(),
    };
    debug!(pr_number, "Submitting approval review");
    post_json(client, &repo.pull_reviews_path(pr_number), &review)
        .await
        .with_context(|| format!("Failed to approve PR #{pr_number}"))
}

/// Body of the hold comment: `/hold`, then `extra` after a blank line.
pub fn hold_comment_body(extra: &str) -> String {
    let extra = extra.trim();
    if extra.is_empty() {
        HOLD_COMMAND.to_string()
    } else {
        format!("{HOLD_COMMAND}\n\n{extra}")
    }
}

/// Comments `/hold` and then adds the `needs-ok-to-test` label. The label
/// is only added once the comment succeeded.
pub async fn hold_pr<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    pr_number: u64,
    extra_comment: &str,
) -> Result<()> {
    let comment = CommentRequest {
        body: hold_comment_body(extra_comment),
    };
    post_json(client, &repo.issue_comments_path(pr_number), &comment)
        .await
        .context("Failed to add /hold comment")?;

    let labels = LabelRequest {
        labels: vec![KnownLabel::NeedsOkToTest.as_str().to_string()],
    };
    post_json(client, &repo.issue_labels_path(pr_number), &labels)
        .await
        .context("Failed to add label")
}

pub async fn add_comment<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    pr_number: u64,
    text: &str,
) -> Result<()> {
    let comment = CommentRequest {
        body: text.to_string(),
    };
    post_json(client, &repo.issue_comments_path(pr_number), &comment)
        .await
        .context("Failed to post comment")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mock::MockClient;

    fn repo() -> Repo {
        Repo::new("owner", "repo").unwrap()
    }

    #[test]
    fn test_hold_comment_body() {
        assert_eq!(hold_comment_body(""), "/hold");
        assert_eq!(hold_comment_body("  "), "/hold");
        assert_eq!(hold_comment_body("waiting on infra"), "/hold\n\nwaiting on infra");
    }

    #[tokio::test]
    async fn test_approve_pr_posts_review() {
        let client = MockClient::new();
        client.add_response("repos/owner/repo/pulls/7/reviews", &json!({"id": 1}));

        approve_pr(&client, &repo(), 7).await.unwrap();

        let request = client.last_request().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "repos/owner/repo/pulls/7/reviews");
        assert_eq!(request.body.unwrap(), json!({"body": "/lgtm", "event": "APPROVE"}));
    }

    #[tokio::test]
    async fn test_hold_pr_comments_then_labels() {
        let client = MockClient::new();
        client.add_response("repos/owner/repo/issues/7", &json!({}));

        hold_pr(&client, &repo(), 7, "needs infra").await.unwrap();

        let posts = client.posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].path, "repos/owner/repo/issues/7/comments");
        assert_eq!(posts[0].body.as_ref().unwrap()["body"], "/hold\n\nneeds infra");
        assert_eq!(posts[1].path, "repos/owner/repo/issues/7/labels");
        assert_eq!(
            posts[1].body.as_ref().unwrap(),
            &json!({"labels": ["needs-ok-to-test"]})
        );
    }

    #[tokio::test]
    async fn test_hold_pr_stops_when_comment_fails() {
        let client = MockClient::new();
        client.add_error_response("comments", "forbidden");

        let err = hold_pr(&client, &repo(), 7, "").await.unwrap_err();
        assert!(err.to_string().contains("/hold comment"));
        assert_eq!(client.request_count("labels"), 0);
    }

    #[tokio::test]
    async fn test_add_comment() {
        let client = MockClient::new();
        client.add_response("comments", &json!({}));

        add_comment(&client, &repo(), 3, "looks fine").await.unwrap();
        let request = client.last_request().unwrap();
        assert_eq!(request.path, "repos/owner/repo/issues/3/comments");
        assert_eq!(request.body.unwrap(), json!({"body": "looks fine"}));
    }
}
