//! In-memory [`RestClient`] and typed fixtures for tests.
//!
//! Responses are registered against path patterns. A request is answered
//! by the pattern equal to its path (query string ignored), otherwise by the
//! longest pattern that is a substring of the path or matches it with a
//! single `*` wildcard. Unmatched requests fail with a 404 error.

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::{
    client::RestClient,
    types::{
        Branch, CheckRun, CheckRunsResponse, KnownLabel, Label, MergeableState, PrFile,
        PullRequest, Repo, Review, User,
    },
};

#[derive(Debug, Clone)]
pub enum MockResponse {
    Json(Value),
    Text(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
pub struct MockClient {
    responses: Mutex<Vec<(String, MockResponse)>>,
    requests: Mutex<Vec<MockRequest>>,
    latency: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn matches_pattern(path: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some((prefix, suffix)) = pattern.split_once('*')
        && !suffix.contains('*')
    {
        return path.len() >= prefix.len() + suffix.len()
            && path.starts_with(prefix)
            && path.ends_with(suffix);
    }
    path.contains(pattern)
}

fn without_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(route, _)| route)
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every request, so cached and uncached paths can be timed.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn insert(&self, pattern: &str, response: MockResponse) {
        let mut responses = lock(&self.responses);
        match responses.iter_mut().find(|(p, _)| p == pattern) {
            Some(entry) => entry.1 = response,
            None => responses.push((pattern.to_string(), response)),
        }
    }

    /// Registers a JSON response; re-registering a pattern replaces it.
    pub fn add_response<T: Serialize + ?Sized>(&self, pattern: &str, body: &T) {
        let response = match serde_json::to_value(body) {
            Ok(value) => MockResponse::Json(value),
            Err(err) => MockResponse::Error(format!("fixture serialisation failed: {err}")),
        };
        self.insert(pattern, response);
    }

    pub fn add_text_response(&self, pattern: &str, text: impl Into<String>) {
        self.insert(pattern, MockResponse::Text(text.into()));
    }

    pub fn add_error_response(&self, pattern: &str, message: impl Into<String>) {
        self.insert(pattern, MockResponse::Error(message.into()));
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<MockRequest> {
        lock(&self.requests).last().cloned()
    }

    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }

    /// Number of recorded requests whose path matches `pattern`.
    pub fn request_count(&self, pattern: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|req| matches_pattern(&req.path, pattern))
            .count()
    }

    /// Recorded POST requests, in order.
    pub fn posts(&self) -> Vec<MockRequest> {
        lock(&self.requests)
            .iter()
            .filter(|req| req.method == "POST")
            .cloned()
            .collect()
    }

    fn find_response(&self, path: &str) -> Option<MockResponse> {
        let responses = lock(&self.responses);
        let route = without_query(path);

        if let Some((_, response)) = responses.iter().find(|(p, _)| p == path || p == route) {
            return Some(response.clone());
        }

        responses
            .iter()
            .filter(|(pattern, _)| matches_pattern(path, pattern))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, response)| response.clone())
    }

    async fn respond(&self, method: &str, path: &str, body: Option<Value>) -> Result<MockResponse> {
        lock(&self.requests).push(MockRequest {
            method: method.to_string(),
            path: path.to_string(),
            body,
        });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.find_response(path) {
            Some(MockResponse::Error(message)) => anyhow::bail!("{message}"),
            Some(response) => Ok(response),
            None => anyhow::bail!("HTTP 404: no mock response for {method} {path}"),
        }
    }
}

#[async_trait]
impl RestClient for MockClient {
    async fn get(&self, path: &str) -> Result<Value> {
        match self.respond("GET", path, None).await? {
            MockResponse::Text(text) => Ok(Value::String(text)),
            MockResponse::Json(value) => Ok(value),
            MockResponse::Error(message) => anyhow::bail!("{message}"),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        match self.respond("POST", path, Some(body.clone())).await? {
            MockResponse::Text(text) => Ok(Value::String(text)),
            MockResponse::Json(value) => Ok(value),
            MockResponse::Error(message) => anyhow::bail!("{message}"),
        }
    }

    async fn get_diff(&self, repo: &Repo, pr_number: u64) -> Result<String> {
        let path = format!("{}.diff", repo.pull_path(pr_number));
        match self.respond("GET", &path, None).await? {
            MockResponse::Text(text) => Ok(text),
            MockResponse::Json(Value::String(text)) => Ok(text),
            MockResponse::Json(value) => Ok(value.to_string()),
            MockResponse::Error(message) => anyhow::bail!("{message}"),
        }
    }
}

/// Builder for hand-made pull request fixtures.
#[derive(Debug, Clone)]
pub struct PrBuilder {
    pr: PullRequest,
}

impl PrBuilder {
    pub fn new(number: u64) -> Self {
        Self {
            pr: PullRequest {
                number,
                title: format!("Test PR {number}"),
                body: String::new(),
                state: "open".to_string(),
                draft: false,
                user: User {
                    login: format!("user{number}"),
                },
                head: Branch {
                    ref_name: format!("feature-branch-{number}"),
                    sha: format!("sha{number}"),
                },
                base: Branch {
                    ref_name: "main".to_string(),
                    sha: "def456".to_string(),
                },
                created_at: "2023-01-01T00:00:00Z".to_string(),
                updated_at: "2023-01-02T00:00:00Z".to_string(),
                html_url: format!("https://github.com/owner/repo/pull/{number}"),
                mergeable_state: MergeableState::Unset,
                labels: Vec::new(),
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.pr.title = title.to_string();
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.pr.body = body.to_string();
        self
    }

    pub fn state(mut self, state: &str) -> Self {
        self.pr.state = state.to_string();
        self
    }

    pub fn draft(mut self, draft: bool) -> Self {
        self.pr.draft = draft;
        self
    }

    pub fn author(mut self, login: &str) -> Self {
        self.pr.user.login = login.to_string();
        self
    }

    pub fn label(mut self, name: &str) -> Self {
        self.pr.labels.push(Label::new(name));
        self
    }

    pub fn mergeable_state(mut self, state: &str) -> Self {
        self.pr.mergeable_state = MergeableState::from(state);
        self
    }

    pub fn created_at(mut self, created_at: &str) -> Self {
        self.pr.created_at = created_at.to_string();
        self
    }

    pub fn updated_at(mut self, updated_at: &str) -> Self {
        self.pr.updated_at = updated_at.to_string();
        self
    }

    pub fn head_sha(mut self, sha: &str) -> Self {
        self.pr.head.sha = sha.to_string();
        self
    }

    pub fn build(self) -> PullRequest {
        self.pr
    }
}

/// `count` open PRs numbered from 1. Every third (starting with the first)
/// is a draft, every fifth is on hold and every seventh carries a migration
/// warning.
pub fn mock_pull_requests(count: usize) -> Vec<PullRequest> {
    (0..count)
        .map(|i| {
            let number = i as u64 + 1;
            let mut builder = PrBuilder::new(number)
                .draft(i % 3 == 0)
                .head_sha(&format!("abc123{i}"))
                .body(&format!("This is test PR {number}"));
            if i % 5 == 0 {
                builder = builder.label(KnownLabel::DoNotMergeHold.as_str());
            }
            let mut pr = builder.build();
            if i % 7 == 0 {
                pr.body.push_str(" ⚠️[migration] warning");
            }
            pr
        })
        .collect()
}

/// `passed` successful, `failed` failed and `pending` in-progress runs.
pub fn mock_check_runs(passed: usize, failed: usize, pending: usize) -> CheckRunsResponse {
    let run = |name: String, status: &str, conclusion: &str, index: usize| CheckRun {
        name,
        status: status.to_string(),
        conclusion: conclusion.to_string(),
        html_url: format!("https://github.com/owner/repo/runs/{index}"),
    };

    let mut check_runs = Vec::with_capacity(passed + failed + pending);
    check_runs.extend((0..passed).map(|i| {
        run(format!("test-passed-{}", i + 1), "completed", "success", i + 1)
    }));
    check_runs.extend((0..failed).map(|i| {
        run(
            format!("test-failed-{}", i + 1),
            "completed",
            "failure",
            passed + i + 1,
        )
    }));
    check_runs.extend((0..pending).map(|i| {
        run(
            format!("test-pending-{}", i + 1),
            "in_progress",
            "",
            passed + failed + i + 1,
        )
    }));

    CheckRunsResponse {
        total_count: check_runs.len(),
        check_runs,
    }
}

/// Changed files: only Tekton pipeline definitions, or a mixed set.
pub fn mock_pr_files(tekton_only: bool) -> Vec<PrFile> {
    let file = |filename: &str, status: &str| PrFile {
        filename: filename.to_string(),
        status: status.to_string(),
    };

    if tekton_only {
        vec![
            file(".tekton/app-pull-request.yaml", "modified"),
            file(".tekton/app-push.yaml", "modified"),
        ]
    } else {
        vec![
            file("src/main.rs", "modified"),
            file("README.md", "modified"),
            file(".tekton/app-push.yaml", "added"),
        ]
    }
}

pub fn mock_reviews(approved: bool) -> Vec<Review> {
    let state = if approved { "APPROVED" } else { "COMMENTED" };
    vec![Review {
        state: state.to_string(),
        user: User {
            login: "reviewer1".to_string(),
        },
    }]
}

/// Registers a list of five PRs with details, checks, files, reviews and a
/// diff. Every fourth PR is Tekton-only and every third is approved.
pub fn setup_mock_responses(client: &MockClient, repo: &Repo) -> Vec<PullRequest> {
    let mut prs = mock_pull_requests(5);
    for pr in &mut prs {
        pr.html_url = repo.pull_url(pr.number);
    }

    client.add_response(&repo.pulls_path(), &prs);
    for pr in &prs {
        client.add_response(&repo.pull_path(pr.number), pr);
        client.add_response(&repo.check_runs_path(&pr.head.sha), &mock_check_runs(3, 1, 1));
        client.add_response(
            &repo.pull_files_path(pr.number),
            &mock_pr_files(pr.number % 4 == 0),
        );
        client.add_response(
            &repo.pull_reviews_path(pr.number),
            &mock_reviews(pr.number % 3 == 0),
        );
        client.add_text_response(
            &format!("{}.diff", repo.pull_path(pr.number)),
            "+added line\n-removed line\n unchanged line",
        );
    }

    prs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::get_json;

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern("repos/o/r/pulls/1", "*"));
        assert!(matches_pattern("repos/o/r/pulls/1", "pulls/1"));
        assert!(matches_pattern("repos/o/r/pulls/1/files", "repos/*/files"));
        assert!(!matches_pattern("repos/o/r/pulls/1/reviews", "repos/*/files"));
        assert!(!matches_pattern("ab", "ab*b"));
    }

    #[tokio::test]
    async fn test_exact_match_wins_over_substring() {
        let client = MockClient::new();
        client.add_response("repos/o/r/pulls", &serde_json::json!(["list"]));
        client.add_response("repos/o/r/pulls/1", &serde_json::json!({"number": 1}));

        let list = client.get("repos/o/r/pulls?state=open&per_page=30").await.unwrap();
        assert_eq!(list, serde_json::json!(["list"]));

        let detail = client.get("repos/o/r/pulls/1").await.unwrap();
        assert_eq!(detail["number"], 1);

        // Longest matching pattern answers paths with no exact entry.
        let files = client.get("repos/o/r/pulls/1/files").await.unwrap();
        assert_eq!(files["number"], 1);
    }

    #[tokio::test]
    async fn test_unmatched_request_is_404_and_recorded() {
        let client = MockClient::new();
        let err = client.get("repos/o/r/pulls/9").await.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert_eq!(client.request_count("pulls/9"), 1);
        assert_eq!(client.last_request().unwrap().method, "GET");
    }

    #[tokio::test]
    async fn test_error_response_and_post_recording() {
        let client = MockClient::new();
        client.add_error_response("reviews", "boom");
        let body = serde_json::json!({"event": "APPROVE"});
        let err = client.post("repos/o/r/pulls/1/reviews", &body).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");

        let posts = client.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].body.as_ref().unwrap()["event"], "APPROVE");

        client.clear_requests();
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_setup_mock_responses() {
        let client = MockClient::new();
        let repo = Repo::new("owner", "repo").unwrap();
        let prs = setup_mock_responses(&client, &repo);
        assert_eq!(prs.len(), 5);

        let listed: Vec<PullRequest> = get_json(&client, &repo.pulls_path()).await.unwrap();
        assert_eq!(listed, prs);

        let files: Vec<PrFile> = get_json(&client, &repo.pull_files_path(4)).await.unwrap();
        assert_eq!(files, mock_pr_files(true));

        let diff = client.get_diff(&repo, 2).await.unwrap();
        assert!(diff.starts_with("+added line"));
    }

    #[test]
    fn test_mock_pull_requests_variety() {
        let prs = mock_pull_requests(8);
        assert!(prs[0].draft);
        assert!(prs[3].draft);
        assert!(!prs[1].draft);
        assert!(prs[0].has_known_label(KnownLabel::DoNotMergeHold));
        assert!(prs[5].has_known_label(KnownLabel::DoNotMergeHold));
        assert!(prs[7].body.contains("⚠️[migration]"));
        assert_eq!(prs[2].head.sha, "abc1232");
    }

    #[test]
    fn test_mock_check_runs() {
        let runs = mock_check_runs(3, 2, 1);
        assert_eq!(runs.total_count, 6);
        let count = |conclusion: &str| {
            runs.check_runs
                .iter()
                .filter(|run| run.conclusion == conclusion)
                .count()
        };
        assert_eq!(count("success"), 3);
        assert_eq!(count("failure"), 2);
        assert_eq!(
            runs.check_runs
                .iter()
                .filter(|run| run.status == "in_progress")
                .count(),
            1
        );
    }
}
