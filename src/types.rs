use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// GitHub sends `null` for many optional strings (PR body, check conclusion,
// status description). The engine treats those as empty strings.
pub fn deserialize_null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Well-known labels the triage engine inspects or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownLabel {
    Approved,
    Lgtm,
    DoNotMergeHold,
    KonfluxNudge,
    NeedsOkToTest,
}

impl KnownLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownLabel::Approved => "approved",
            KnownLabel::Lgtm => "lgtm",
            KnownLabel::DoNotMergeHold => "do-not-merge/hold",
            KnownLabel::KonfluxNudge => "konflux-nudge",
            KnownLabel::NeedsOkToTest => "needs-ok-to-test",
        }
    }
}

/// Upstream-computed merge readiness of a pull request.
///
/// `Unset` (empty or missing in the JSON) and `Unknown` mean GitHub has not
/// finished computing the state yet; every other value is authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum MergeableState {
    #[default]
    Unset,
    Clean,
    Dirty,
    Blocked,
    Behind,
    Unstable,
    Unknown,
    Other(String),
}

impl MergeableState {
    pub fn as_str(&self) -> &str {
        match self {
            MergeableState::Unset => "",
            MergeableState::Clean => "clean",
            MergeableState::Dirty => "dirty",
            MergeableState::Blocked => "blocked",
            MergeableState::Behind => "behind",
            MergeableState::Unstable => "unstable",
            MergeableState::Unknown => "unknown",
            MergeableState::Other(other) => other,
        }
    }

    /// Returns false while GitHub is still computing the state.
    pub fn is_computed(&self) -> bool {
        !matches!(self, MergeableState::Unset | MergeableState::Unknown)
    }
}

impl From<&str> for MergeableState {
    fn from(value: &str) -> Self {
        match value {
            "" => MergeableState::Unset,
            "clean" => MergeableState::Clean,
            "dirty" => MergeableState::Dirty,
            "blocked" => MergeableState::Blocked,
            "behind" => MergeableState::Behind,
            "unstable" => MergeableState::Unstable,
            "unknown" => MergeableState::Unknown,
            other => MergeableState::Other(other.to_string()),
        }
    }
}

impl From<Option<String>> for MergeableState {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(MergeableState::from).unwrap_or_default()
    }
}

impl From<MergeableState> for String {
    fn from(value: MergeableState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MergeableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(rename = "ref", default)]
    pub ref_name: String,
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A pull request as returned by the REST list and detail endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequest {
    pub number: u64,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub title: String,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub body: String,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub state: String,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub draft: bool,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub user: User,
    pub head: Branch,
    pub base: Branch,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub created_at: String,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub updated_at: String,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub html_url: String,
    pub mergeable_state: MergeableState,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub labels: Vec<Label>,
}

impl PullRequest {
    /// Exact, case-sensitive label lookup.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label.name == name)
    }

    pub fn has_known_label(&self, label: KnownLabel) -> bool {
        self.has_label(label.as_str())
    }

    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

/// A file touched by a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrFile {
    pub filename: String,
    #[serde(default)]
    pub status: String,
}

pub const REVIEW_STATE_APPROVED: &str = "APPROVED";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub state: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub user: User,
}

impl Review {
    pub fn is_approved(&self) -> bool {
        self.state == REVIEW_STATE_APPROVED
    }
}

/// A single entry from the check-runs API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckRun {
    pub name: String,
    /// queued, in_progress or completed.
    pub status: String,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub conclusion: String,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub html_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckRunsResponse {
    pub total_count: usize,
    pub check_runs: Vec<CheckRun>,
}

/// A legacy commit status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCheck {
    pub state: String,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub description: String,
    pub context: String,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub target_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinedStatus {
    pub state: String,
    pub statuses: Vec<StatusCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewRequest {
    pub body: String,
    pub event: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRequest {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelRequest {
    pub labels: Vec<String>,
}

/// Errors produced when parsing a repository identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    InvalidFormat(String),
    EmptyComponent(String),
    NotGitHub(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoError::InvalidFormat(input) => {
                write!(f, "repository must be in format 'owner/repo', got: '{input}'")
            }
            RepoError::EmptyComponent(input) => {
                write!(f, "repository owner and name must be non-empty, got: '{input}'")
            }
            RepoError::NotGitHub(input) => {
                write!(f, "URL must point at github.com, got: '{input}'")
            }
        }
    }
}

impl std::error::Error for RepoError {}

/// A GitHub repository, and the REST routes the engine uses within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    pub owner: String,
    pub name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() {
            return Err(RepoError::EmptyComponent(format!("{owner}/{name}")));
        }
        Ok(Self { owner, name })
    }

    /// Parses `owner/repo` or a `https://github.com/owner/repo[/...]` URL.
    pub fn parse(input: &str) -> Result<Self, RepoError> {
        let input = input.trim();
        if input.starts_with("https://") || input.starts_with("http://") {
            return Self::parse_url(input);
        }

        let parts: Vec<&str> = input.split('/').collect();
        if parts.len() != 2 {
            return Err(RepoError::InvalidFormat(input.to_string()));
        }
        Self::new(parts[0], parts[1].trim_end_matches(".git"))
    }

    fn parse_url(input: &str) -> Result<Self, RepoError> {
        let url =
            url::Url::parse(input).map_err(|_| RepoError::InvalidFormat(input.to_string()))?;
        if url.host_str() != Some("github.com") {
            return Err(RepoError::NotGitHub(input.to_string()));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        match segments.as_slice() {
            [owner, name, ..] => Self::new(*owner, name.trim_end_matches(".git")),
            _ => Err(RepoError::InvalidFormat(input.to_string())),
        }
    }

    pub fn pulls_path(&self) -> String {
        format!("repos/{}/{}/pulls", self.owner, self.name)
    }

    pub fn pull_path(&self, pr_number: u64) -> String {
        format!("{}/{}", self.pulls_path(), pr_number)
    }

    pub fn pull_files_path(&self, pr_number: u64) -> String {
        format!("{}/files", self.pull_path(pr_number))
    }

    pub fn pull_reviews_path(&self, pr_number: u64) -> String {
        format!("{}/reviews", self.pull_path(pr_number))
    }

    pub fn issue_comments_path(&self, pr_number: u64) -> String {
        format!("repos/{}/{}/issues/{}/comments", self.owner, self.name, pr_number)
    }

    pub fn issue_labels_path(&self, pr_number: u64) -> String {
        format!("repos/{}/{}/issues/{}/labels", self.owner, self.name, pr_number)
    }

    pub fn check_runs_path(&self, sha: &str) -> String {
        format!("repos/{}/{}/commits/{}/check-runs", self.owner, self.name, sha)
    }

    pub fn commit_status_path(&self, sha: &str) -> String {
        format!("repos/{}/{}/commits/{}/status", self.owner, self.name, sha)
    }

    pub fn pull_url(&self, pr_number: u64) -> String {
        format!(
            "https://github.com/{}/{}/pull/{}",
            self.owner, self.name, pr_number
        )
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_request_deserializes_nullable_fields() {
        let json = serde_json::json!({
            "number": 42,
            "title": "Bump deps",
            "body": null,
            "state": "open",
            "draft": false,
            "user": {"login": "red-hat-konflux[bot]"},
            "head": {"ref": "konflux/update", "sha": "abc"},
            "base": {"ref": "main", "sha": "def"},
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "mergeable_state": null,
            "labels": [{"name": "konflux-nudge", "color": "ffffff"}]
        });

        let pr: PullRequest = serde_json::from_value(json).unwrap();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.body, "");
        assert_eq!(pr.head.ref_name, "konflux/update");
        assert_eq!(pr.mergeable_state, MergeableState::Unset);
        assert!(pr.has_known_label(KnownLabel::KonfluxNudge));
    }

    #[test]
    fn test_mergeable_state_round_trips_unrecognised_values() {
        let pr: PullRequest =
            serde_json::from_value(serde_json::json!({"number": 1, "mergeable_state": "has_hooks"}))
                .unwrap();
        assert_eq!(
            pr.mergeable_state,
            MergeableState::Other("has_hooks".to_string())
        );
        assert!(pr.mergeable_state.is_computed());

        let value = serde_json::to_value(&pr).unwrap();
        assert_eq!(value["mergeable_state"], "has_hooks");
    }

    #[test]
    fn test_mergeable_state_is_computed() {
        assert!(!MergeableState::Unset.is_computed());
        assert!(!MergeableState::Unknown.is_computed());
        assert!(MergeableState::Clean.is_computed());
        assert!(MergeableState::Dirty.is_computed());
        assert!(MergeableState::Blocked.is_computed());
    }

    #[test]
    fn test_repo_parse() {
        let repo = Repo::parse("owner/repo").unwrap();
        assert_eq!(repo.owner, "owner");
        assert_eq!(repo.name, "repo");
        assert_eq!(repo.to_string(), "owner/repo");

        let repo = Repo::parse("https://github.com/konflux-ci/build-definitions/pull/7").unwrap();
        assert_eq!(repo.to_string(), "konflux-ci/build-definitions");

        assert!(matches!(
            Repo::parse("owner"),
            Err(RepoError::InvalidFormat(_))
        ));
        assert!(matches!(
            Repo::parse("a/b/c"),
            Err(RepoError::InvalidFormat(_))
        ));
        assert!(matches!(
            Repo::parse("/repo"),
            Err(RepoError::EmptyComponent(_))
        ));
        assert!(matches!(
            Repo::parse("https://gitlab.com/owner/repo"),
            Err(RepoError::NotGitHub(_))
        ));
    }

    #[test]
    fn test_repo_paths() {
        let repo = Repo::new("o", "r").unwrap();
        assert_eq!(repo.pull_path(7), "repos/o/r/pulls/7");
        assert_eq!(repo.pull_files_path(7), "repos/o/r/pulls/7/files");
        assert_eq!(repo.pull_reviews_path(7), "repos/o/r/pulls/7/reviews");
        assert_eq!(repo.issue_comments_path(7), "repos/o/r/issues/7/comments");
        assert_eq!(repo.issue_labels_path(7), "repos/o/r/issues/7/labels");
        assert_eq!(repo.check_runs_path("abc"), "repos/o/r/commits/abc/check-runs");
        assert_eq!(repo.commit_status_path("abc"), "repos/o/r/commits/abc/status");
        assert_eq!(repo.pull_url(7), "https://github.com/o/r/pull/7");
    }
}
