use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use serde_json::Value;
use tracing::debug;

use crate::{client::RestClient, types::Repo};

pub fn get_github_token() -> Result<String> {
    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        return Ok(token);
    }

    if let Ok(token) = std::env::var("GH_TOKEN") {
        return Ok(token);
    }

    let output = Command::new("gh").args(["auth", "token"]).output()?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// Splits `repos/o/r/pulls?state=open` into an absolute route and its
/// decoded query parameters.
fn split_route(path: &str) -> (String, Vec<(String, String)>) {
    let (route, query) = path.split_once('?').unwrap_or((path, ""));
    let route = format!("/{}", route.trim_start_matches('/'));
    let params = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    (route, params)
}

/// [`RestClient`] backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHub {
    octocrab: Octocrab,
}

impl GitHub {
    pub fn new(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }

    /// Creates an authenticated client using available credentials.
    pub fn from_env() -> Result<Self> {
        let token = get_github_token().context("Failed to obtain GitHub authentication token")?;
        let octocrab = Octocrab::builder()
            .personal_token(token)
            .build()
            .context("Failed to create GitHub client")?;
        Ok(Self::new(octocrab))
    }
}

#[async_trait]
impl RestClient for GitHub {
    async fn get(&self, path: &str) -> Result<Value> {
        let (route, params) = split_route(path);
        debug!(route = %route, "GET");
        let params = (!params.is_empty()).then_some(params);
        self.octocrab
            .get(&route, params.as_ref())
            .await
            .with_context(|| format!("GET {route} failed"))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let (route, _) = split_route(path);
        debug!(route = %route, "POST");
        self.octocrab
            .post(&route, Some(body))
            .await
            .with_context(|| format!("POST {route} failed"))
    }

    async fn get_diff(&self, repo: &Repo, pr_number: u64) -> Result<String> {
        self.octocrab
            .pulls(&repo.owner, &repo.name)
            .get_diff(pr_number)
            .await
            .with_context(|| format!("Failed to fetch diff for {repo}#{pr_number}"))
    }
}

/// Parses a git remote URL in https, ssh or scp-like form.
pub fn parse_remote_url(remote: &str) -> Result<Repo> {
    let remote = remote.trim();
    let repo = if let Some(path) = remote.strip_prefix("git@github.com:") {
        Repo::parse(path)
    } else if let Some(path) = remote.strip_prefix("ssh://git@github.com/") {
        Repo::parse(path)
    } else if remote.starts_with("https://") || remote.starts_with("http://") {
        Repo::parse(remote)
    } else {
        anyhow::bail!("Unsupported git remote '{}': not a GitHub URL", remote);
    };
    repo.map_err(|e| anyhow::anyhow!("Unsupported git remote '{}': {}", remote, e))
}

/// The repository of the current checkout, from its `origin` remote.
pub fn detect_current_repo() -> Result<Repo> {
    let output = Command::new("git")
        .args(["remote", "get-url", "origin"])
        .output()
        .context("Failed to run git")?;

    if !output.status.success() {
        anyhow::bail!(
            "No repository given and the current directory has no 'origin' remote; pass OWNER/REPO"
        );
    }

    let remote = String::from_utf8(output.stdout)?;
    parse_remote_url(&remote)
}
