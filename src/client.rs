use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::types::Repo;

/// Bound on in-flight requests when enriching or sorting many PRs.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

/// REST access to the code-hosting API.
///
/// Paths are resource strings relative to the API root, such as
/// `repos/{owner}/{repo}/pulls/{n}/reviews`, optionally carrying a query
/// string. Transport, authentication and rate limiting are the
/// implementor's concern.
#[async_trait]
pub trait RestClient: Send + Sync {
    async fn get(&self, path: &str) -> Result<serde_json::Value>;

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value>;

    /// Unified diff of a pull request.
    async fn get_diff(&self, repo: &Repo, pr_number: u64) -> Result<String>;
}

/// GETs `path` and decodes the JSON response into `T`.
pub async fn get_json<T, C>(client: &C, path: &str) -> Result<T>
where
    T: DeserializeOwned,
    C: RestClient + ?Sized,
{
    let value = client.get(path).await?;
    serde_json::from_value(value).with_context(|| format!("Failed to decode response from {path}"))
}

/// POSTs `body` as JSON to `path`, discarding the response body.
pub async fn post_json<B, C>(client: &C, path: &str, body: &B) -> Result<()>
where
    B: Serialize + ?Sized,
    C: RestClient + ?Sized,
{
    let body = serde_json::to_value(body)
        .with_context(|| format!("Failed to encode request body for {path}"))?;
    client.post(path, &body).await?;
    Ok(())
}
