use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::{
    approval::{ApprovalSummary, run_approval_session},
    cache::PrDetailsCache,
    classify::is_konflux_author,
    cli::ListOptions,
    client::{RestClient, get_json},
    enrich::{EnrichedPr, enrich_pull_requests},
    sort::{SortKey, Sortable, sort_items},
    table::{title_width, write_table},
    types::{PullRequest, Repo},
};

/// Lists PRs in `repo` with the requested state and page size. Konflux runs
/// keep only PRs opened by the Konflux bot.
pub async fn fetch_pull_requests<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    options: &ListOptions,
) -> Result<Vec<PullRequest>> {
    let path = format!(
        "{}?state={}&per_page={}",
        repo.pulls_path(),
        options.state.as_str(),
        options.limit
    );
    let prs: Vec<PullRequest> = get_json(client, &path)
        .await
        .with_context(|| format!("Failed to list pull requests for {repo}"))?;
    debug!(repo = %repo, count = prs.len(), "Fetched pull requests");

    if !options.konflux {
        return Ok(prs);
    }
    Ok(prs.into_iter().filter(is_konflux_author).collect())
}

/// Applies `--tekton-only` and `--migration-only`.
pub fn apply_filters(items: Vec<EnrichedPr>, options: &ListOptions) -> Vec<EnrichedPr> {
    items
        .into_iter()
        .filter(|item| !options.tekton_only || item.tekton_exclusive())
        .filter(|item| !options.migration_only || item.migration)
        .collect()
}

/// Fetches, enriches, filters and sorts the PRs of one repository.
pub async fn list_repository<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    cache: &PrDetailsCache,
    options: &ListOptions,
) -> Result<Vec<EnrichedPr>> {
    let prs = fetch_pull_requests(client, repo, options).await?;
    let enriched = enrich_pull_requests(
        client,
        repo,
        cache,
        prs,
        options.konflux,
        options.max_concurrent,
    )
    .await;

    let mut items = apply_filters(enriched, options);
    let tekton_tier = options.konflux && options.sort_key == SortKey::Priority;
    sort_items(&mut items, options.sort_key, tekton_tier);
    Ok(items)
}

/// Lists one repository, then either prints the table or runs the approval
/// session over it.
pub async fn process_repository<C, R, W>(
    client: &C,
    repo: &Repo,
    options: &ListOptions,
    input: &mut R,
    output: &mut W,
) -> Result<Option<ApprovalSummary>>
where
    C: RestClient + ?Sized,
    R: BufRead,
    W: Write,
{
    let cache = PrDetailsCache::new();
    let items = list_repository(client, repo, &cache, options).await?;

    if items.is_empty() {
        writeln!(output, "No pull requests found in {repo}.")?;
        return Ok(None);
    }

    if options.approve {
        let summary = run_approval_session(
            client,
            repo,
            &items,
            &options.approval,
            &cache,
            input,
            output,
        )
        .await?;
        return Ok(Some(summary));
    }

    write_table(
        &items,
        repo,
        options.konflux,
        options.style(),
        title_width(options.konflux),
        output,
    )?;
    writeln!(output, "\nShowing {} pull requests", items.len())?;
    Ok(None)
}

/// Processes every repository in turn. With several repositories a failing
/// one is logged and skipped; a single repository's failure is returned.
pub async fn run<C, R, W>(
    client: &C,
    repos: &[Repo],
    options: &ListOptions,
    input: &mut R,
    output: &mut W,
) -> Result<()>
where
    C: RestClient + ?Sized,
    R: BufRead,
    W: Write,
{
    if let [repo] = repos {
        process_repository(client, repo, options, input, output).await?;
        return Ok(());
    }

    for (i, repo) in repos.iter().enumerate() {
        if i > 0 {
            writeln!(output)?;
        }
        writeln!(output, "=== {repo} ===")?;
        if let Err(err) = process_repository(client, repo, options, input, output).await {
            warn!(repo = %repo, error = format!("{err:#}"), "Skipping repository");
            writeln!(output, "⚠️  Could not process {repo}: {err:#}")?;
        }
    }
    Ok(())
}
