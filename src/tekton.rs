use anyhow::{Context, Result};

use crate::{
    client::{RestClient, get_json},
    types::{PrFile, Repo},
};

const TEKTON_DIR: &str = ".tekton/";
const TEKTON_PIPELINE_SUFFIXES: &[&str] = &["-pull-request.yaml", "-push.yaml"];

/// Outcome of inspecting a PR's changed files for Tekton pipelines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TektonCheck {
    /// The PR changes Tekton pipeline definitions and nothing else.
    pub exclusive: bool,
    /// Matched pipeline files; empty unless `exclusive`.
    pub matched_files: Vec<String>,
}

/// `.tekton/...-pull-request.yaml` or `.tekton/...-push.yaml`.
pub fn is_tekton_pipeline_file(filename: &str) -> bool {
    filename.starts_with(TEKTON_DIR)
        && TEKTON_PIPELINE_SUFFIXES
            .iter()
            .any(|suffix| filename.ends_with(suffix))
}

/// Classifies an already-fetched file list.
pub fn classify_files(files: &[PrFile]) -> TektonCheck {
    let (matched, other): (Vec<&PrFile>, Vec<&PrFile>) = files
        .iter()
        .partition(|file| is_tekton_pipeline_file(&file.filename));

    if matched.is_empty() || !other.is_empty() {
        return TektonCheck::default();
    }

    TektonCheck {
        exclusive: true,
        matched_files: matched.iter().map(|file| file.filename.clone()).collect(),
    }
}

/// Fetches the PR's files and reports whether it touches only Tekton
/// pipeline definitions.
pub async fn check_tekton_files<C: RestClient + ?Sized>(
    client: &C,
    repo: &Repo,
    pr_number: u64,
) -> Result<TektonCheck> {
    let files: Vec<PrFile> = get_json(client, &repo.pull_files_path(pr_number))
        .await
        .with_context(|| format!("Failed to fetch files for PR #{pr_number}"))?;
    Ok(classify_files(&files))
}
