use std::{io::Cursor, time::Duration};

use ghprs::{
    PrDetailsCache, Repo,
    mock::{MockClient, PrBuilder, mock_pr_files, mock_reviews, setup_mock_responses},
    parse_args, run,
};

fn test_repo() -> Repo {
    Repo::new("owner", "repo").unwrap()
}

async fn render(client: &MockClient, args: &[&str]) -> String {
    let options = parse_args(args.iter().copied()).unwrap();
    let mut input = Cursor::new(Vec::new());
    let mut output = Vec::new();
    run(client, &options.repos, &options, &mut input, &mut output)
        .await
        .unwrap();
    String::from_utf8(output).unwrap()
}

#[tokio::test]
async fn test_list_renders_every_pr() {
    let client = MockClient::new();
    setup_mock_responses(&client, &test_repo());

    let out = render(&client, &["ghprs", "list", "--no-color", "owner/repo"]).await;
    assert!(out.starts_with("Legend:"));
    for n in 1..=5 {
        assert!(out.contains(&format!("#{n} ")), "missing #{n}");
    }
    assert!(out.contains("Showing 5 pull requests"));
    assert!(!out.contains("TEKTON"));
    assert!(client.posts().is_empty());
}

#[tokio::test]
async fn test_list_sorted_by_number_descending_input() {
    let client = MockClient::new();
    let repo = test_repo();
    let prs: Vec<_> = [3, 1, 2]
        .into_iter()
        .map(|n| PrBuilder::new(n).mergeable_state("clean").build())
        .collect();
    client.add_response(&repo.pulls_path(), &prs);
    client.add_response("repos/owner/repo/pulls/*/reviews", &mock_reviews(false));

    let out = render(
        &client,
        &["ghprs", "list", "--no-color", "--sort-by", "number", "owner/repo"],
    )
    .await;
    let rows: Vec<&str> = out.lines().filter(|l| l.contains(" #")).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].contains("#1 "));
    assert!(rows[1].contains("#2 "));
    assert!(rows[2].contains("#3 "));
}

#[tokio::test]
async fn test_konflux_list_with_filters() {
    let client = MockClient::new();
    let repo = test_repo();
    let bot = "red-hat-konflux[bot]";
    let prs = vec![
        PrBuilder::new(1)
            .author(bot)
            .mergeable_state("clean")
            .body("⚠️[migration] schema change")
            .build(),
        PrBuilder::new(2).author(bot).mergeable_state("behind").build(),
        PrBuilder::new(3).author("human").mergeable_state("clean").build(),
    ];
    client.add_response(&repo.pulls_path(), &prs);
    client.add_response(&repo.pull_files_path(1), &mock_pr_files(false));
    client.add_response(&repo.pull_files_path(2), &mock_pr_files(true));
    client.add_response("repos/owner/repo/pulls/*/reviews", &mock_reviews(false));

    let out = render(&client, &["ghprs", "konflux", "--no-color", "owner/repo"]).await;
    assert!(out.contains("TEKTON"));
    assert!(out.contains("Showing 2 pull requests"));
    assert!(!out.contains("#3 "));
    assert!(out.contains("open 🚨"));

    let out = render(
        &client,
        &["ghprs", "konflux", "--no-color", "--tekton-only", "owner/repo"],
    )
    .await;
    assert!(out.contains("Showing 1 pull requests"));
    let row = out.lines().find(|l| l.contains("#2 ")).unwrap();
    assert!(row.contains("🔄"));
    assert!(row.trim_end().ends_with("✅"));

    let out = render(
        &client,
        &["ghprs", "konflux", "--no-color", "--migration-only", "owner/repo"],
    )
    .await;
    assert!(out.contains("Showing 1 pull requests"));
    assert!(out.contains("#1 "));
}

#[tokio::test]
async fn test_multiple_repositories_get_headers() {
    let client = MockClient::new();
    let first = Repo::new("org", "one").unwrap();
    let second = Repo::new("org", "two").unwrap();
    client.add_response(
        &first.pulls_path(),
        &vec![PrBuilder::new(1).mergeable_state("clean").build()],
    );
    client.add_response(
        &second.pulls_path(),
        &Vec::<ghprs::PullRequest>::new(),
    );
    client.add_response("*/reviews", &mock_reviews(true));

    let out = render(&client, &["ghprs", "list", "--no-color", "org/one", "org/two"]).await;
    assert!(out.starts_with("=== org/one ===\n"));
    assert!(out.contains("\n=== org/two ===\n"));
    assert!(out.contains("No pull requests found in org/two."));
}

#[tokio::test]
async fn test_cached_lookup_is_faster_than_first_fetch() {
    let latency = Duration::from_millis(50);
    let client = MockClient::new().with_latency(latency);
    let repo = test_repo();
    let pr = PrBuilder::new(1).build();
    client.add_response(
        &repo.pull_path(1),
        &PrBuilder::new(1).mergeable_state("dirty").build(),
    );
    let cache = PrDetailsCache::new();

    let start = std::time::Instant::now();
    assert_eq!(cache.needs_rebase(&client, &repo, &pr).await, Some(true));
    let first = start.elapsed();

    let start = std::time::Instant::now();
    assert_eq!(cache.needs_rebase(&client, &repo, &pr).await, Some(true));
    assert_eq!(cache.is_blocked(&client, &repo, &pr).await, Some(false));
    let cached = start.elapsed();

    assert!(first >= latency);
    assert!(first >= cached * 2, "first {first:?}, cached {cached:?}");
    assert_eq!(client.requests().len(), 1);
}

fn row_order(out: &str, numbers: &[u64]) -> Vec<usize> {
    numbers
        .iter()
        .map(|n| out.find(&format!("#{n} ")).unwrap())
        .collect()
}

#[tokio::test]
async fn test_konflux_priority_ranks_tekton_only_after_migration() {
    let client = MockClient::new();
    let repo = test_repo();
    let bot = "red-hat-konflux[bot]";
    let prs = vec![
        PrBuilder::new(1)
            .author(bot)
            .mergeable_state("clean")
            .created_at("2023-01-03T00:00:00Z")
            .build(),
        PrBuilder::new(2)
            .author(bot)
            .mergeable_state("clean")
            .created_at("2023-01-01T00:00:00Z")
            .build(),
        PrBuilder::new(3)
            .author(bot)
            .mergeable_state("clean")
            .created_at("2023-01-02T00:00:00Z")
            .body("[migration] rename")
            .build(),
    ];
    client.add_response(&repo.pulls_path(), &prs);
    client.add_response(&repo.pull_files_path(1), &mock_pr_files(false));
    client.add_response(&repo.pull_files_path(2), &mock_pr_files(true));
    client.add_error_response(&repo.pull_files_path(3), "HTTP 500");
    client.add_response("repos/owner/repo/pulls/*/reviews", &mock_reviews(false));

    let out = render(
        &client,
        &["ghprs", "konflux", "--no-color", "--sort-by", "priority", "owner/repo"],
    )
    .await;
    let pos = row_order(&out, &[3, 2, 1]);
    assert!(pos[0] < pos[1] && pos[1] < pos[2], "{out}");
    assert_eq!(client.request_count("/files"), 3);

    // Plain priority ignores Tekton and never looks at files.
    let out = render(
        &client,
        &["ghprs", "list", "--no-color", "--sort-by", "priority", "owner/repo"],
    )
    .await;
    let pos = row_order(&out, &[3, 1, 2]);
    assert!(pos[0] < pos[1] && pos[1] < pos[2], "{out}");
    assert_eq!(client.request_count("/files"), 3);
}
