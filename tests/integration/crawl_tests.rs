//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the GitHub API and raw content host and
//! run the full crawl cycle end-to-end: search, metadata, download, storage, and
//! state persistence across runs.

use nvim_harvest::config::{Config, CrawlConfig, GitHubConfig, OutputConfig, RetryConfig, RetrySettings};
use nvim_harvest::crawler::{drive, CrawlEvent, CrawlOutcome, Crawler};
use nvim_harvest::{CrawlState, GitHubClient, HarvestError, ApiError, RepoId};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Creates a test configuration pointing every endpoint at the mock server
fn create_test_config(server: &MockServer, dir: &TempDir, queries: &[&str], max_repos: u64) -> Config {
    Config {
        github: GitHubConfig {
            api_url: server.uri(),
            raw_url: format!("{}/raw", server.uri()),
            token: None,
            user_agent: "TestHarvester/1.0".to_string(),
        },
        crawl: CrawlConfig {
            max_repos,
            min_request_interval_ms: 0,
            queries: Some(queries.iter().map(|q| q.to_string()).collect()),
            ..CrawlConfig::default()
        },
        retry: RetrySettings {
            search: fast_retry(),
            api: fast_retry(),
        },
        output: OutputConfig {
            data_dir: dir.path().join("data"),
            state_file: dir.path().join("fetch_state.json"),
            extension: "lua".to_string(),
        },
    }
}

fn create_crawler(config: &Config, state: CrawlState) -> Crawler {
    let client = GitHubClient::new(&config.github, Some("test-token")).unwrap();
    Crawler::new(Arc::new(client), config, state).unwrap()
}

fn search_body(total_count: u64, repos: &[&str]) -> serde_json::Value {
    let items: Vec<_> = repos
        .iter()
        .map(|repo| {
            json!({
                "path": "init.lua",
                "repository": { "full_name": repo, "html_url": format!("https://github.com/{}", repo) }
            })
        })
        .collect();
    json!({ "total_count": total_count, "items": items })
}

async fn mount_search(server: &MockServer, query: &str, page: u32, total_count: u64, repos: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(query_param("q", query))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(total_count, repos)))
        .mount(server)
        .await;
}

async fn mount_rate_limited(server: &MockServer, query: &str, page: u32) {
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(query_param("q", query))
        .and(query_param("page", page.to_string()))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "1700000000")
                .set_body_string("API rate limit exceeded"),
        )
        .mount(server)
        .await;
}

/// Metadata for any repository and raw content for any path
async fn mount_repositories(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/repos/[^/]+/[^/]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stargazers_count": 12,
            "default_branch": "main",
            "pushed_at": "2024-05-01T10:00:00Z"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/raw/[^/]+/[^/]+/main/init\.lua$"))
        .respond_with(ResponseTemplate::new(200).set_body_string("vim.opt.number = true\n"))
        .mount(server)
        .await;
}

fn never() -> std::future::Pending<()> {
    std::future::pending()
}

#[tokio::test]
async fn test_single_match_strategy_is_completed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_search(&server, "q1", 1, 1, &["a/b"]).await;
    mount_rate_limited(&server, "q2", 1).await;
    mount_repositories(&server).await;

    let config = create_test_config(&server, &dir, &["q1", "q2"], 2);
    let mut crawler = create_crawler(&config, CrawlState::new());
    let summary = drive(&mut crawler, &config.output.state_file, never())
        .await
        .unwrap();

    assert!(matches!(summary.outcome, CrawlOutcome::RateLimited { reset_at: Some(_) }));
    assert_eq!(summary.fetched, 1);

    let state = CrawlState::load(&config.output.state_file).unwrap();
    assert_eq!(state.total_fetched, 1);
    assert_eq!(state.completed_queries, vec!["q1"]);
    assert_eq!(state.query_index, 1);

    let artifacts = crawler.store().load_all().unwrap();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].repo.id, RepoId::new("a", "b"));
    assert_eq!(artifacts[0].repo.stars, 12);
    assert_eq!(artifacts[0].content, "vim.opt.number = true\n");
}

#[tokio::test]
async fn test_max_repos_stops_before_next_strategy() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_search(&server, "q1", 1, 1, &["a/b"]).await;
    mount_repositories(&server).await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(query_param("q", "q2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(1, &["c/d"])))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir, &["q1", "q2"], 1);
    let mut crawler = create_crawler(&config, CrawlState::new());
    let summary = drive(&mut crawler, &config.output.state_file, never())
        .await
        .unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::MaxReached);
    let state = CrawlState::load(&config.output.state_file).unwrap();
    assert_eq!(state.total_fetched, 1);
    assert_eq!(state.completed_queries, vec!["q1"]);
    assert_eq!(state.query_index, 1);
}

#[tokio::test]
async fn test_content_failure_still_completes_strategy() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_search(&server, "q1", 1, 1, &["a/b"]).await;
    mount_rate_limited(&server, "q2", 1).await;
    Mock::given(method("GET"))
        .and(path("/repos/a/b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/raw/a/b/main/init.lua"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir, &["q1", "q2"], 2);
    let mut crawler = create_crawler(&config, CrawlState::new());
    let summary = drive(&mut crawler, &config.output.state_file, never())
        .await
        .unwrap();

    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.failed, 1);

    let state = CrawlState::load(&config.output.state_file).unwrap();
    assert_eq!(state.failed_repos.len(), 1);
    assert!(state.failed_repos.contains(&RepoId::new("a", "b")));
    assert_eq!(state.total_fetched, 0);
    assert_eq!(state.completed_queries, vec!["q1"]);
    assert!(crawler.store().load_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_unusable_repo_names_do_not_abort_the_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_search(&server, "q1", 1, 3, &["a/b/c", "../escape", "ok/repo"]).await;
    mount_repositories(&server).await;

    let config = create_test_config(&server, &dir, &["q1"], 100);
    let mut crawler = create_crawler(&config, CrawlState::new());
    let summary = drive(&mut crawler, &config.output.state_file, never())
        .await
        .unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Complete);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.failed, 0);

    assert!(dir.path().join("data/ok__repo.lua").exists());
    assert!(!dir.path().join("escape.lua").exists());
    assert!(!dir.path().join("data/a__b").exists());

    let state = CrawlState::load(&config.output.state_file).unwrap();
    assert_eq!(state.completed_queries, vec!["q1"]);
    assert_eq!(state.seen_repos.len(), 1);
}

#[tokio::test]
async fn test_rate_limit_on_second_page_resumes_there() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_search(&server, "q1", 1, 150, &["a/b"]).await;
    mount_rate_limited(&server, "q1", 2).await;
    mount_repositories(&server).await;

    let config = create_test_config(&server, &dir, &["q1"], 100);
    let mut crawler = create_crawler(&config, CrawlState::new());
    let summary = drive(&mut crawler, &config.output.state_file, never())
        .await
        .unwrap();
    assert!(matches!(summary.outcome, CrawlOutcome::RateLimited { .. }));

    let state = CrawlState::load(&config.output.state_file).unwrap();
    assert_eq!(state.query_index, 0);
    assert_eq!(state.page, 2);
    assert!(state.completed_queries.is_empty());

    // The limit has lifted; page 1 must not be requested again
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(query_param("q", "q1"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(150, &["a/b"])))
        .expect(0)
        .mount(&server)
        .await;
    mount_search(&server, "q1", 2, 150, &["c/d"]).await;
    mount_repositories(&server).await;

    let mut crawler = create_crawler(&config, state);
    let mut started_at = None;
    while let Some(event) = crawler.next_event().await.unwrap() {
        match event {
            CrawlEvent::StrategyStarted { page, .. } => started_at = Some(page),
            CrawlEvent::Fetched { artifact, .. } => {
                crawler.store().save(&artifact).unwrap();
            }
            _ => {}
        }
    }

    assert_eq!(started_at, Some(2));
    let state = crawler.state();
    assert_eq!(state.total_fetched, 2);
    assert_eq!(state.completed_queries, vec!["q1"]);
    assert!(state.has_seen(&RepoId::new("c", "d")));
}

#[tokio::test]
async fn test_overlapping_strategies_fetch_each_repo_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_search(&server, "q1", 1, 2, &["a/b", "c/d"]).await;
    mount_search(&server, "q2", 1, 3, &["c/d", "e/f", "a/b"]).await;
    mount_repositories(&server).await;

    let config = create_test_config(&server, &dir, &["q1", "q2"], 100);
    let mut crawler = create_crawler(&config, CrawlState::new());
    let summary = drive(&mut crawler, &config.output.state_file, never())
        .await
        .unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Complete);
    assert_eq!(summary.fetched, 3);

    let requests = server.received_requests().await.unwrap();
    let downloads = requests
        .iter()
        .filter(|r| r.url.path().starts_with("/raw/"))
        .count();
    assert_eq!(downloads, 3);

    let state = CrawlState::load(&config.output.state_file).unwrap();
    assert_eq!(state.seen_repos.len(), 3);
    assert_eq!(state.completed_queries, vec!["q1", "q2"]);
}

async fn mount_paged_dataset(server: &MockServer) {
    mount_search(server, "q1", 1, 250, &["o/r1", "o/r2", "o/r3"]).await;
    mount_search(server, "q1", 2, 250, &["o/r3", "o/r4"]).await;
    mount_search(server, "q1", 3, 250, &["o/r5"]).await;
    mount_search(server, "q2", 1, 2, &["o/r2", "o/r6"]).await;
    mount_repositories(server).await;
}

/// Runs a fresh crawl, persisting like the driver does, and stops after `stop_after`
/// checkpoints as if the process had been killed there
///
/// Returns false when the crawl finished before reaching that checkpoint.
async fn run_until_checkpoint(config: &Config, stop_after: usize) -> bool {
    let mut crawler = create_crawler(config, CrawlState::new());
    let mut checkpoints = 0;

    while let Some(event) = crawler.next_event().await.unwrap() {
        match event {
            CrawlEvent::Fetched { artifact, .. } => {
                crawler.store().save(&artifact).unwrap();
            }
            CrawlEvent::Checkpoint => {
                crawler.state().save(&config.output.state_file).unwrap();
                checkpoints += 1;
                if checkpoints == stop_after {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

#[tokio::test]
async fn test_resume_from_any_checkpoint_matches_single_pass() {
    let server = MockServer::start().await;
    mount_paged_dataset(&server).await;
    let queries = ["q1", "q2"];

    let baseline_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &baseline_dir, &queries, 100);
    config.crawl.checkpoint_every = 2;
    let mut crawler = create_crawler(&config, CrawlState::new());
    let summary = drive(&mut crawler, &config.output.state_file, never())
        .await
        .unwrap();
    assert_eq!(summary.outcome, CrawlOutcome::Complete);
    let baseline = crawler.into_state();
    assert_eq!(baseline.total_fetched, 6);

    for stop_after in 1..20 {
        let dir = TempDir::new().unwrap();
        let mut config = create_test_config(&server, &dir, &queries, 100);
        config.crawl.checkpoint_every = 2;

        if !run_until_checkpoint(&config, stop_after).await {
            break;
        }

        let resumed = CrawlState::load(&config.output.state_file).unwrap();
        let mut crawler = create_crawler(&config, resumed);
        drive(&mut crawler, &config.output.state_file, never())
            .await
            .unwrap();

        let state = crawler.state();
        assert_eq!(
            state.total_fetched, baseline.total_fetched,
            "total differs after stopping at checkpoint {}",
            stop_after
        );
        assert_eq!(state.seen_repos, baseline.seen_repos);
        assert_eq!(state.completed_queries, baseline.completed_queries);
    }
}

#[tokio::test]
async fn test_shutdown_saves_state() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_search(&server, "q1", 1, 1, &["a/b"]).await;
    mount_repositories(&server).await;

    let config = create_test_config(&server, &dir, &["q1"], 100);
    let mut crawler = create_crawler(&config, CrawlState::new());
    let summary = drive(&mut crawler, &config.output.state_file, async {})
        .await
        .unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Interrupted);
    assert!(config.output.state_file.exists());
    assert_eq!(CrawlState::load(&config.output.state_file).unwrap(), *crawler.state());
}

#[tokio::test]
async fn test_unauthorized_search_is_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir, &["q1"], 100);
    let mut crawler = create_crawler(&config, CrawlState::new());
    let result = drive(&mut crawler, &config.output.state_file, never()).await;

    assert!(matches!(
        result,
        Err(HarvestError::Api(ApiError::Unauthorized { status: 401 }))
    ));
    // Checkpointed before the error surfaced
    let state = CrawlState::load(&config.output.state_file).unwrap();
    assert_eq!(state.query_index, 0);
    assert!(state.completed_queries.is_empty());
}

#[tokio::test]
async fn test_completed_state_searches_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(0, &[])))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir, &["q1", "q2"], 100);
    let mut state = CrawlState::new();
    state.completed_queries = vec!["q1".to_string(), "q2".to_string()];

    let mut crawler = create_crawler(&config, state);
    let summary = drive(&mut crawler, &config.output.state_file, never())
        .await
        .unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Complete);
    assert_eq!(crawler.state().query_index, 2);
    assert_eq!(crawler.state().completed_queries, vec!["q1", "q2"]);
}
