//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! crawl cycle end-to-end through the reqwest transport and real sinks.

use quote_crawler::config::{
    parse_config, Config, FollowLinkPolicy, OutputConfig, OutputFormat, SchedulingMode, StartUrls,
};
use quote_crawler::crawler::run_crawl;
use quote_crawler::output::SqliteSink;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a listing page linking to the given author ids
fn listing_html(author_ids: &[u32]) -> String {
    let links: String = author_ids
        .iter()
        .map(|id| format!(r#"<a href="/author/{id}-Author_{id}">Author {id}</a>"#))
        .collect();
    format!("<html><body><h1>Authors</h1>{}</body></html>", links)
}

/// Builds an author page with `quotes` quote blocks and an optional next link
fn detail_html(author: u32, quotes: u32, next: Option<&str>) -> String {
    let blocks: String = (0..quotes)
        .map(|n| {
            format!(
                r#"<li><div class="wrap-block">
                    <p><a class="title" href="/quote/{author}{n}">Quote number {n} written by author {author}.</a></p>
                    <div class="author"><a href="/author/{author}-Author_{author}">Author {author}</a></div>
                    <div class="mytags"><a href="/tag/life">Life</a></div>
                    <a class="heart24">{n}</a>
                </div></li>"#
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<a href="{}">Next</a>"#, href))
        .unwrap_or_default();
    format!(
        r#"<html><body><ul class="list-quotes">{}</ul>{}</body></html>"#,
        blocks, next
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

/// Creates a fast test configuration seeded with one URL on the mock server
fn create_test_config(server: &MockServer, seed_path: &str, output: OutputConfig) -> Config {
    let mut config = Config::default();
    config.seeds.start_urls = StartUrls::List(vec![format!("{}{}", server.uri(), seed_path)]);
    config.seeds.base_url = server.uri();
    config.fetch.max_attempts = 2;
    config.fetch.attempt_timeout_ms = 2_000;
    config.fetch.backoff_base_ms = 0;
    config.fetch.backoff_cap_ms = 0;
    config.fetch.min_delay_ms = 0;
    config.fetch.max_delay_ms = 0;
    config.output = output;
    config
}

fn sqlite_output(dir: &TempDir) -> OutputConfig {
    OutputConfig {
        format: OutputFormat::Sqlite,
        path: dir.path().join("quotes.db").to_string_lossy().into_owned(),
    }
}

fn json_lines_output(dir: &TempDir) -> OutputConfig {
    OutputConfig {
        format: OutputFormat::JsonLines,
        path: dir.path().join("quotes.jsonl").to_string_lossy().into_owned(),
    }
}

/// Mounts one listing page and three author pages with two quotes each
async fn mount_simple_site(server: &MockServer, third_expected: Option<u64>) {
    Mock::given(method("GET"))
        .and(path("/quotes/authors/a/"))
        .respond_with(html(listing_html(&[1, 2, 3])))
        .expect(1)
        .mount(server)
        .await;

    for id in [1, 2] {
        Mock::given(method("GET"))
            .and(path(format!("/author/{id}-Author_{id}")))
            .respond_with(html(detail_html(id, 2, None)))
            .expect(1)
            .mount(server)
            .await;
    }

    let third = Mock::given(method("GET"))
        .and(path("/author/3-Author_3"))
        .respond_with(html(detail_html(3, 2, None)));
    let third = match third_expected {
        Some(n) => third.expect(n),
        None => third,
    };
    third.mount(server).await;
}

#[tokio::test]
async fn test_sequential_crawl_fills_quota_into_sqlite() {
    let server = MockServer::start().await;
    mount_simple_site(&server, Some(0)).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, "/quotes/authors/a/", sqlite_output(&dir));
    config.crawl.results_wanted = 4;

    let summary = run_crawl(config.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.saved, 4);
    assert_eq!(summary.pages_fetched, 3);
    assert!(!summary.cancelled);

    let sink = SqliteSink::new(std::path::Path::new(&config.output.path)).unwrap();
    assert_eq!(sink.count().unwrap(), 4);

    let records = sink.load_records().unwrap();
    assert_eq!(records[0].attribution_name, "Author 1");
    assert_eq!(records[0].tags, Some(vec!["Life".to_string()]));
    assert!(records[0].source_url.ends_with("/quote/10"));
    assert!(records[0].attribution_url.ends_with("/author/1-Author_1"));
}

#[tokio::test]
async fn test_pool_crawl_never_exceeds_quota() {
    let server = MockServer::start().await;
    mount_simple_site(&server, None).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, "/quotes/authors/a/", json_lines_output(&dir));
    config.crawl.results_wanted = 4;
    config.crawl.mode = SchedulingMode::Pool;
    config.crawl.workers = 3;
    config.crawl.follow_link_policy = FollowLinkPolicy::Unbounded;

    let summary = run_crawl(config.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.saved, 4);

    let content = std::fs::read_to_string(&config.output.path).unwrap();
    assert_eq!(content.lines().count(), 4);
    for line in content.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["quote"].as_str().unwrap().starts_with("Quote number"));
        assert!(value["author_url"].is_string());
        assert!(value["source"].is_string());
    }
}

#[tokio::test]
async fn test_failing_branch_is_isolated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/quotes/authors/a/"))
        .respond_with(html(listing_html(&[1, 2, 3])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/author/1-Author_1"))
        .respond_with(html(detail_html(1, 2, None)))
        .mount(&server)
        .await;

    // Two attempts, then the task is dropped for good
    Mock::given(method("GET"))
        .and(path("/author/2-Author_2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/author/3-Author_3"))
        .respond_with(html(detail_html(3, 2, None)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, "/quotes/authors/a/", sqlite_output(&dir));

    let summary = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.saved, 4);
    assert_eq!(summary.fetch_failures, 1);
    assert_eq!(summary.pages_fetched, 3);
}

#[tokio::test]
async fn test_pagination_stops_at_max_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/author/1-Author_1"))
        .and(query_param("p", "1"))
        .respond_with(html(detail_html(1, 2, Some("/author/1-Author_1?p=2"))))
        .expect(1)
        .mount(&server)
        .await;

    // Page 2 has no quotes but keeps advertising a next page
    Mock::given(method("GET"))
        .and(path("/author/1-Author_1"))
        .and(query_param("p", "2"))
        .respond_with(html(detail_html(1, 0, Some("/author/1-Author_1?p=3"))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/author/1-Author_1"))
        .and(query_param("p", "3"))
        .respond_with(html(detail_html(1, 0, Some("/author/1-Author_1?p=4"))))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, "/author/1-Author_1?p=1", sqlite_output(&dir));
    config.crawl.max_pages = 2;

    let summary = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.saved, 2);
}

#[tokio::test]
async fn test_frontier_capacity_drops_overflow() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/quotes/authors/a/"))
        .respond_with(html(listing_html(&[1, 2, 3, 4])))
        .mount(&server)
        .await;

    for id in [1, 2] {
        Mock::given(method("GET"))
            .and(path(format!("/author/{id}-Author_{id}")))
            .respond_with(html(detail_html(id, 1, None)))
            .expect(1)
            .mount(&server)
            .await;
    }

    for id in [3, 4] {
        Mock::given(method("GET"))
            .and(path(format!("/author/{id}-Author_{id}")))
            .respond_with(html(detail_html(id, 1, None)))
            .expect(0)
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, "/quotes/authors/a/", sqlite_output(&dir));
    config.crawl.frontier_capacity = 2;

    let summary = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.tasks_dropped, 2);
    assert_eq!(summary.saved, 2);
}

#[tokio::test]
async fn test_unreachable_proxy_falls_back_to_direct() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/author/1-Author_1"))
        .respond_with(html(detail_html(1, 3, None)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, "/author/1-Author_1", sqlite_output(&dir));
    config.proxy.urls = vec!["http://127.0.0.1:9".to_string()];

    let summary = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.saved, 3);
    assert_eq!(summary.fetch_failures, 0);
}

#[tokio::test]
async fn test_deadline_stops_after_current_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/quotes/authors/a/"))
        .respond_with(html(listing_html(&[1, 2])).set_delay(Duration::from_millis(1_500)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/author/1-Author_1"))
        .respond_with(html(detail_html(1, 2, None)))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, "/quotes/authors/a/", sqlite_output(&dir));
    config.crawl.deadline_secs = Some(1);
    config.fetch.attempt_timeout_ms = 5_000;

    let summary = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.saved, 0);
}

#[tokio::test]
async fn test_crawl_from_toml_config() {
    let server = MockServer::start().await;
    mount_simple_site(&server, None).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("quotes.jsonl");
    let toml = format!(
        r#"
        [crawl]
        results-wanted = 10
        mode = "pool"
        workers = 2

        [seeds]
        start-urls = "{uri}/quotes/authors/a/"
        base-url = "{uri}"

        [fetch]
        max-attempts = 1
        min-delay-ms = 0
        max-delay-ms = 0
        backoff-base-ms = 0
        backoff-cap-ms = 0

        [output]
        format = "json-lines"
        path = "{path}"
        "#,
        uri = server.uri(),
        path = output.to_string_lossy().replace('\\', "/"),
    );

    let config = parse_config(&toml).unwrap();
    let summary = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.saved, 6);
    assert!(!summary.quota_met());
    assert_eq!(std::fs::read_to_string(&output).unwrap().lines().count(), 6);
}

#[tokio::test]
async fn test_invalid_config_fails_before_crawling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(listing_html(&[1])))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, "/quotes/authors/a/", sqlite_output(&dir));
    config.crawl.results_wanted = 0;

    let result = run_crawl(config, CancellationToken::new()).await;
    assert!(matches!(result, Err(quote_crawler::CrawlError::Config(_))));
}
