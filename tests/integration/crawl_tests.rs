//! Integration tests for the crawl and index pipeline
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! crawl → records → index → export cycle end-to-end.

use sitedex::config::{load_config, Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use sitedex::crawler::{run_crawl, NO_TITLE};
use sitedex::index::{read_export, run_index, IndexBuilder};
use sitedex::output::read_records;
use sitedex::state::PageState;
use sitedex::storage::{open_ledger, ContentStore, Ledger, RunStatus};
use sitedex::ConfigError;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration seeded at the mock server's root
fn create_test_config(base_url: &str, dir: &TempDir) -> Config {
    Config {
        seeds: vec![format!("{}/", base_url)],
        crawler: CrawlerConfig {
            max_depth: 1,
            politeness_delay_ms: 10, // Very short for testing
            request_timeout_ms: 2000,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            records_path: dir.path().join("data").join("pages.jl"),
            content_dir: dir.path().join("data").join("content"),
            database_path: dir.path().join("data").join("ledger.db"),
            index_dir: dir.path().join("data").join("index"),
            export_path: dir.path().join("data").join("search.json"),
        },
    }
}

async fn mount_page(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_end_to_end_two_documents() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        format!(
            r#"<html><head><title>Example Domain</title></head><body>
               <h1>Example Domain</h1>
               <p>This domain is for use in illustrative examples.</p>
               <a href="{}/about">More information</a>
               </body></html>"#,
            base_url
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/about",
        r#"<html><head><title>About</title></head><body>
           <p>About this site</p><a href="/deeper">Deeper</a></body></html>"#
            .to_string(),
    )
    .await;

    // Depth 2 is past max_depth and must never be requested
    Mock::given(method("GET"))
        .and(path("/deeper"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, &dir);

    let report = run_crawl(&config, "test-hash").await.unwrap();
    assert_eq!(report.records_written, 2);
    assert_eq!(report.frontier.skipped_depth, 1);

    let records = read_records(&config.output.records_path).unwrap();
    assert_eq!(records.len(), 2);
    let home = records.iter().find(|r| r.depth == 0).unwrap();
    assert_eq!(home.title, "Example Domain");
    assert!(home.body_text.contains("illustrative examples"));

    // Raw bytes are retrievable by hash
    let content = ContentStore::open(config.output.content_dir.clone()).unwrap();
    let raw = content.get(&home.content_hash).unwrap().unwrap();
    assert!(String::from_utf8(raw).unwrap().contains("<title>Example Domain</title>"));

    let index_report = run_index(&config).unwrap();
    assert_eq!(index_report.documents_indexed, 2);

    let exported = read_export(&config.output.export_path).unwrap();
    assert_eq!(exported.len(), 2);
    for doc in &exported {
        assert!(!doc.url.is_empty());
        assert!(!doc.title.is_empty());
    }

    let index = IndexBuilder::new(config.output.index_dir.clone())
        .open_committed()
        .unwrap()
        .unwrap();
    let hits = index.search("illustrative", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Example Domain");

    let ledger = open_ledger(&config.output.database_path).unwrap();
    let run = ledger.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
}

#[tokio::test]
async fn test_depth_zero_fetches_only_seeds() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<title>Home</title><a href="/about">About</a>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&base_url, &dir);
    config.crawler.max_depth = 0;

    let report = run_crawl(&config, "h").await.unwrap();
    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.records_written, 1);
}

#[tokio::test]
async fn test_timeout_is_isolated_to_one_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<title>Home</title><a href="/slow">Slow</a><a href="/fast">Fast</a>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<title>Slow</title>")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/fast", "<title>Fast</title>".to_string()).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&base_url, &dir);
    config.crawler.request_timeout_ms = 500;
    config.crawler.max_concurrent_fetches = 2;

    let report = run_crawl(&config, "h").await.unwrap();
    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.records_written, 2);
    assert_eq!(report.pages_failed, 1);

    let ledger = open_ledger(&config.output.database_path).unwrap();
    let slow = ledger
        .get_page(report.run_id, &format!("{}/slow", base_url))
        .unwrap()
        .unwrap();
    assert_eq!(slow.outcome.state, PageState::Unreachable);

    let titles: Vec<String> = read_records(&config.output.records_path)
        .unwrap()
        .into_iter()
        .map(|r| r.title)
        .collect();
    assert!(titles.contains(&"Fast".to_string()));
    assert!(!titles.contains(&"Slow".to_string()));
}

#[tokio::test]
async fn test_reindex_replaces_previous_corpus() {
    let dir = TempDir::new().unwrap();

    let first_site = MockServer::start().await;
    mount_page(
        &first_site,
        "/",
        r#"<title>Old home</title><a href="/retired">Retired</a>"#.to_string(),
    )
    .await;
    mount_page(&first_site, "/retired", "<title>Retired</title>".to_string()).await;

    let mut config = create_test_config(&first_site.uri(), &dir);
    run_crawl(&config, "h").await.unwrap();
    assert_eq!(run_index(&config).unwrap().documents_indexed, 2);

    let second_site = MockServer::start().await;
    mount_page(&second_site, "/", "<title>New home</title>".to_string()).await;

    config.seeds = vec![format!("{}/", second_site.uri())];
    run_crawl(&config, "h").await.unwrap();
    let report = run_index(&config).unwrap();
    assert_eq!(report.documents_indexed, 1);

    let exported = read_export(&config.output.export_path).unwrap();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].title, "New home");

    let index = IndexBuilder::new(config.output.index_dir.clone())
        .open_committed()
        .unwrap()
        .unwrap();
    assert!(index.search("retired", 10).unwrap().is_empty());
}

#[tokio::test]
async fn test_page_without_title_uses_sentinel() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        "<html><body><p>No heading here</p></body></html>".to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);
    run_crawl(&config, "h").await.unwrap();

    let records = read_records(&config.output.records_path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, NO_TITLE);
    assert_eq!(records[0].body_text, "No heading here");
}

#[tokio::test]
async fn test_robots_txt_is_ignored_by_default() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/", "<title>Home</title>".to_string()).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    let report = run_crawl(&config, "h").await.unwrap();
    assert_eq!(report.records_written, 1);
}

#[tokio::test]
async fn test_other_hosts_are_not_followed() {
    let mock_server = MockServer::start().await;
    let other_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&other_server)
        .await;

    // Another name for the loopback interface, so a different host
    let other = url::Url::parse(&other_server.uri()).unwrap();
    let foreign = format!("http://localhost:{}/", other.port().unwrap());
    mount_page(
        &mock_server,
        "/",
        format!(r#"<title>Home</title><a href="{}">Elsewhere</a>"#, foreign),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    let report = run_crawl(&config, "h").await.unwrap();
    assert_eq!(report.pages_visited, 1);

    let records = read_records(&config.output.records_path).unwrap();
    assert_eq!(records[0].links, vec![foreign]);
}

#[test]
fn test_empty_seed_list_cannot_start() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("sitedex.toml");
    std::fs::write(
        &config_path,
        r#"
seeds = []

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
records-path = "data/pages.jl"
content-dir = "data/content"
database-path = "data/ledger.db"
index-dir = "data/index"
export-path = "data/search.json"
"#,
    )
    .unwrap();

    let result = load_config(&config_path);
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}
