//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether_crawl::config::{CrawlerConfig, StorageBackend, StorageConfig, UserAgentConfig};
use tether_crawl::crawler::{build_http_client, StopReason};
use tether_crawl::storage::{
    open_store, FrontierCounts, Partition, SqliteFrontierStore, StoreError, StoreResult,
};
use tether_crawl::{
    CrawlManager, CrawlProject, CrawlService, CrawlState, CrawlStatus, FrontierStore,
    ProjectRequest, StartOutcome,
};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "127.0.0.1";

fn test_settings() -> CrawlerConfig {
    CrawlerConfig {
        thread_count: 2,
        crawl_limit: 100,
        fetch_timeout_secs: 5,
        robots_timeout_secs: 5,
        dequeue_wait_ms: 50,
    }
}

fn test_user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn memory_store() -> Arc<dyn FrontierStore> {
    Arc::new(SqliteFrontierStore::new_in_memory().expect("Failed to open store"))
}

fn create_manager(
    seed: &str,
    thread_count: usize,
    crawl_limit: usize,
    store: Arc<dyn FrontierStore>,
) -> CrawlManager {
    let project = CrawlProject::new(&ProjectRequest::new(seed, thread_count, crawl_limit))
        .expect("Failed to create project");
    let client = build_http_client(&test_user_agent()).expect("Failed to build client");
    CrawlManager::new(project, &test_settings(), store, client)
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(html(body))
        .mount(server)
        .await;
}

async fn wait_for_stop(manager: &CrawlManager) -> CrawlStatus {
    tokio::time::timeout(Duration::from_secs(20), manager.wait_until_stopped())
        .await
        .expect("Crawl did not stop in time");
    manager.status()
}

fn url(base: &str, page_path: &str) -> String {
    format!("{}{}", base, page_path)
}

#[tokio::test]
async fn test_full_crawl_single_host() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&mock_server)
        .await;

    mount_page(
        &mock_server,
        "/",
        &format!(
            r##"<a href="{0}/page1">1</a>
                <a href="{0}/page1#section">1 again</a>
                <a href="/page2">2</a>
                <a href="#top">top</a>
                <a href="https://other.example/x">off-site</a>
                <a href="mailto:someone@example.com">mail</a>"##,
            base_url
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/page1",
        r#"<a href="/">home</a><a href="/page2">2</a>"#,
    )
    .await;
    mount_page(&mock_server, "/page2", "No links here").await;

    let store = memory_store();
    let manager = create_manager(&url(&base_url, "/"), 2, 100, Arc::clone(&store));

    let outcome = manager.start().await.expect("Failed to start crawl");
    assert!(matches!(outcome, StartOutcome::Started { queued: 1, .. }));

    let status = wait_for_stop(&manager).await;
    assert_eq!(status.state, CrawlState::Stopped);
    assert_eq!(status.stop_reason, Some(StopReason::FrontierExhausted));
    assert!(!status.running);
    assert_eq!(status.live_workers, 0);
    assert!(status.finished_at.is_some());

    let visited = store.visited(PROJECT).unwrap();
    let expected: BTreeSet<String> = ["/", "/page1", "/page2"]
        .iter()
        .map(|p| url(&base_url, p))
        .collect();
    assert_eq!(visited, expected);
    assert!(store.pending(PROJECT).unwrap().is_empty());
}

#[tokio::test]
async fn test_robots_disallowed_links_never_fetched() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .mount(&mock_server)
        .await;

    mount_page(
        &mock_server,
        "/",
        r#"<a href="/private/a">secret</a><a href="/public">public</a>"#,
    )
    .await;
    mount_page(&mock_server, "/public", "Public page").await;

    Mock::given(method("GET"))
        .and(path_regex("^/private"))
        .respond_with(html("Should not be fetched"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = memory_store();
    let manager = create_manager(&url(&base_url, "/"), 2, 100, Arc::clone(&store));
    manager.start().await.unwrap();
    let status = wait_for_stop(&manager).await;

    assert_eq!(status.visited_count, 2);
    assert!(store
        .contains(PROJECT, Partition::Visited, &url(&base_url, "/public"))
        .unwrap());
    assert!(!store.is_known(PROJECT, &url(&base_url, "/private/a")).unwrap());
}

#[tokio::test]
async fn test_crawl_limit_stops_and_keeps_pending() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let links: String = (1..=5)
        .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
        .collect();
    mount_page(&mock_server, "/", &links).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/p\d$"))
        .respond_with(html("Leaf"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = memory_store();
    let manager = create_manager(&url(&base_url, "/"), 2, 1, Arc::clone(&store));
    manager.start().await.unwrap();
    let status = wait_for_stop(&manager).await;

    assert_eq!(status.stop_reason, Some(StopReason::LimitReached));
    assert_eq!(status.visited_count, 1);
    assert_eq!(status.pending_count, 5);
    assert_eq!(status.queued_count, 0);
}

#[tokio::test]
async fn test_fetch_failures_still_marked_visited() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<a href="/missing">404</a><a href="/broken">500</a><a href="/doc.pdf">pdf</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/doc.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"<a href="/hidden">x</a>"#, "application/pdf"),
        )
        .mount(&mock_server)
        .await;

    let store = memory_store();
    let manager = create_manager(&url(&base_url, "/"), 3, 100, Arc::clone(&store));
    manager.start().await.unwrap();
    let status = wait_for_stop(&manager).await;

    assert_eq!(status.stop_reason, Some(StopReason::FrontierExhausted));
    assert_eq!(status.visited_count, 4);
    assert_eq!(status.pending_count, 0);
    assert!(!store.is_known(PROJECT, &url(&base_url, "/hidden")).unwrap());
}

#[tokio::test]
async fn test_relative_links_resolve_against_redirect_target() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<a href="/old">old</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new/"))
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/new/", r#"<a href="child">child</a>"#).await;
    mount_page(&mock_server, "/new/child", "Leaf").await;

    let store = memory_store();
    let manager = create_manager(&url(&base_url, "/"), 1, 100, Arc::clone(&store));
    manager.start().await.unwrap();
    wait_for_stop(&manager).await;

    let visited = store.visited(PROJECT).unwrap();
    assert!(visited.contains(&url(&base_url, "/old")));
    assert!(visited.contains(&url(&base_url, "/new/child")));
}

#[tokio::test]
async fn test_stop_requeues_and_resume_finishes() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let links: String = (1..=20)
        .map(|i| format!(r#"<a href="/page/{}">{}</a>"#, i, i))
        .collect();
    mount_page(&mock_server, "/", &links).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/page/\d+$"))
        .respond_with(html("Slow leaf").set_delay(Duration::from_millis(200)))
        .expect(20)
        .mount(&mock_server)
        .await;

    let store = memory_store();
    let manager = create_manager(&url(&base_url, "/"), 2, 100, Arc::clone(&store));
    manager.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    let stopped = manager.stop().await.expect("Failed to stop crawl");

    assert_eq!(stopped.state, CrawlState::Stopped);
    assert_eq!(stopped.stop_reason, Some(StopReason::Requested));
    assert_eq!(stopped.live_workers, 0);
    assert_eq!(stopped.queued_count, 0);
    assert!(stopped.visited_count < 21);
    assert_eq!(stopped.visited_count + stopped.pending_count, 21);

    // Stopping again changes nothing
    let again = manager.stop().await.unwrap();
    assert_eq!(again.visited_count, stopped.visited_count);

    let outcome = manager.start().await.unwrap();
    assert!(matches!(
        outcome,
        StartOutcome::Started { queued, .. } if queued == stopped.pending_count
    ));

    let finished = wait_for_stop(&manager).await;
    assert_eq!(finished.stop_reason, Some(StopReason::FrontierExhausted));
    assert_eq!(finished.visited_count, 21);
    assert_eq!(finished.pending_count, 0);
}

#[tokio::test]
async fn test_restart_after_exhaustion_is_noop() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/a">a</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html("Leaf"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = memory_store();
    let manager = create_manager(&url(&base_url, "/"), 2, 100, Arc::clone(&store));
    manager.start().await.unwrap();
    wait_for_stop(&manager).await;

    let outcome = manager.start().await.unwrap();
    assert!(matches!(outcome, StartOutcome::Started { queued: 0, .. }));

    let status = wait_for_stop(&manager).await;
    assert_eq!(status.visited_count, 2);
    assert_eq!(status.pending_count, 0);
}

#[tokio::test]
async fn test_second_start_reports_already_running() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("Slow").set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let manager = create_manager(&url(&base_url, "/"), 1, 100, memory_store());
    manager.start().await.unwrap();

    let second = manager.start().await.unwrap();
    assert_eq!(
        second,
        StartOutcome::AlreadyRunning {
            project: PROJECT.to_string()
        }
    );
    assert!(manager.status().running);

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_resume_from_file_store() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let links: String = (1..=4)
        .map(|i| format!(r#"<a href="/leaf{}">{}</a>"#, i, i))
        .collect();
    mount_page(&mock_server, "/", &links).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/leaf\d$"))
        .respond_with(html("Leaf"))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = StorageConfig {
        backend: StorageBackend::File,
        path: dir.path().to_string_lossy().into_owned(),
    };

    // First process: crawl limit of 2 leaves three leaves pending on disk
    {
        let store = open_store(&storage).unwrap();
        let manager = create_manager(&url(&base_url, "/"), 2, 2, store);
        manager.start().await.unwrap();
        let status = wait_for_stop(&manager).await;
        assert_eq!(status.visited_count, 2);
        assert_eq!(status.pending_count, 3);
    }

    // Second process: a fresh store instance picks up where the first stopped
    let store = open_store(&storage).unwrap();
    let manager = create_manager(&url(&base_url, "/"), 2, 100, Arc::clone(&store));
    let outcome = manager.start().await.unwrap();
    assert!(matches!(outcome, StartOutcome::Started { queued: 3, .. }));

    let status = wait_for_stop(&manager).await;
    assert_eq!(status.visited_count, 5);
    assert_eq!(status.pending_count, 0);

    let visited_file = std::fs::read_to_string(dir.path().join(PROJECT).join("visited.txt")).unwrap();
    assert_eq!(visited_file.lines().count(), 5);
}

#[tokio::test]
async fn test_service_start_status_stop() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<a href="/a">a</a>"#).await;
    mount_page(&mock_server, "/a", "Leaf").await;

    let client = build_http_client(&test_user_agent()).unwrap();
    let service = CrawlService::new(test_settings(), memory_store(), client);

    let outcome = service
        .start(&ProjectRequest::new(url(&base_url, "/"), 2, 100))
        .await
        .unwrap();
    assert!(matches!(outcome, StartOutcome::Started { ref project, .. } if project == PROJECT));

    tokio::time::timeout(Duration::from_secs(20), service.wait_all())
        .await
        .expect("Crawl did not stop in time");

    let status = service.status(PROJECT).await.expect("Project not registered");
    assert_eq!(status.visited_count, 2);
    assert!(!status.running);

    let stopped = service.stop(PROJECT).await.unwrap().unwrap();
    assert_eq!(stopped.state, CrawlState::Stopped);
    assert_eq!(service.statuses().await.len(), 1);
}

/// Store whose `mark_visited` fails a fixed number of times for URLs with a given suffix
struct FailingStore {
    inner: SqliteFrontierStore,
    suffix: &'static str,
    failures_left: AtomicUsize,
    failures_injected: AtomicUsize,
}

impl FailingStore {
    fn new(suffix: &'static str, failures: usize) -> Self {
        Self {
            inner: SqliteFrontierStore::new_in_memory().unwrap(),
            suffix,
            failures_left: AtomicUsize::new(failures),
            failures_injected: AtomicUsize::new(0),
        }
    }
}

impl FrontierStore for FailingStore {
    fn seed_if_empty(&self, project: &str, seed_url: &str) -> StoreResult<bool> {
        self.inner.seed_if_empty(project, seed_url)
    }

    fn pending(&self, project: &str) -> StoreResult<BTreeSet<String>> {
        self.inner.pending(project)
    }

    fn visited(&self, project: &str) -> StoreResult<BTreeSet<String>> {
        self.inner.visited(project)
    }

    fn partition_of(&self, project: &str, url: &str) -> StoreResult<Option<Partition>> {
        self.inner.partition_of(project, url)
    }

    fn mark_visited(&self, project: &str, url: &str) -> StoreResult<bool> {
        if url.ends_with(self.suffix)
            && self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            self.failures_injected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Corrupt("disk unavailable".to_string()));
        }
        self.inner.mark_visited(project, url)
    }

    fn enqueue(&self, project: &str, url: &str) -> StoreResult<bool> {
        self.inner.enqueue(project, url)
    }

    fn requeue(&self, project: &str, urls: &[String]) -> StoreResult<usize> {
        self.inner.requeue(project, urls)
    }

    fn counts(&self, project: &str) -> StoreResult<FrontierCounts> {
        self.inner.counts(project)
    }

    fn clear(&self, project: &str) -> StoreResult<()> {
        self.inner.clear(project)
    }
}

#[tokio::test]
async fn test_store_failure_retries_url_and_releases_budget() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<a href="/a">a</a>"#).await;
    mount_page(&mock_server, "/a", "Leaf").await;

    let failing = Arc::new(FailingStore::new("/a", 2));
    let store: Arc<dyn FrontierStore> = failing.clone();

    // A limit of 2 only fits both pages if failed attempts give their slot back
    let manager = create_manager(&url(&base_url, "/"), 2, 2, Arc::clone(&store));
    manager.start().await.unwrap();
    let status = wait_for_stop(&manager).await;

    assert_eq!(failing.failures_injected.load(Ordering::SeqCst), 2);
    assert_eq!(status.stop_reason, Some(StopReason::FrontierExhausted));
    assert_eq!(status.visited_count, 2);
    assert!(status.visited_count <= 2);
    assert_eq!(status.pending_count, 0);

    let visited = store.visited(PROJECT).unwrap();
    assert_eq!(
        visited.iter().filter(|u| u.as_str() == url(&base_url, "/a")).count(),
        1
    );
}

#[tokio::test]
async fn test_query_links_fetched_as_written() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<a href="/search?q=1">search</a>"#).await;
    mount_page(&mock_server, "/search", r#"<a href="/found">result</a>"#).await;
    mount_page(&mock_server, "/found", "Found").await;

    let store = memory_store();
    let manager = create_manager(&url(&base_url, "/"), 1, 100, Arc::clone(&store));
    manager.start().await.unwrap();
    wait_for_stop(&manager).await;

    let visited = store.visited(PROJECT).unwrap();
    assert!(visited.contains(&url(&base_url, "/search?q=1")));
    assert!(visited.contains(&url(&base_url, "/found")));
    assert!(!visited.contains(&url(&base_url, "/search/?q=1")));

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/search/"));
}

#[tokio::test]
async fn test_query_links_still_checked_against_robots() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /search/"),
        )
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/", r#"<a href="/search?q=1">search</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(html("Blocked"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = memory_store();
    let manager = create_manager(&url(&base_url, "/"), 1, 100, Arc::clone(&store));
    manager.start().await.unwrap();
    let status = wait_for_stop(&manager).await;

    assert_eq!(status.visited_count, 1);
    assert!(!store.is_known(PROJECT, &url(&base_url, "/search?q=1")).unwrap());
}
