//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_crawl::config::Config;
use strata_crawl::crawler::{
    CheckpointError, CheckpointManager, Classifier, CrawlState, Orchestrator, TerminalState,
};
use strata_crawl::state::{Classification, UrlStatus};
use strata_crawl::storage::{
    LinkRecord, NewUrlRecord, PageResult, PageStore, RunRecord, RunStatus, SqliteStore,
    StoreError, StoreResult, UrlRecord,
};
use strata_crawl::url::normalize_str;
use strata_crawl::CrawlError;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `seed` with data under `dir`
fn create_test_config(seed: &str, max_depth: u32, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.crawler.seed_url = Some(seed.to_string());
    config.crawler.max_depth = max_depth;
    config.crawler.workers = 4;
    config.crawler.shutdown_grace_ms = 500;
    config.fetch.user_agent = "strata-crawl-test/0.1".to_string();
    config.fetch.request_timeout_ms = 2000;
    config.storage.database_path = dir.path().join("crawl.db").display().to_string();
    config.storage.checkpoint_dir = dir.path().join("checkpoints").display().to_string();
    config
}

/// HTML page with the given title, body text and links
fn html_page(title: &str, text: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{}\">{}</a>\n", href, href))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><p>{}</p>\n{}</body></html>",
        title, text, anchors
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

fn abs(server: &MockServer, route: &str) -> String {
    normalize_str(&format!("{}{}", server.uri(), route)).unwrap()
}

/// (url, depth, status, topic) of every record, sorted by URL
fn record_summary(records: Vec<UrlRecord>) -> Vec<(String, u32, UrlStatus, Option<String>)> {
    let mut summary: Vec<_> = records
        .into_iter()
        .map(|r| (r.url, r.depth, r.status, r.topic))
        .collect();
    summary.sort_by(|a, b| a.0.cmp(&b.0));
    summary
}

async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

fn open_store(dir: &TempDir) -> SqliteStore {
    SqliteStore::open(&dir.path().join("crawl.db")).unwrap()
}

/// Seed linking to /a and /b, each with one further link
async fn two_level_site() -> MockServer {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html_page("Home", "welcome", &["/a", "/b"]),
    )
    .await;
    mount_page(&server, "/a", html_page("A", "page a", &["/c"])).await;
    mount_page(&server, "/b", html_page("B", "page b", &["/d"])).await;
    mount_page(&server, "/c", html_page("C", "page c", &[])).await;
    mount_page(&server, "/d", html_page("D", "page d", &[])).await;
    server
}

#[tokio::test]
async fn test_crawl_to_max_depth_one() {
    let server = two_level_site().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), 1, &dir);

    let mut orchestrator = Orchestrator::new(config, false).await.unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.terminal, TerminalState::MaxDepthReached);
    assert_eq!(report.pages_done, 3);
    assert_eq!(report.pages_failed, 0);

    let store = open_store(&dir);
    let records = record_summary(store.all_records().unwrap());
    let depths: Vec<(String, u32, UrlStatus)> = records
        .iter()
        .map(|(url, depth, status, _)| (url.clone(), *depth, *status))
        .collect();
    assert_eq!(
        depths,
        vec![
            (abs(&server, "/"), 0, UrlStatus::Done),
            (abs(&server, "/a"), 1, UrlStatus::Done),
            (abs(&server, "/b"), 1, UrlStatus::Done),
        ]
    );

    // Links beyond the max depth are recorded as edges but never fetched
    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert!(!requested.contains(&"/c".to_string()));
    assert_eq!(store.get_outgoing_links(&abs(&server, "/a")).unwrap().len(), 1);

    let run = store.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.outcome.as_deref(), Some("max-depth-reached"));
}

#[tokio::test]
async fn test_seed_timeout_exhausts_frontier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page("Slow", "slow", &["/a"]), "text/html")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), 2, &dir);
    config.fetch.request_timeout_ms = 200;

    let mut orchestrator = Orchestrator::new(config, false).await.unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.terminal, TerminalState::FrontierExhausted);
    assert_eq!(report.pages_failed, 1);

    let store = open_store(&dir);
    let records = store.all_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, UrlStatus::Failed);
    assert!(records[0].error_message.is_some());
    assert_eq!(store.count_links().unwrap(), 0);
}

#[tokio::test]
async fn test_shared_link_recorded_once() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", "home", &["/a", "/b"])).await;
    mount_page(&server, "/a", html_page("A", "a", &["/shared", "/a"])).await;
    mount_page(&server, "/b", html_page("B", "b", &["/shared#section", "/shared"])).await;
    Mock::given(method("GET"))
        .and(path("/shared"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(html_page("S", "shared", &[]), "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), 2, &dir);
    let report = Orchestrator::new(config, false)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.pages_done, 4);

    let store = open_store(&dir);
    let shared = store.get_record(&abs(&server, "/shared")).unwrap().unwrap();
    assert_eq!(shared.depth, 2);
    assert_eq!(shared.discovered_from.as_deref(), Some(abs(&server, "/a").as_str()));
    assert_eq!(store.records_at_depth(report.run_id, 2, &UrlStatus::all()).unwrap().len(), 1);
    assert_eq!(store.count_total().unwrap(), 4);
}

#[tokio::test]
async fn test_levels_fetched_in_order() {
    let server = two_level_site().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), 2, &dir);

    let report = Orchestrator::new(config, false)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.pages_done, 5);
    assert_eq!(report.depth_reached, 2);

    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    let position = |route: &str| requested.iter().position(|p| p == route).unwrap();

    assert_eq!(position("/"), 0);
    for shallow in ["/a", "/b"] {
        for deep in ["/c", "/d"] {
            assert!(position(shallow) < position(deep));
        }
    }
}

#[tokio::test]
async fn test_resume_matches_uninterrupted_crawl() {
    let server = two_level_site().await;

    let reference_dir = TempDir::new().unwrap();
    Orchestrator::new(create_test_config(&server.uri(), 2, &reference_dir), false)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    let expected = record_summary(open_store(&reference_dir).all_records().unwrap());

    // Crash right after the first level has drained
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), 2, &dir);
    let first_run = {
        let mut orchestrator = Orchestrator::new(config.clone(), false).await.unwrap();
        while orchestrator.step().await.unwrap() != CrawlState::LevelAdvancing {}
        assert_eq!(orchestrator.frontier().next_len(), 2);
        orchestrator.run_id()
    };

    let mut resumed = Orchestrator::new(config, false).await.unwrap();
    assert_eq!(resumed.run_id(), first_run);
    let report = resumed.run().await.unwrap();

    assert_eq!(report.terminal, TerminalState::MaxDepthReached);
    assert_eq!(report.pages_done, 4, "the seed must not be fetched again");
    assert_eq!(
        record_summary(open_store(&dir).all_records().unwrap()),
        expected
    );
}

#[tokio::test]
async fn test_interrupt_then_resume() {
    let server = two_level_site().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), 1, &dir);

    let mut orchestrator = Orchestrator::new(config.clone(), false).await.unwrap();
    assert_eq!(orchestrator.step().await.unwrap(), CrawlState::LevelActive);
    orchestrator.shutdown_token().cancel();
    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.terminal, TerminalState::Interrupted);
    drop(orchestrator);

    {
        let store = open_store(&dir);
        let run = store.get_run(report.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Interrupted);
        let seed = store.get_record(&abs(&server, "/")).unwrap().unwrap();
        assert_eq!(seed.status, UrlStatus::Pending);
    }

    let mut resumed = Orchestrator::new(config, false).await.unwrap();
    assert_eq!(resumed.run_id(), report.run_id);
    let finished = resumed.run().await.unwrap();

    assert_eq!(finished.terminal, TerminalState::MaxDepthReached);
    let store = open_store(&dir);
    assert_eq!(store.count_by_status(UrlStatus::Done).unwrap(), 3);
    assert_eq!(store.count_by_status(UrlStatus::Pending).unwrap(), 0);
}

#[tokio::test]
async fn test_page_budget_stops_crawl() {
    let server = two_level_site().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), 2, &dir);
    config.crawler.max_pages = 2;

    let report = Orchestrator::new(config.clone(), false)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.terminal, TerminalState::Completed);
    assert_eq!(report.pages_done, 2);

    // Budget-stopped runs stay resumable
    config.crawler.max_pages = 0;
    let finished = Orchestrator::new(config, false)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(finished.run_id, report.run_id);
    assert_eq!(finished.terminal, TerminalState::MaxDepthReached);
    assert_eq!(open_store(&dir).count_by_status(UrlStatus::Done).unwrap(), 5);
}

#[tokio::test]
async fn test_topic_assigned_to_fetched_pages() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html_page(
            "Football weekly",
            "The league match ended and the team won the tournament. Football fans cheered.",
            &["/plain"],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("just some bytes", "text/plain"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), 1, &dir);
    Orchestrator::new(config, false)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    let store = open_store(&dir);
    let seed = store.get_record(&abs(&server, "/")).unwrap().unwrap();
    assert_eq!(seed.title.as_deref(), Some("Football weekly"));
    assert_eq!(seed.topic.as_deref(), Some("sports"));
    assert!(seed.confidence.unwrap() > 0.0);

    // Non-HTML responses are done without features
    let plain = store.get_record(&abs(&server, "/plain")).unwrap().unwrap();
    assert_eq!(plain.status, UrlStatus::Done);
    assert!(plain.topic.is_none());
    assert!(plain.title.is_none());
}

#[tokio::test]
async fn test_http_error_recorded_as_failed() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", "home", &["/missing"])).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = Orchestrator::new(create_test_config(&server.uri(), 1, &dir), false)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.pages_done, 1);
    assert_eq!(report.pages_failed, 1);
    let missing = open_store(&dir)
        .get_record(&abs(&server, "/missing"))
        .unwrap()
        .unwrap();
    assert_eq!(missing.status, UrlStatus::Failed);
    assert!(missing.error_message.unwrap().contains("404"));
}

/// Classifier that always picks the last candidate label
struct LastLabel;

impl Classifier for LastLabel {
    fn classify(&self, _text: &str, candidate_labels: &[String]) -> Option<Classification> {
        candidate_labels
            .last()
            .map(|label| Classification::new(label.clone(), Some(1.0)))
    }
}

#[tokio::test]
async fn test_custom_classifier_is_used() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", "anything at all", &[])).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), 1, &dir);
    config.classifier.candidate_labels = vec!["alpha".to_string(), "omega".to_string()];

    Orchestrator::new(config, false)
        .await
        .unwrap()
        .with_classifier(Arc::new(LastLabel))
        .run()
        .await
        .unwrap();

    let seed = open_store(&dir).get_record(&abs(&server, "/")).unwrap().unwrap();
    assert_eq!(seed.topic.as_deref(), Some("omega"));
    assert_eq!(seed.confidence, Some(1.0));
}

#[tokio::test]
async fn test_corrupt_checkpoint_keeps_failing_until_fresh() {
    let server = two_level_site().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), 1, &dir);

    let run_id = {
        let mut orchestrator = Orchestrator::new(config.clone(), false).await.unwrap();
        while orchestrator.step().await.unwrap() != CrawlState::LevelAdvancing {}
        orchestrator.run_id()
    };
    let checkpoints = CheckpointManager::new(&config.storage.checkpoint_dir, run_id);
    std::fs::write(checkpoints.path(), b"{ truncated").unwrap();

    // Every plain start hits the same checkpoint instead of starting over
    for _ in 0..2 {
        let mut orchestrator = Orchestrator::new(config.clone(), false).await.unwrap();
        assert_eq!(orchestrator.run_id(), run_id);
        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(
            err,
            CrawlError::Checkpoint(CheckpointError::Corrupt { .. })
        ));
    }

    {
        let store = open_store(&dir);
        assert_eq!(store.get_run(run_id).unwrap().status, RunStatus::Aborted);
        assert_eq!(store.count_by_status(UrlStatus::Pending).unwrap(), 2);
    }

    let report = Orchestrator::new(config, true)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_ne!(report.run_id, run_id);
    assert_eq!(report.pages_done, 3);
    assert!(checkpoints.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_interleaved_seeds_keep_their_own_work() {
    let site_a = two_level_site().await;
    let site_b = two_level_site().await;
    let dir = TempDir::new().unwrap();
    let config_a = create_test_config(&site_a.uri(), 1, &dir);
    let config_b = create_test_config(&site_b.uri(), 1, &dir);

    // Seed A stops with its depth-1 URLs still pending
    let run_a = {
        let mut orchestrator = Orchestrator::new(config_a.clone(), false).await.unwrap();
        while orchestrator.step().await.unwrap() != CrawlState::LevelAdvancing {}
        orchestrator.run_id()
    };

    // Seed B is interrupted before its first batch, then resumed to the end
    let run_b = {
        let mut orchestrator = Orchestrator::new(config_b.clone(), false).await.unwrap();
        assert_ne!(orchestrator.run_id(), run_a);
        orchestrator.step().await.unwrap();
        orchestrator.shutdown_token().cancel();
        let report = orchestrator.run().await.unwrap();
        assert_eq!(report.terminal, TerminalState::Interrupted);
        report.run_id
    };
    let report_b = Orchestrator::new(config_b, false)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report_b.run_id, run_b);
    assert_eq!(report_b.pages_done, 3);
    assert_eq!(requested_paths(&site_a).await, vec!["/".to_string()]);

    // Seed A picks its own run back up even though B ran later
    let report_a = Orchestrator::new(config_a, false)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report_a.run_id, run_a);
    assert_eq!(report_a.terminal, TerminalState::MaxDepthReached);
    assert_eq!(report_a.pages_done, 2);
    assert_eq!(open_store(&dir).count_by_status(UrlStatus::Done).unwrap(), 6);
}

#[tokio::test]
async fn test_shutdown_abandons_slow_fetch_after_grace() {
    let server = Arc::new(MockServer::start().await);
    mount_page(&server, "/", html_page("Home", "home", &["/slow"])).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page("Slow", "slow", &[]), "text/html")
                .set_delay(Duration::from_secs(10)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(&server, "/slow", html_page("Slow", "slow", &[])).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), 1, &dir);
    config.crawler.shutdown_grace_ms = 200;
    config.fetch.request_timeout_ms = 30_000;

    let mut orchestrator = Orchestrator::new(config.clone(), false).await.unwrap();
    let run_id = orchestrator.run_id();

    // Stop as soon as the slow fetch is on the wire
    let token = orchestrator.shutdown_token();
    let watched = Arc::clone(&server);
    tokio::spawn(async move {
        loop {
            if requested_paths(&watched).await.iter().any(|p| p == "/slow") {
                token.cancel();
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    let started = Instant::now();
    let report = orchestrator.run().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.terminal, TerminalState::Interrupted);
    assert_eq!(report.pages_done, 1);
    drop(orchestrator);

    {
        let store = open_store(&dir);
        assert_eq!(store.get_run(run_id).unwrap().status, RunStatus::Interrupted);
        let slow = store.get_record(&abs(&server, "/slow")).unwrap().unwrap();
        assert_eq!(slow.status, UrlStatus::Pending);
    }

    let resumed = Orchestrator::new(config, false)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(resumed.run_id, run_id);
    assert_eq!(resumed.terminal, TerminalState::MaxDepthReached);
    assert_eq!(resumed.pages_done, 1);

    let slow = open_store(&dir)
        .get_record(&abs(&server, "/slow"))
        .unwrap()
        .unwrap();
    assert_eq!(slow.status, UrlStatus::Done);
    let fetches = requested_paths(&server)
        .await
        .iter()
        .filter(|p| *p == "/slow")
        .count();
    assert_eq!(fetches, 2);
}

/// SQLite store whose first Done write for one URL fails
struct FailOnDone {
    inner: SqliteStore,
    url: String,
    armed: bool,
}

impl PageStore for FailOnDone {
    fn create_run(&mut self, seed_url: &str, config_hash: &str) -> StoreResult<i64> {
        self.inner.create_run(seed_url, config_hash)
    }

    fn get_run(&self, run_id: i64) -> StoreResult<RunRecord> {
        self.inner.get_run(run_id)
    }

    fn get_latest_run(&self) -> StoreResult<Option<RunRecord>> {
        self.inner.get_latest_run()
    }

    fn latest_resumable_run(&self, seed_url: &str) -> StoreResult<Option<RunRecord>> {
        self.inner.latest_resumable_run(seed_url)
    }

    fn resumable_runs(&self) -> StoreResult<Vec<RunRecord>> {
        self.inner.resumable_runs()
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        outcome: Option<&str>,
    ) -> StoreResult<()> {
        self.inner.finish_run(run_id, status, outcome)
    }

    fn exists(&self, url: &str) -> StoreResult<bool> {
        self.inner.exists(url)
    }

    fn insert_if_absent(&mut self, record: &NewUrlRecord) -> StoreResult<bool> {
        self.inner.insert_if_absent(record)
    }

    fn update_status(
        &mut self,
        url: &str,
        status: UrlStatus,
        result: Option<&PageResult>,
    ) -> StoreResult<()> {
        if self.armed && status == UrlStatus::Done && url == self.url {
            self.armed = false;
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.update_status(url, status, result)
    }

    fn update_statuses(&mut self, urls: &[String], status: UrlStatus) -> StoreResult<()> {
        self.inner.update_statuses(urls, status)
    }

    fn get_record(&self, url: &str) -> StoreResult<Option<UrlRecord>> {
        self.inner.get_record(url)
    }

    fn records_at_depth(
        &self,
        run_id: i64,
        depth: u32,
        statuses: &[UrlStatus],
    ) -> StoreResult<Vec<UrlRecord>> {
        self.inner.records_at_depth(run_id, depth, statuses)
    }

    fn all_records(&self) -> StoreResult<Vec<UrlRecord>> {
        self.inner.all_records()
    }

    fn clear_records(&mut self) -> StoreResult<()> {
        self.inner.clear_records()
    }

    fn insert_links(&mut self, from_url: &str, to_urls: &[String], run_id: i64) -> StoreResult<()> {
        self.inner.insert_links(from_url, to_urls, run_id)
    }

    fn get_outgoing_links(&self, from_url: &str) -> StoreResult<Vec<LinkRecord>> {
        self.inner.get_outgoing_links(from_url)
    }

    fn count_links(&self) -> StoreResult<u64> {
        self.inner.count_links()
    }

    fn count_by_status(&self, status: UrlStatus) -> StoreResult<u64> {
        self.inner.count_by_status(status)
    }

    fn count_total(&self) -> StoreResult<u64> {
        self.inner.count_total()
    }

    fn count_unique_domains(&self) -> StoreResult<u64> {
        self.inner.count_unique_domains()
    }

    fn depth_breakdown(&self) -> StoreResult<BTreeMap<u32, u64>> {
        self.inner.depth_breakdown()
    }

    fn topic_breakdown(&self) -> StoreResult<Vec<(String, u64)>> {
        self.inner.topic_breakdown()
    }
}

#[tokio::test]
async fn test_store_error_aborts_before_checkpoint() {
    let server = two_level_site().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), 1, &dir);
    let store = FailOnDone {
        inner: open_store(&dir),
        url: abs(&server, "/a"),
        armed: true,
    };

    let mut orchestrator = Orchestrator::with_store(config.clone(), false, Box::new(store))
        .await
        .unwrap();
    let run_id = orchestrator.run_id();
    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, CrawlError::Store(StoreError::Io(_))));
    drop(orchestrator);

    // The last checkpoint is still the one written when depth 1 began
    let snapshot = CheckpointManager::new(&config.storage.checkpoint_dir, run_id)
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.depth, 1);
    assert_eq!(
        snapshot.current_level,
        vec![abs(&server, "/a"), abs(&server, "/b")]
    );

    {
        let store = open_store(&dir);
        assert_eq!(store.get_run(run_id).unwrap().status, RunStatus::Aborted);
        let a = store.get_record(&abs(&server, "/a")).unwrap().unwrap();
        assert_eq!(a.status, UrlStatus::InFlight);
    }

    let report = Orchestrator::new(config, false)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.run_id, run_id);
    assert_eq!(report.terminal, TerminalState::MaxDepthReached);
    assert_eq!(report.pages_done, 2);
    assert_eq!(open_store(&dir).count_by_status(UrlStatus::Done).unwrap(), 3);
}
