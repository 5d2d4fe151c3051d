//! Integration tests for the prefetcher
//!
//! Engine scenarios run against the in-crate mock catalog source; the HTTP
//! adapter is exercised end-to-end against a wiremock server.

use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use streams_prefetcher::catalog::{
    AddonClient, CatalogSelection, CatalogType, Item, StreamInfo,
};
use streams_prefetcher::config::{HttpConfig, RunConfig, WarmingSettings};
use streams_prefetcher::crawler::{crawl, Limit};
use streams_prefetcher::job::{JobEngine, JobEvent, JobStatus, RunRejected, SignalOutcome};
use streams_prefetcher::output::StopReason;
use streams_prefetcher::storage::{CacheValidity, SqliteStorage, Storage};
use streams_prefetcher::testing::MockCatalogSource;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATALOG_ADDON: &str = "https://catalogs.example.com";
const STREAM_ADDON: &str = "https://streams.example.com";

fn movies(prefix: &str, count: usize) -> Vec<Item> {
    (1..=count)
        .map(|i| Item::movie(format!("tt{}{}", prefix, i), format!("Movie {}{}", prefix, i)))
        .collect()
}

fn selection(catalog_id: &str, catalog_type: CatalogType, order: u32) -> CatalogSelection {
    CatalogSelection {
        addon_url: CATALOG_ADDON.to_string(),
        catalog_id: catalog_id.to_string(),
        catalog_type,
        enabled: true,
        order,
        name: catalog_id.to_string(),
    }
}

fn run_config(selections: Vec<CatalogSelection>) -> RunConfig {
    RunConfig::new(selections, vec![STREAM_ADDON.to_string()])
}

fn stream(name: &str, url: &str) -> StreamInfo {
    StreamInfo {
        name: name.to_string(),
        description: String::new(),
        url: Some(url.to_string()),
    }
}

/// Creates an engine over a single movie catalog with `count` items
fn engine_with_movies(count: usize) -> (JobEngine, MockCatalogSource, tempfile::TempDir) {
    let source = MockCatalogSource::new();
    source.add_catalog(CATALOG_ADDON, "popular", CatalogType::Movie, movies("1", count));
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let engine = JobEngine::new(Arc::new(source.clone()), dir.path().join("prefetch.db"));
    (engine, source, dir)
}

async fn wait_for_status(engine: &JobEngine, wanted: JobStatus) {
    let mut status = engine.subscribe_status();
    status
        .wait_for(|s| *s == wanted)
        .await
        .expect("status channel closed");
}

#[tokio::test]
async fn test_per_catalog_limit_stops_catalog() {
    let source = MockCatalogSource::new();
    source.add_catalog(CATALOG_ADDON, "popular", CatalogType::Movie, movies("1", 10));
    let dir = tempfile::tempdir().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("test.db")).unwrap();

    let mut config = run_config(vec![selection("popular", CatalogType::Movie, 0)]);
    config.limits.movies_per_catalog = Limit::AtMost(3);

    let (reason, outcome) = crawl(&source, &mut storage, &config).await.unwrap();

    assert_eq!(reason, StopReason::Completed);
    assert_eq!(outcome.statistics.movies_prefetched, 3);
    assert_eq!(source.stream_requests().len(), 3);
    assert_eq!(outcome.processed_catalogs.len(), 1);
    assert_eq!(outcome.processed_catalogs[0].success_count, 3);
}

#[tokio::test]
async fn test_global_limit_spans_catalogs() {
    let source = MockCatalogSource::new();
    source.add_catalog(CATALOG_ADDON, "first", CatalogType::Movie, movies("1", 5));
    source.add_catalog(CATALOG_ADDON, "second", CatalogType::Movie, movies("2", 5));
    let dir = tempfile::tempdir().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("test.db")).unwrap();

    let mut config = run_config(vec![
        selection("first", CatalogType::Movie, 0),
        selection("second", CatalogType::Movie, 1),
    ]);
    config.limits.movies_global = Limit::AtMost(7);

    let (reason, outcome) = crawl(&source, &mut storage, &config).await.unwrap();

    assert_eq!(reason, StopReason::Completed);
    assert_eq!(outcome.statistics.movies_prefetched, 7);
    assert_eq!(outcome.processed_catalogs[0].success_count, 5);
    assert_eq!(outcome.processed_catalogs[1].success_count, 2);
}

#[tokio::test]
async fn test_freshness_carries_across_runs() {
    let source = MockCatalogSource::new();
    source.add_catalog(CATALOG_ADDON, "popular", CatalogType::Movie, movies("1", 3));
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("prefetch.db");
    let config = run_config(vec![selection("popular", CatalogType::Movie, 0)]);

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let (_, outcome) = crawl(&source, &mut storage, &config).await.unwrap();
        assert_eq!(outcome.statistics.movies_prefetched, 3);
    }

    let mut storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_freshness_records().unwrap(), 3);

    let (_, outcome) = crawl(&source, &mut storage, &config).await.unwrap();
    assert_eq!(outcome.statistics.movies_prefetched, 0);
    assert_eq!(outcome.statistics.cached_count, 3);
    assert_eq!(source.stream_requests().len(), 3);

    // A zero validity window never treats a record as fresh
    let mut expired = config.clone();
    expired.cache_validity = CacheValidity::Window(Duration::ZERO);
    let (_, outcome) = crawl(&source, &mut storage, &expired).await.unwrap();
    assert_eq!(outcome.statistics.movies_prefetched, 3);
    assert_eq!(source.stream_requests().len(), 6);
}

fn warm_config(threshold: u32) -> RunConfig {
    let mut config = run_config(vec![selection("popular", CatalogType::Movie, 0)]);
    config.warming = WarmingSettings {
        enabled: true,
        cached_pattern: Some(Regex::new("⚡").unwrap()),
        max_requests_per_item: 2,
        max_requests_global: 50,
        cached_streams_threshold: threshold,
    };
    config
}

fn warm_source() -> MockCatalogSource {
    let source = MockCatalogSource::new();
    source.add_catalog(CATALOG_ADDON, "popular", CatalogType::Movie, movies("1", 1));
    source.set_streams(
        "tt11",
        vec![
            stream("⚡ Cached 2160p", "https://cdn.example.com/a"),
            stream("1080p", "https://cdn.example.com/b"),
            stream("720p", "https://cdn.example.com/c"),
            stream("480p", "https://cdn.example.com/d"),
        ],
    );
    source
}

#[tokio::test]
async fn test_warm_threshold_zero_skips_item_with_cached_stream() {
    let source = warm_source();
    let dir = tempfile::tempdir().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("test.db")).unwrap();

    let (_, outcome) = crawl(&source, &mut storage, &warm_config(0)).await.unwrap();

    assert_eq!(outcome.statistics.movies_prefetched, 1);
    assert_eq!(outcome.statistics.cache_requests_sent, 0);
    assert!(source.probed_urls().is_empty());
}

#[tokio::test]
async fn test_warm_threshold_one_probes_uncached_streams() {
    let source = warm_source();
    let dir = tempfile::tempdir().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("test.db")).unwrap();

    let (_, outcome) = crawl(&source, &mut storage, &warm_config(1)).await.unwrap();

    assert_eq!(outcome.statistics.cache_requests_sent, 2);
    assert_eq!(outcome.statistics.cache_requests_successful, 2);
    assert_eq!(
        source.probed_urls(),
        vec!["https://cdn.example.com/b", "https://cdn.example.com/c"]
    );
}

#[tokio::test]
async fn test_warm_quota_holds_across_stream_addons() {
    let source = MockCatalogSource::new();
    source.add_catalog(CATALOG_ADDON, "popular", CatalogType::Movie, movies("1", 1));
    source.set_streams(
        "tt11",
        (1..=4)
            .map(|i| stream("1080p", &format!("https://cdn.example.com/{}", i)))
            .collect(),
    );
    let dir = tempfile::tempdir().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("test.db")).unwrap();

    let mut config = warm_config(0);
    config.stream_addons = vec![
        STREAM_ADDON.to_string(),
        "https://mirror.example.com".to_string(),
    ];
    config.warming.max_requests_per_item = 1;

    let (_, outcome) = crawl(&source, &mut storage, &config).await.unwrap();

    assert_eq!(outcome.statistics.movies_prefetched, 1);
    assert_eq!(outcome.statistics.cache_requests_sent, 1);
    assert_eq!(source.probed_urls(), vec!["https://cdn.example.com/1"]);
    assert_eq!(source.stream_requests(), vec!["tt11"]);
}

#[tokio::test]
async fn test_series_retries_pending_episodes_on_later_run() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("prefetch.db");
    let config = run_config(vec![selection("shows", CatalogType::Series, 0)]);
    let episodes: Vec<Item> = (1..=4)
        .map(|e| Item::episode("tt9", format!("Show S01E0{}", e), 1, e))
        .collect();
    let shows = |failing: &[&str]| {
        let source = MockCatalogSource::new();
        source.add_catalog(
            CATALOG_ADDON,
            "shows",
            CatalogType::Series,
            vec![Item::series("tt9", "Show")],
        );
        source.set_episodes("tt9", episodes.clone());
        for stream_id in failing {
            source.fail_streams(stream_id);
        }
        source
    };

    {
        let source = shows(&["tt9:1:2", "tt9:1:3", "tt9:1:4"]);
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let (_, outcome) = crawl(&source, &mut storage, &config).await.unwrap();
        assert_eq!(outcome.statistics.episodes_prefetched, 1);
    }

    let source = shows(&[]);
    let mut storage = SqliteStorage::new(&db_path).unwrap();
    let (_, outcome) = crawl(&source, &mut storage, &config).await.unwrap();

    assert_eq!(source.stream_requests(), vec!["tt9:1:2", "tt9:1:3", "tt9:1:4"]);
    assert_eq!(outcome.statistics.episodes_prefetched, 3);
    assert_eq!(outcome.statistics.series_prefetched, 1);
    assert_eq!(outcome.statistics.cached_count, 0);

    // Every episode is fresh now, so the whole series is served from cache
    let (_, outcome) = crawl(&source, &mut storage, &config).await.unwrap();
    assert_eq!(outcome.statistics.cached_count, 1);
    assert_eq!(source.stream_requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_time_budget_cancels_run() {
    let (engine, source, _dir) = engine_with_movies(100);
    source.set_latency(Duration::from_secs(1));

    let mut config = run_config(vec![selection("popular", CatalogType::Movie, 0)]);
    config.max_execution_time = Some(Duration::from_secs(5));

    engine.request_run(config).unwrap();
    let state = engine.wait_until_finished().await;

    assert_eq!(state.status, JobStatus::Cancelled);
    let summary = state.summary.unwrap();
    assert_eq!(summary.stop_reason, StopReason::TimeLimit);
    assert!(summary.timing.total_duration_secs >= 5.0);
    assert!(summary.statistics.movies_prefetched < 100);
}

#[tokio::test(start_paused = true)]
async fn test_pause_is_idempotent_and_resume_finishes() {
    let (engine, source, _dir) = engine_with_movies(10);
    source.set_latency(Duration::from_millis(100));

    engine
        .request_run(run_config(vec![selection("popular", CatalogType::Movie, 0)]))
        .unwrap();

    assert_eq!(engine.request_pause(), SignalOutcome::Accepted);
    assert_eq!(engine.request_pause(), SignalOutcome::NoOp);
    assert_eq!(engine.status(), JobStatus::Pausing);

    wait_for_status(&engine, JobStatus::Paused).await;
    let calls_while_paused = source.calls().len();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(source.calls().len(), calls_while_paused);

    assert_eq!(engine.request_resume(), SignalOutcome::Accepted);
    assert_eq!(engine.request_resume(), SignalOutcome::NoOp);

    let state = engine.wait_until_finished().await;
    assert_eq!(state.status, JobStatus::Completed);
    assert_eq!(state.summary.unwrap().statistics.movies_prefetched, 10);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_paused_never_runs_again() {
    let (engine, source, _dir) = engine_with_movies(10);
    source.set_latency(Duration::from_millis(100));
    let mut events = engine.subscribe_events();

    engine
        .request_run(run_config(vec![selection("popular", CatalogType::Movie, 0)]))
        .unwrap();
    engine.request_pause();
    wait_for_status(&engine, JobStatus::Paused).await;

    assert_eq!(engine.request_cancel(), SignalOutcome::Accepted);
    let state = engine.wait_until_finished().await;

    assert_eq!(state.status, JobStatus::Cancelled);
    assert_eq!(state.summary.unwrap().stop_reason, StopReason::CancelledByUser);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    let paused_at = seen
        .iter()
        .position(|e| matches!(e, JobEvent::StatusChanged { to: JobStatus::Paused, .. }))
        .expect("never paused");
    assert_eq!(
        seen[paused_at + 1],
        JobEvent::StatusChanged {
            from: JobStatus::Paused,
            to: JobStatus::Cancelled
        }
    );
    assert!(!seen[paused_at..]
        .iter()
        .any(|e| matches!(e, JobEvent::StatusChanged { to: JobStatus::Running, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_second_run_rejected_while_active() {
    let (engine, source, _dir) = engine_with_movies(5);
    source.set_latency(Duration::from_millis(100));
    let config = run_config(vec![selection("popular", CatalogType::Movie, 0)]);

    engine.request_run(config.clone()).unwrap();
    engine.request_pause();

    assert!(matches!(
        engine.request_run(config.clone()),
        Err(RunRejected::AlreadyRunning { .. })
    ));

    engine.request_cancel();
    let state = engine.wait_until_finished().await;
    assert_eq!(state.status, JobStatus::Cancelled);

    engine.request_run(config).unwrap();
    let state = engine.wait_until_finished().await;
    assert_eq!(state.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_addon_client_end_to_end() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "catalogs": [
                {"id": "top", "type": "movie", "name": "Top Movies"},
                {"id": "search", "type": "movie", "extra": [{"name": "search"}]}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/catalog/movie/top/skip=0.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "metas": [
                {"id": "tt0000001", "type": "movie", "name": "First", "year": 1999},
                {"id": "tt0000002", "type": "movie", "name": "Second", "released": "2004-05-01"},
                {"id": "local:3", "type": "movie", "name": "No external id"}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/catalog/movie/top/skip=3.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "metas": [] })))
        .mount(&server)
        .await;

    for id in ["tt0000001", "tt0000002"] {
        Mock::given(method("GET"))
            .and(path(format!("/stream/movie/{}.json", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "streams": [{"name": "1080p", "url": format!("{}/play/{}", base, id)}]
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = AddonClient::new(&HttpConfig::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("test.db")).unwrap();
    let config = RunConfig::new(
        vec![CatalogSelection {
            addon_url: base.clone(),
            catalog_id: "top".to_string(),
            catalog_type: CatalogType::Movie,
            enabled: true,
            order: 0,
            name: "Top Movies".to_string(),
        }],
        vec![base.clone()],
    );

    let (reason, outcome) = crawl(&client, &mut storage, &config).await.unwrap();

    assert_eq!(reason, StopReason::Completed);
    assert_eq!(outcome.statistics.movies_prefetched, 2);
    assert_eq!(outcome.statistics.stream_requests_successful, 2);
    assert_eq!(outcome.statistics.failed_count, 0);
    assert!(storage.get_freshness("movie:tt0000001").unwrap().is_some());
}
