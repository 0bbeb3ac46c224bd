//! Integration tests for the robot
//!
//! These tests use wiremock to create mock HTTP servers and drive the
//! scheduler loop end-to-end against a real SQLite store.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use recrawl_robot::config::{
    Config, CrawlerConfig, DatabaseConfig, SeedConfig, SourceConfig, TextConfig,
};
use recrawl_robot::crawler::{
    build_http_client, run_crawl, Clock, Fetcher, ManualClock, Scheduler, SchedulerSettings,
    StepResult, TextSink,
};
use recrawl_robot::storage::{content_digest, ContentStore, FrontierStore, SqliteStorage};
use recrawl_robot::{normalize_url, TaskStatus};
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RECRAWL_SECS: u64 = 86_400;

fn crawler_config() -> CrawlerConfig {
    CrawlerConfig {
        timeout_secs: 5,
        delay_ms: 0,
        idle_poll_ms: 10,
        recrawl_every_secs: RECRAWL_SECS,
        ..CrawlerConfig::default()
    }
}

fn start_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn build_scheduler(
    storage: SqliteStorage,
    clock: ManualClock,
) -> Scheduler<SqliteStorage, ManualClock> {
    let config = crawler_config();
    let fetcher = Fetcher::new(build_http_client(&config).unwrap(), &config);
    let settings = SchedulerSettings {
        delay: Duration::from_millis(200),
        idle_poll: Duration::from_millis(250),
    };
    Scheduler::new(storage, fetcher, clock, settings, CancellationToken::new())
}

/// Claims the next task and processes it: two loop transitions
async fn claim_and_fetch(scheduler: &mut Scheduler<SqliteStorage, ManualClock>) {
    assert_eq!(scheduler.step().await, StepResult::Continue);
    assert!(
        !scheduler.state().is_idle(),
        "expected a task to be eligible"
    );
    assert_eq!(scheduler.step().await, StepResult::Continue);
    assert!(scheduler.state().is_idle());
}

#[tokio::test]
async fn test_recrawl_then_backoff_scenario() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>first</p>"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let clock = ManualClock::new(start_time());
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    let raw = format!("{}/?utm_source=x&b=2&a=1", server.uri());
    let key = format!("{}/?a=1&b=2", server.uri());
    assert_eq!(normalize_url(&raw), key);
    assert!(storage.enqueue(&raw, "seed", clock.now()).unwrap());

    let mut scheduler = build_scheduler(storage, clock.clone());

    // Success: rescheduled one recrawl interval later
    claim_and_fetch(&mut scheduler).await;
    let task = scheduler.storage().get_task(&key).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.tries, 0);
    assert_eq!(task.last_attempt_at, Some(start_time()));
    assert_eq!(
        task.next_eligible_at,
        start_time() + ChronoDuration::seconds(RECRAWL_SECS as i64)
    );
    let document = scheduler.storage().get_document(&key).unwrap().unwrap();
    assert_eq!(document.raw_url, raw);
    assert_eq!(document.body, b"<p>first</p>");

    // Not eligible before the interval has passed
    assert_eq!(scheduler.step().await, StepResult::Continue);
    assert!(scheduler.state().is_idle());

    // First failure: tries 1, retried after 2s
    clock.set(task.next_eligible_at);
    claim_and_fetch(&mut scheduler).await;
    let task = scheduler.storage().get_task(&key).unwrap().unwrap();
    let attempted = task.last_attempt_at.unwrap();
    assert_eq!(task.tries, 1);
    assert_eq!(task.next_eligible_at, attempted + ChronoDuration::seconds(2));
    assert_eq!(
        task.last_error.as_deref(),
        Some("HTTP 500 Internal Server Error")
    );

    // Second failure: tries 2, retried after 4s
    clock.set(task.next_eligible_at);
    claim_and_fetch(&mut scheduler).await;
    let task = scheduler.storage().get_task(&key).unwrap().unwrap();
    let attempted = task.last_attempt_at.unwrap();
    assert_eq!(task.tries, 2);
    assert_eq!(task.next_eligible_at, attempted + ChronoDuration::seconds(4));

    // Failures never touch the stored document
    let after = scheduler.storage().get_document(&key).unwrap().unwrap();
    assert_eq!(after, document);
    assert_eq!(scheduler.storage().count_tasks().unwrap(), 1);
}

#[tokio::test]
async fn test_not_modified_keeps_document() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/doc"))
        .and(header("If-None-Match", "\"rev-1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>revision one</p>")
                .insert_header("ETag", "\"rev-1\""),
        )
        .expect(1)
        .mount(&server)
        .await;

    let clock = ManualClock::new(start_time());
    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let url = format!("{}/doc", server.uri());
    storage.enqueue(&url, "seed", clock.now()).unwrap();

    let mut scheduler = build_scheduler(storage, clock.clone());
    claim_and_fetch(&mut scheduler).await;
    let before = scheduler.storage().get_document(&url).unwrap().unwrap();
    assert_eq!(before.etag.as_deref(), Some("\"rev-1\""));

    clock.advance(Duration::from_secs(RECRAWL_SECS));
    claim_and_fetch(&mut scheduler).await;

    let after = scheduler.storage().get_document(&url).unwrap().unwrap();
    assert_eq!(after, before);

    let task = scheduler.storage().get_task(&url).unwrap().unwrap();
    assert_eq!(task.tries, 0);
    assert_eq!(
        task.next_eligible_at,
        task.last_attempt_at.unwrap() + ChronoDuration::seconds(RECRAWL_SECS as i64)
    );
}

#[tokio::test]
async fn test_change_detection_by_hash() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("version A"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("version B"))
        .mount(&server)
        .await;

    let clock = ManualClock::new(start_time());
    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let url = format!("{}/page", server.uri());
    storage.enqueue(&url, "seed", clock.now()).unwrap();

    let mut scheduler = build_scheduler(storage, clock.clone());

    claim_and_fetch(&mut scheduler).await;
    let first = scheduler.storage().get_document(&url).unwrap().unwrap();
    assert_eq!(first.content_hash, content_digest(b"version A"));

    // Same body: the stored document is left alone
    clock.advance(Duration::from_secs(RECRAWL_SECS));
    claim_and_fetch(&mut scheduler).await;
    let second = scheduler.storage().get_document(&url).unwrap().unwrap();
    assert_eq!(second, first);

    // New body: overwritten in place
    clock.advance(Duration::from_secs(RECRAWL_SECS));
    claim_and_fetch(&mut scheduler).await;
    let third = scheduler.storage().get_document(&url).unwrap().unwrap();
    assert_eq!(third.body, b"version B");
    assert_eq!(third.content_hash, content_digest(b"version B"));
    assert!(third.fetched_at > first.fetched_at);
    assert_eq!(scheduler.storage().count_documents().unwrap(), 1);
}

#[tokio::test]
async fn test_resume_after_interrupted_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("resumed"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("robot.db");
    let url = format!("{}/resume", server.uri());
    let clock = ManualClock::new(start_time());

    // First process: claims the task and dies before recording an outcome
    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        storage.enqueue(&url, "seed", clock.now()).unwrap();
        let claimed = storage.claim_next(clock.now()).unwrap().unwrap();
        assert_eq!(claimed.status, TaskStatus::InProgress);
    }

    // Second process: the task is pending again and gets fetched
    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(
        storage
            .count_tasks_by_status(TaskStatus::InProgress)
            .unwrap(),
        0
    );

    let mut scheduler = build_scheduler(storage, clock.clone());
    claim_and_fetch(&mut scheduler).await;

    let document = scheduler.storage().get_document(&url).unwrap().unwrap();
    assert_eq!(document.body, b"resumed");
}

#[tokio::test]
async fn test_run_crawl_seeds_fetches_and_writes_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><h1>Heading</h1><p>Article body text.</p></body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let seeds_path = dir.path().join("seeds.txt");
    let article = format!("{}/article", server.uri());
    {
        let mut seeds = std::fs::File::create(&seeds_path).unwrap();
        writeln!(seeds, "{}", article).unwrap();
        writeln!(seeds, "not a url").unwrap();
    }

    let config = Config {
        database: DatabaseConfig {
            path: dir.path().join("db").join("robot.db"),
        },
        crawler: crawler_config(),
        text: TextConfig {
            output_dir: Some(dir.path().join("docs")),
            min_chars: 5,
        },
        sources: vec![SourceConfig {
            name: "list".to_string(),
            seed: SeedConfig::SeedFile { path: seeds_path },
        }],
    };

    let sink = TextSink::new(dir.path().join("docs"), 5).unwrap();
    let text_path = sink.path_for(&normalize_url(&article));

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        let text_path = text_path.clone();
        tokio::spawn(async move {
            // The text file appears once the document has been committed
            for _ in 0..400 {
                if text_path.exists() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            token.cancel();
        })
    };

    let summary = tokio::time::timeout(Duration::from_secs(15), run_crawl(&config, token))
        .await
        .expect("robot should stop after cancellation")
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(summary.attempts, 1);
    assert_eq!(summary.successes, 1);

    let storage = SqliteStorage::new(&config.database.path).unwrap();
    assert_eq!(storage.count_tasks().unwrap(), 1);
    let document = storage.get_document(&normalize_url(&article)).unwrap().unwrap();
    assert_eq!(document.source, "list");

    let text = std::fs::read_to_string(&text_path).unwrap();
    assert_eq!(text, "Heading\n\nArticle body text.");
}
