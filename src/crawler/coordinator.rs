//! Crawler coordinator - wiring for a robot run
//!
//! Opens the store (recovering interrupted tasks), seeds an empty frontier,
//! builds the fetcher and hands everything to the scheduler loop.

use crate::config::Config;
use crate::crawler::clock::{Clock, SystemClock};
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::scheduler::{RunSummary, Scheduler, SchedulerSettings};
use crate::crawler::text::TextSink;
use crate::seed::seed_sources;
use crate::storage::{open_storage, FrontierStore, SqliteStorage};
use crate::Result;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

/// Opens the configured database, creating its parent directory if needed
pub fn open_store(config: &Config) -> Result<SqliteStorage> {
    let path = &config.database.path;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    open_storage(path)
}

/// Builds the fetcher, with text output when `[text] output-dir` is set
pub fn build_fetcher(config: &Config, client: Client) -> Result<Fetcher> {
    let fetcher = Fetcher::new(client, &config.crawler);

    match &config.text.output_dir {
        Some(dir) => {
            let sink = TextSink::new(dir, config.text.min_chars)?;
            tracing::info!(
                "Writing text of changed documents to {} (min {} chars)",
                dir.display(),
                config.text.min_chars
            );
            Ok(fetcher.with_text_sink(sink))
        }
        None => Ok(fetcher),
    }
}

/// Seeds the frontier if it is empty, stopping early once `token` is cancelled
///
/// # Returns
///
/// The number of URLs offered by the seeders
pub async fn seed_store(
    config: &Config,
    client: &Client,
    storage: &mut SqliteStorage,
    token: &CancellationToken,
) -> Result<usize> {
    let now = SystemClock.now();
    let offered = seed_sources(client, storage, &config.sources, now, token).await?;
    tracing::info!("Frontier holds {} tasks", storage.count_tasks()?);
    Ok(offered)
}

/// Runs the robot until `token` is cancelled
///
/// # Arguments
///
/// * `config` - The robot configuration
/// * `token` - Cancelled on Ctrl+C; the loop stops at its next await point
pub async fn run_crawl(config: &Config, token: CancellationToken) -> Result<RunSummary> {
    let mut storage = open_store(config)?;
    let client = build_http_client(&config.crawler)?;

    seed_store(config, &client, &mut storage, &token).await?;

    let fetcher = build_fetcher(config, client)?;
    let settings = SchedulerSettings::from_config(&config.crawler);

    tracing::info!(
        "Starting robot (db: {}, recrawl every {}s)",
        config.database.path.display(),
        config.crawler.recrawl_every_secs
    );

    let mut scheduler = Scheduler::new(storage, fetcher, SystemClock, settings, token);
    let summary = scheduler.run().await;

    tracing::info!("State is saved in the database; the next run resumes from it");
    Ok(summary)
}
