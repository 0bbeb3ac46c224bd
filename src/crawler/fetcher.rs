//! HTTP fetcher implementation
//!
//! This module performs one conditional fetch per claimed task and persists
//! its outcome:
//! - Building the HTTP client with the configured user agent and timeout
//! - Attaching `If-None-Match` / `If-Modified-Since` from the stored document
//! - Classifying the response (304, unchanged body, changed body, failure)
//! - Writing the document and the task's new schedule in one transaction

use crate::config::CrawlerConfig;
use crate::crawler::clock::Clock;
use crate::crawler::text::TextSink;
use crate::storage::{
    content_digest, BackoffPolicy, ContentStore, Document, FrontierTask, Storage, StorageResult,
};
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The server answered 304 Not Modified
    Unmodified,

    /// A 2xx response whose body differs from the stored one (or the first fetch)
    Changed(Document),

    /// A 2xx response whose body hashes to the stored content hash
    Unchanged {
        content_hash: String,
    },

    /// Any non-2xx status other than 304, or a transport error
    Failed {
        error: String,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, FetchOutcome::Failed { .. })
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects follow reqwest's default policy (at most 10 hops).
///
/// # Example
///
/// ```no_run
/// use recrawl_robot::config::CrawlerConfig;
/// use recrawl_robot::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches claimed tasks and records their outcome
pub struct Fetcher {
    client: Client,
    recrawl_interval: Duration,
    backoff: BackoffPolicy,
    text_sink: Option<TextSink>,
}

impl Fetcher {
    pub fn new(client: Client, config: &CrawlerConfig) -> Self {
        Self {
            client,
            recrawl_interval: config.recrawl_interval(),
            backoff: config.backoff_policy(),
            text_sink: None,
        }
    }

    /// Mirrors the text of every changed document into `sink`
    pub fn with_text_sink(mut self, sink: TextSink) -> Self {
        self.text_sink = Some(sink);
        self
    }

    /// Performs one conditional GET for `task`
    ///
    /// # Request Flow
    ///
    /// 1. Look up the stored validators for the task's normalized URL
    /// 2. GET the raw URL with `If-None-Match` / `If-Modified-Since` attached
    /// 3. Classify the response
    ///
    /// | Response | Outcome |
    /// |----------|---------|
    /// | 304 | `Unmodified` |
    /// | 2xx, same SHA-256 as stored | `Unchanged` |
    /// | 2xx, new or different body | `Changed` |
    /// | other status | `Failed("HTTP <status>")` |
    /// | timeout, DNS, connect, body read error | `Failed(<error>)` |
    ///
    /// Only a store error is returned as `Err`; HTTP problems are outcomes.
    pub async fn fetch<S, C>(
        &self,
        storage: &S,
        task: &FrontierTask,
        clock: &C,
    ) -> StorageResult<FetchOutcome>
    where
        S: ContentStore,
        C: Clock,
    {
        let validators = storage.lookup_validators(&task.normalized_url)?;

        let mut request = self.client.get(&task.raw_url);
        if let Some(validators) = &validators {
            if let Some(etag) = &validators.etag {
                request = request.header(IF_NONE_MATCH, etag.as_str());
            }
            if let Some(last_modified) = &validators.last_modified {
                request = request.header(IF_MODIFIED_SINCE, last_modified.as_str());
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return Ok(FetchOutcome::Failed {
                    error: e.to_string(),
                })
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::Unmodified);
        }

        if !status.is_success() {
            return Ok(FetchOutcome::Failed {
                error: format!("HTTP {}", status),
            });
        }

        let etag = header_string(&response, ETAG);
        let last_modified = header_string(&response, LAST_MODIFIED);

        let body = match response.bytes().await {
            Ok(body) => body.to_vec(),
            Err(e) => {
                return Ok(FetchOutcome::Failed {
                    error: e.to_string(),
                })
            }
        };

        let content_hash = content_digest(&body);
        if let Some(validators) = &validators {
            if validators.content_hash == content_hash {
                return Ok(FetchOutcome::Unchanged { content_hash });
            }
        }

        Ok(FetchOutcome::Changed(Document {
            raw_url: task.raw_url.clone(),
            normalized_url: task.normalized_url.clone(),
            source: task.source.clone(),
            body,
            fetched_at: clock.now(),
            etag,
            last_modified,
            content_hash,
        }))
    }

    /// Persists the outcome of a fetch
    ///
    /// A changed document and the task's new schedule are committed together.
    /// `Unmodified` and `Unchanged` never touch the document store.
    pub fn apply<S, C>(
        &self,
        storage: &mut S,
        task: &FrontierTask,
        outcome: FetchOutcome,
        clock: &C,
    ) -> StorageResult<()>
    where
        S: Storage,
        C: Clock,
    {
        let now = clock.now();

        match outcome {
            FetchOutcome::Failed { error } => {
                let record = storage.in_transaction(|store| {
                    store.record_failure(task, now, &error, &self.backoff)
                })?;

                tracing::warn!(
                    "Fetch failed for {} (tries: {}, backoff: {}s): {}",
                    task.raw_url,
                    record.tries,
                    record.backoff.as_secs(),
                    error
                );
            }
            FetchOutcome::Changed(document) => {
                storage.in_transaction(|store| {
                    store.upsert_document(&document)?;
                    store.record_success(task, now, self.recrawl_interval)
                })?;

                self.log_success(task, true);
                self.write_text(&document);
            }
            FetchOutcome::Unchanged { .. } | FetchOutcome::Unmodified => {
                storage.in_transaction(|store| {
                    store.record_success(task, now, self.recrawl_interval)
                })?;

                self.log_success(task, false);
            }
        }

        Ok(())
    }

    fn log_success(&self, task: &FrontierTask, changed: bool) {
        tracing::info!(
            "Fetched {} (source: {}, changed: {}, next in {}s)",
            task.raw_url,
            task.source,
            changed,
            self.recrawl_interval.as_secs()
        );
    }

    fn write_text(&self, document: &Document) {
        let Some(sink) = &self.text_sink else {
            return;
        };

        match sink.write(&document.normalized_url, &document.body) {
            Ok(Some(path)) => {
                tracing::debug!("Wrote text of {} to {}", document.raw_url, path.display())
            }
            Ok(None) => tracing::debug!("Text of {} below minimum length", document.raw_url),
            Err(e) => tracing::warn!("Failed to write text of {}: {}", document.raw_url, e),
        }
    }
}

fn header_string(
    response: &reqwest::Response,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
