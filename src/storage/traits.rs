//! Storage traits and error types
//!
//! This module defines the trait interfaces for the frontier and the document
//! store, and the error type shared by their implementations.

use crate::state::TaskStatus;
use crate::storage::{BackoffPolicy, Document, FailureRecord, FrontierTask, Validators};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// The durable work queue of fetch tasks
pub trait FrontierStore {
    /// Adds a URL to the frontier unless its normalized form is already known
    ///
    /// URLs that normalize to an empty string are dropped.
    ///
    /// # Returns
    ///
    /// `true` if a new task row was created
    fn enqueue(&mut self, raw_url: &str, source: &str, now: DateTime<Utc>) -> StorageResult<bool>;

    /// Claims the pending task with the earliest `next_eligible_at` (ties broken
    /// by insertion order) among tasks eligible at `now`, marking it in progress
    fn claim_next(&mut self, now: DateTime<Utc>) -> StorageResult<Option<FrontierTask>>;

    /// Reschedules a task after a successful fetch, a 304 or an unchanged body
    fn record_success(
        &mut self,
        task: &FrontierTask,
        now: DateTime<Utc>,
        recrawl_interval: Duration,
    ) -> StorageResult<()>;

    /// Reschedules a task after a failed fetch with exponential backoff
    fn record_failure(
        &mut self,
        task: &FrontierTask,
        now: DateTime<Utc>,
        error: &str,
        policy: &BackoffPolicy,
    ) -> StorageResult<FailureRecord>;

    /// Returns a claimed task to the pending pool without changing its schedule
    fn release(&mut self, task: &FrontierTask) -> StorageResult<()>;

    /// Returns every in-progress task to the pending pool
    ///
    /// This is used for crash recovery when the store is opened.
    fn recover_in_progress(&mut self) -> StorageResult<usize>;

    /// Gets a task by normalized URL
    fn get_task(&self, normalized_url: &str) -> StorageResult<Option<FrontierTask>>;

    /// Gets total task count
    fn count_tasks(&self) -> StorageResult<u64>;

    /// Counts tasks by status
    fn count_tasks_by_status(&self, status: TaskStatus) -> StorageResult<u64>;

    /// Counts tasks whose last attempt failed
    fn count_failing_tasks(&self) -> StorageResult<u64>;
}

/// Fetched documents keyed by normalized URL
pub trait ContentStore {
    /// Gets the cache validators and content hash of a stored document
    fn lookup_validators(&self, normalized_url: &str) -> StorageResult<Option<Validators>>;

    /// Inserts a document or replaces the one stored under its normalized URL
    fn upsert_document(&mut self, document: &Document) -> StorageResult<()>;

    /// Gets a document by normalized URL
    fn get_document(&self, normalized_url: &str) -> StorageResult<Option<Document>>;

    /// Gets total document count
    fn count_documents(&self) -> StorageResult<u64>;

    /// Visits every stored document in insertion order
    ///
    /// Stops at the first error returned by `visit`.
    fn for_each_document(
        &self,
        visit: &mut dyn FnMut(Document) -> StorageResult<()>,
    ) -> StorageResult<()>;

    /// Gets stored body sizes in bytes, grouped by source
    fn document_sizes_by_source(&self) -> StorageResult<BTreeMap<String, Vec<u64>>>;
}

/// A backing store holding both the frontier and the documents
pub trait Storage: FrontierStore + ContentStore {
    /// Runs `f` inside a single transaction
    ///
    /// Changes made by `f` are committed together if it returns `Ok` and rolled
    /// back if it returns an error.
    fn in_transaction<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Self) -> StorageResult<T>,
        Self: Sized;
}
