//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the robot, including:
//! - SQLite database initialization and schema management
//! - The frontier: claiming tasks, rescheduling them after success or failure
//! - The document store: cache validators, content hashes, bodies
//! - Recovery of tasks left in progress by an interrupted run

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ContentStore, FrontierStore, Storage, StorageError, StorageResult};

use crate::state::TaskStatus;
use crate::RobotError;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

/// Initializes or opens a storage database
///
/// Tasks left `in_progress` by a previous process are returned to the pending
/// pool as part of opening.
pub fn open_storage(path: &Path) -> Result<SqliteStorage, RobotError> {
    SqliteStorage::new(path)
}

/// A frontier row: one URL the robot fetches again and again
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierTask {
    /// Row id; also the insertion order used to break scheduling ties
    pub id: i64,
    /// The URL as first seen by a seeder
    pub raw_url: String,
    /// Deduplication key
    pub normalized_url: String,
    /// Tag of the logical crawl this URL belongs to
    pub source: String,
    pub status: TaskStatus,
    /// Consecutive failures; reset on any success
    pub tries: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// The task can be claimed once this time has passed
    pub next_eligible_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// A stored document, overwritten in place whenever its content changes
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub raw_url: String,
    pub normalized_url: String,
    pub source: String,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Hex SHA-256 of `body`
    pub content_hash: String,
}

/// Cache validators and digest of a stored document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_hash: String,
}

/// What a failed attempt did to a task's schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    /// Consecutive failures including this one
    pub tries: u32,
    /// Delay applied before the next attempt
    pub backoff: Duration,
    pub next_eligible_at: DateTime<Utc>,
}

/// Capped exponential backoff for failed fetches
///
/// The delay after the `n`th consecutive failure is
/// `min(max_backoff_secs, 2^min(n, cap_exponent))` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_backoff_secs: u64,
    pub cap_exponent: u32,
}

impl BackoffPolicy {
    /// Backoff in seconds after `tries` consecutive failures
    pub fn delay_secs(&self, tries: u32) -> u64 {
        let exponent = tries.min(self.cap_exponent);
        let delay = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        delay.min(self.max_backoff_secs)
    }

    pub fn delay_for(&self, tries: u32) -> Duration {
        Duration::from_secs(self.delay_secs(tries))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_backoff_secs: 3600,
            cap_exponent: 12,
        }
    }
}

/// Computes the content digest stored as `Document::content_hash`
pub fn content_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

pub(crate) fn to_unix(time: DateTime<Utc>) -> i64 {
    time.timestamp()
}

pub(crate) fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}
