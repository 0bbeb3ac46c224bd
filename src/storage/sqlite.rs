//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.

use crate::state::TaskStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ContentStore, FrontierStore, Storage, StorageError, StorageResult};
use crate::storage::{
    from_unix, to_unix, BackoffPolicy, Document, FailureRecord, FrontierTask, Validators,
};
use crate::url::normalize_url;
use crate::RobotError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const TASK_COLUMNS: &str = "id, raw_url, normalized_url, source, status, tries, \
     last_attempt_at, next_eligible_at, last_error";

/// How long a writer waits for another connection's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const DOCUMENT_COLUMNS: &str = "raw_url, normalized_url, source, body, fetched_at, etag, \
     last_modified, content_hash";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Opens (or creates) the database, initializes the schema and returns any
    /// task left in progress by a previous process to the pending pool.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> Result<Self, RobotError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Self::from_connection(conn)
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, RobotError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, RobotError> {
        initialize_schema(&conn)?;

        let mut storage = Self { conn };
        let recovered = storage.recover_in_progress()?;
        if recovered > 0 {
            tracing::info!(
                "Returned {} interrupted task(s) to the pending pool",
                recovered
            );
        }

        Ok(storage)
    }

    fn update_schedule(
        &mut self,
        task_id: i64,
        tries: u32,
        now: DateTime<Utc>,
        next_eligible_at: i64,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE frontier SET status = ?1, tries = ?2, last_attempt_at = ?3,
             next_eligible_at = ?4, last_error = ?5 WHERE id = ?6",
            params![
                TaskStatus::Pending.to_db_string(),
                tries,
                to_unix(now),
                next_eligible_at,
                error,
                task_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::TaskNotFound(task_id));
        }
        Ok(())
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<FrontierTask> {
    Ok(FrontierTask {
        id: row.get(0)?,
        raw_url: row.get(1)?,
        normalized_url: row.get(2)?,
        source: row.get(3)?,
        status: TaskStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(TaskStatus::Pending),
        tries: row.get(5)?,
        last_attempt_at: row.get::<_, Option<i64>>(6)?.map(from_unix),
        next_eligible_at: from_unix(row.get(7)?),
        last_error: row.get(8)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        raw_url: row.get(0)?,
        normalized_url: row.get(1)?,
        source: row.get(2)?,
        body: row.get(3)?,
        fetched_at: from_unix(row.get(4)?),
        etag: row.get(5)?,
        last_modified: row.get(6)?,
        content_hash: row.get(7)?,
    })
}

impl FrontierStore for SqliteStorage {
    fn enqueue(&mut self, raw_url: &str, source: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let normalized = normalize_url(raw_url);
        if normalized.is_empty() {
            tracing::debug!("Dropping unparsable URL {:?}", raw_url);
            return Ok(false);
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO frontier (raw_url, normalized_url, source, status, tries, next_eligible_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                raw_url.trim(),
                normalized,
                source,
                TaskStatus::Pending.to_db_string(),
                to_unix(now)
            ],
        )?;

        Ok(inserted > 0)
    }

    fn claim_next(&mut self, now: DateTime<Utc>) -> StorageResult<Option<FrontierTask>> {
        // One statement: the select and the status change cannot interleave
        // with another claim.
        let sql = format!(
            "UPDATE frontier SET status = ?1
             WHERE id = (
                 SELECT id FROM frontier
                 WHERE status = ?2 AND next_eligible_at <= ?3
                 ORDER BY next_eligible_at ASC, id ASC
                 LIMIT 1
             )
             RETURNING {}",
            TASK_COLUMNS
        );

        let task = self
            .conn
            .query_row(
                &sql,
                params![
                    TaskStatus::InProgress.to_db_string(),
                    TaskStatus::Pending.to_db_string(),
                    to_unix(now)
                ],
                task_from_row,
            )
            .optional()?;

        Ok(task)
    }

    fn record_success(
        &mut self,
        task: &FrontierTask,
        now: DateTime<Utc>,
        recrawl_interval: Duration,
    ) -> StorageResult<()> {
        let interval = i64::try_from(recrawl_interval.as_secs()).unwrap_or(i64::MAX);
        let next_eligible_at = to_unix(now).saturating_add(interval);
        self.update_schedule(task.id, 0, now, next_eligible_at, None)
    }

    fn record_failure(
        &mut self,
        task: &FrontierTask,
        now: DateTime<Utc>,
        error: &str,
        policy: &BackoffPolicy,
    ) -> StorageResult<FailureRecord> {
        let tries = task.tries.saturating_add(1);
        let backoff = policy.delay_for(tries);
        let delay = i64::try_from(backoff.as_secs()).unwrap_or(i64::MAX);
        let next_eligible_at = to_unix(now).saturating_add(delay);

        self.update_schedule(task.id, tries, now, next_eligible_at, Some(error))?;

        Ok(FailureRecord {
            tries,
            backoff,
            next_eligible_at: from_unix(next_eligible_at),
        })
    }

    fn release(&mut self, task: &FrontierTask) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE frontier SET status = ?1 WHERE id = ?2",
            params![TaskStatus::Pending.to_db_string(), task.id],
        )?;
        Ok(())
    }

    fn recover_in_progress(&mut self) -> StorageResult<usize> {
        let recovered = self.conn.execute(
            "UPDATE frontier SET status = ?1 WHERE status = ?2",
            params![
                TaskStatus::Pending.to_db_string(),
                TaskStatus::InProgress.to_db_string()
            ],
        )?;
        Ok(recovered)
    }

    fn get_task(&self, normalized_url: &str) -> StorageResult<Option<FrontierTask>> {
        let sql = format!(
            "SELECT {} FROM frontier WHERE normalized_url = ?1",
            TASK_COLUMNS
        );

        let task = self
            .conn
            .query_row(&sql, params![normalized_url], task_from_row)
            .optional()?;

        Ok(task)
    }

    fn count_tasks(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM frontier", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_tasks_by_status(&self, status: TaskStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM frontier WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_failing_tasks(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM frontier WHERE tries > 0", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }
}

impl ContentStore for SqliteStorage {
    fn lookup_validators(&self, normalized_url: &str) -> StorageResult<Option<Validators>> {
        let validators = self
            .conn
            .query_row(
                "SELECT etag, last_modified, content_hash FROM documents WHERE normalized_url = ?1",
                params![normalized_url],
                |row| {
                    Ok(Validators {
                        etag: row.get(0)?,
                        last_modified: row.get(1)?,
                        content_hash: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(validators)
    }

    fn upsert_document(&mut self, document: &Document) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO documents
             (raw_url, normalized_url, source, body, fetched_at, etag, last_modified, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(normalized_url) DO UPDATE SET
                raw_url = excluded.raw_url,
                source = excluded.source,
                body = excluded.body,
                fetched_at = excluded.fetched_at,
                etag = excluded.etag,
                last_modified = excluded.last_modified,
                content_hash = excluded.content_hash",
            params![
                document.raw_url,
                document.normalized_url,
                document.source,
                document.body,
                to_unix(document.fetched_at),
                document.etag,
                document.last_modified,
                document.content_hash,
            ],
        )?;
        Ok(())
    }

    fn get_document(&self, normalized_url: &str) -> StorageResult<Option<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE normalized_url = ?1",
            DOCUMENT_COLUMNS
        );

        let document = self
            .conn
            .query_row(&sql, params![normalized_url], document_from_row)
            .optional()?;

        Ok(document)
    }

    fn count_documents(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn for_each_document(
        &self,
        visit: &mut dyn FnMut(Document) -> StorageResult<()>,
    ) -> StorageResult<()> {
        let sql = format!("SELECT {} FROM documents ORDER BY id ASC", DOCUMENT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], document_from_row)?;

        for row in rows {
            visit(row?)?;
        }

        Ok(())
    }

    fn document_sizes_by_source(&self) -> StorageResult<BTreeMap<String, Vec<u64>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, length(body) FROM documents ORDER BY source")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut sizes: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for row in rows {
            let (source, size) = row?;
            sizes.entry(source).or_default().push(size.max(0) as u64);
        }

        Ok(sizes)
    }
}

impl Storage for SqliteStorage {
    fn in_transaction<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Self) -> StorageResult<T>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;

        let result = f(self).and_then(|value| {
            self.conn.execute_batch("COMMIT")?;
            Ok(value)
        });

        // A failed COMMIT can leave the transaction open
        if result.is_err() && !self.conn.is_autocommit() {
            if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                tracing::error!("Rollback failed: {}", rollback_err);
            }
        }

        result
    }
}
