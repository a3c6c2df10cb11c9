//! Bulk Transaction — 스테이징 파일 기반 대량 적재
//!
//! Rows are projected onto the table schema and streamed as JSON lines into a
//! staging file under `<staging_dir>/clickHouse/`. `commit()` bulk-loads the file
//! (retrying the one transient server error) and deletes it; `rollback()` discards it.
//!
//! Dropping a transaction that is still open is a usage error: the staging file is
//! removed, an error is logged and debug builds panic.

use crate::client::{Row, RowSet};
use crate::connection::Connection;
use crate::error::{ChxError, ChxResult};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Staging sub-directory
pub const STAGING_SUBDIR: &str = "clickHouse";

/// Bulk-load format
pub const BULK_FORMAT: &str = "JSONEachRow";

pub const MAX_ATTEMPTS: u32 = 2;

pub const RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Retry policy of `commit()`
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    sleeper: Arc<dyn Fn(Duration) + Send + Sync>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
            sleeper: Arc::new(std::thread::sleep),
        }
    }

    /// Replaces the blocking sleep, e.g. to record backoffs in tests.
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    fn sleep(&self) {
        (self.sleeper)(self.backoff);
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, RETRY_BACKOFF)
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Staged bulk insert into one table
pub struct BulkTransaction {
    connection: Arc<Connection>,
    table: String,
    schema_fields: Vec<String>,
    used_fields: Vec<String>,
    path: PathBuf,
    /// `None` once committed or rolled back
    writer: Option<BufWriter<File>>,
    count: usize,
    /// Set by a rejected append or a staging I/O error; such a transaction may be dropped open
    failed: bool,
    retry: RetryPolicy,
}

impl BulkTransaction {
    /// Opens `<staging_root>/clickHouse/<table>-XXXX`.
    pub fn new(
        connection: Arc<Connection>,
        table: &str,
        schema_fields: Vec<String>,
        staging_root: &Path,
        retry: RetryPolicy,
    ) -> ChxResult<Self> {
        let dir = staging_root.join(STAGING_SUBDIR);
        fs::create_dir_all(&dir)?;

        let (file, path) = tempfile::Builder::new()
            .prefix(&format!("{table}-"))
            .tempfile_in(&dir)?
            .keep()
            .map_err(|e| e.error)?;

        Ok(Self {
            connection,
            table: table.to_string(),
            schema_fields,
            used_fields: Vec::new(),
            path,
            writer: Some(BufWriter::new(file)),
            count: 0,
            failed: false,
            retry,
        })
    }

    /// Appends one row projected onto the schema; unknown fields are dropped.
    pub fn append(&mut self, row: &Row) -> ChxResult<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(ChxError::TransactionClosed);
        };

        let mut line = String::from("{");
        let mut new_fields = Vec::new();
        let mut projected = 0;
        for field in &self.schema_fields {
            let Some(value) = row.get(field) else {
                continue;
            };
            if projected > 0 {
                line.push(',');
            }
            line.push_str(&serde_json::to_string(field)?);
            line.push(':');
            line.push_str(&serde_json::to_string(value)?);
            projected += 1;

            if !self.used_fields.contains(field) {
                new_fields.push(field.clone());
            }
        }

        if projected == 0 {
            self.failed = true;
            return Err(ChxError::FieldNotFound {
                row: Value::Object(row.clone()),
                fields: self.schema_fields.clone(),
            });
        }

        line.push_str("}\n");
        if let Err(e) = writer.write_all(line.as_bytes()) {
            // part of the line may already be on disk
            self.abort(&e);
            return Err(e.into());
        }
        self.used_fields.extend(new_fields);
        self.count += 1;
        Ok(())
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns written so far, in schema order of first use
    pub fn used_fields(&self) -> &[String] {
        &self.used_fields
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Bulk-loads the staging file.
    ///
    /// A failed bulk load keeps the staging file for inspection; a failed flush
    /// discards it.
    pub fn commit(&mut self) -> ChxResult<RowSet> {
        if let Some(writer) = self.writer.take() {
            let flushed = writer
                .into_inner()
                .map_err(|e| e.into_error())
                .and_then(|file| file.sync_all());
            if let Err(e) = flushed {
                self.abort(&e);
                return Err(e.into());
            }
        }

        if self.count == 0 {
            self.remove_file();
            return Err(ChxError::EmptyTransaction);
        }

        let files = [self.path.clone()];
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.connection.insert_bulk_from_file(
                &self.table,
                &files,
                &self.used_fields,
                BULK_FORMAT,
            ) {
                Ok(mut results) => {
                    self.count = 0;
                    self.remove_file();
                    return Ok(results.pop().unwrap_or_default());
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(
                        table = %self.table,
                        attempt,
                        backoff = ?self.retry.backoff,
                        "bulk load interrupted, retrying"
                    );
                    self.retry.sleep();
                }
                Err(e) => {
                    error!(
                        table = %self.table,
                        path = %self.path.display(),
                        "ClickHouse transaction save error: {e}"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Discards the staging file; no-op once closed.
    pub fn rollback(&mut self) {
        if self.writer.take().is_none() {
            return;
        }
        self.count = 0;
        self.remove_file();
    }

    /// Closes the transaction after a staging I/O error and discards the file,
    /// so a later `commit()` cannot load a truncated row.
    fn abort(&mut self, e: &std::io::Error) {
        error!(
            table = %self.table,
            path = %self.path.display(),
            rows = self.count,
            error = %e,
            "staging write failed, transaction closed"
        );
        self.failed = true;
        self.writer = None;
        self.count = 0;
        self.remove_file();
    }

    fn remove_file(&self) {
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "failed to remove staging file");
        }
    }
}

impl Drop for BulkTransaction {
    fn drop(&mut self) {
        if self.writer.take().is_none() {
            return;
        }
        self.remove_file();
        if self.failed {
            return;
        }

        error!(
            table = %self.table,
            rows = self.count,
            "bulk transaction dropped without commit or rollback"
        );
        if cfg!(debug_assertions) && !std::thread::panicking() {
            panic!(
                "bulk transaction on '{}' dropped without commit or rollback",
                self.table
            );
        }
    }
}

impl std::fmt::Debug for BulkTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkTransaction")
            .field("table", &self.table)
            .field("path", &self.path)
            .field("count", &self.count)
            .field("open", &self.writer.is_some())
            .finish()
    }
}
