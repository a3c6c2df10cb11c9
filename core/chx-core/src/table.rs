//! Table façade — 테이블별 공개 API
//!
//! Every call asks the registry for the current descriptor, so an active mock is
//! picked up immediately. Reads use the reader profile, writes the writer profile.

use crate::cache::Cache;
use crate::client::{Bindings, Row, RowSet};
use crate::connection::Connection;
use crate::descriptor::TableDescriptor;
use crate::error::{ChxError, ChxResult};
use crate::identity::{SourceKind, TableDefinition};
use crate::registry::TableRegistry;
use crate::schema::TableSchema;
use crate::temp_table::{DEFAULT_TEMP_PROFILE, TempTable};
use crate::transaction::{BulkTransaction, RetryPolicy};
use chrono::NaiveDate;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Upper bound of `get_chunks_ids` chunk count
pub const MAX_CHUNKS: usize = 10;

/// Date column most tables are partitioned by
pub const DEFAULT_DATE_COLUMN: &str = "checkDate";

/// Values the server returns for unset `Date` columns
pub const EMPTY_DATES: [&str; 2] = ["1970-01-01", "0000-00-00"];

/// Handle to one logical table
pub struct Table<T: TableDefinition> {
    registry: Arc<TableRegistry>,
    cache: Arc<dyn Cache>,
    _table: PhantomData<fn() -> T>,
}

impl<T: TableDefinition> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            cache: Arc::clone(&self.cache),
            _table: PhantomData,
        }
    }
}

impl<T: TableDefinition> std::fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: TableDefinition> Table<T> {
    pub fn new(registry: Arc<TableRegistry>, cache: Arc<dyn Cache>) -> Self {
        Self {
            registry,
            cache,
            _table: PhantomData,
        }
    }

    // ════════════════════════════════════════════
    // Resolution
    // ════════════════════════════════════════════

    pub fn descriptor(&self) -> ChxResult<Arc<TableDescriptor>> {
        self.registry.descriptor::<T>(true)
    }

    pub fn reader(&self) -> ChxResult<Arc<Connection>> {
        let descriptor = self.descriptor()?;
        self.registry.connections().get(descriptor.reader_profile())
    }

    /// Fails with `WriterNotConfigured` for read-only tables.
    pub fn writer(&self) -> ChxResult<Arc<Connection>> {
        let descriptor = self.descriptor()?;
        self.registry.connections().get(descriptor.writer_profile()?)
    }

    /// `<database>.<name>`; a mocked table resolves to its temp table.
    pub fn table_name(&self, use_reader: bool) -> ChxResult<String> {
        let descriptor = self.descriptor()?;
        if let Some(mock) = descriptor.mock_table() {
            return Ok(mock.full_name());
        }
        let connection = if use_reader {
            self.reader()?
        } else {
            self.writer()?
        };
        Ok(format!("{}.{}", connection.database(), descriptor.name()))
    }

    /// Table identity, independent of mocks and doublers
    pub fn short_table_name(&self) -> ChxResult<String> {
        Ok(self.registry.identity::<T>()?.into_name())
    }

    pub fn schema(&self) -> ChxResult<TableSchema> {
        let descriptor = self.descriptor()?;
        let schema = descriptor.schema(
            self.registry.connections(),
            self.cache.as_ref(),
            T::CACHE_PROFILE,
        )?;
        Ok(schema.clone())
    }

    /// `field` if the table has it, otherwise `fallback` (which must exist).
    pub fn check_field(&self, field: &str, fallback: &str) -> ChxResult<String> {
        let schema = self.schema()?;
        if schema.contains(field) {
            return Ok(field.to_string());
        }
        if schema.contains(fallback) {
            return Ok(fallback.to_string());
        }
        Err(ChxError::FieldMissing {
            field: fallback.to_string(),
            table: self.table_name(true)?,
        })
    }

    /// `ASC` or `DESC`; anything else becomes `ASC`.
    pub fn check_order_direction(direction: &str) -> &'static str {
        if direction.eq_ignore_ascii_case("desc") {
            "DESC"
        } else {
            "ASC"
        }
    }

    // ════════════════════════════════════════════
    // Reads
    // ════════════════════════════════════════════

    pub fn select(&self, sql: &str, bindings: &Bindings) -> ChxResult<RowSet> {
        self.reader()?.select(sql, bindings)
    }

    /// Row count for one date, with optional extra conditions.
    pub fn get_total(&self, date: NaiveDate, date_column: &str, extra_conditions: &str) -> ChxResult<i64> {
        let mut sql = String::from("SELECT count() cnt FROM {me} WHERE {dateColumn}=:workDateString");
        if !extra_conditions.is_empty() {
            sql.push_str(&format!(" AND ({extra_conditions})"));
        }
        let bindings = Bindings::new()
            .with("me", self.descriptor()?.name())
            .with("dateColumn", date_column)
            .with("workDateString", date);
        Ok(self.select(&sql, &bindings)?.fetch_i64("cnt").unwrap_or(0))
    }

    /// Row count for an inclusive date range, with optional extra conditions.
    pub fn get_total_in_period(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        date_column: &str,
        extra_conditions: &str,
    ) -> ChxResult<i64> {
        let mut sql = String::from(
            "SELECT count() cnt FROM {me} WHERE {dateColumn} BETWEEN :dateFrom AND :dateTo",
        );
        if !extra_conditions.is_empty() {
            sql.push_str(&format!(" AND ({extra_conditions})"));
        }
        let bindings = Bindings::new()
            .with("me", self.descriptor()?.name())
            .with("dateColumn", date_column)
            .with("dateFrom", from)
            .with("dateTo", to);
        Ok(self.select(&sql, &bindings)?.fetch_i64("cnt").unwrap_or(0))
    }

    pub fn has_data(&self, date: NaiveDate, date_column: &str) -> ChxResult<bool> {
        Ok(self.get_total(date, date_column, "")? > 0)
    }

    /// Latest date in `date_column`; dates before 2001 count as empty.
    pub fn get_max_date(&self, date_column: &str) -> ChxResult<Option<NaiveDate>> {
        let bindings = Bindings::new()
            .with("table", self.descriptor()?.name())
            .with("dateColumn", date_column);
        let max_date = self
            .select(
                "SELECT if(toYear(max({dateColumn})) > 2000, max({dateColumn}), null) maxDate FROM {table}",
                &bindings,
            )?
            .fetch_string("maxDate");

        match max_date {
            None => Ok(None),
            Some(value) if value.is_empty() || EMPTY_DATES.contains(&value.as_str()) => Ok(None),
            Some(value) => {
                let day = value.get(..10).unwrap_or(&value);
                NaiveDate::parse_from_str(day, "%Y-%m-%d")
                    .map(Some)
                    .map_err(|e| ChxError::Serialization(format!("invalid date '{value}': {e}")))
            }
        }
    }

    /// `chunks_count - 1` quantile boundaries of `field`.
    ///
    /// Caller bindings take precedence over `table`, `field` and `quantile`.
    /// `nan` (empty table) becomes an empty string.
    pub fn get_chunks_ids(
        &self,
        field: &str,
        chunks_count: usize,
        conditions: &str,
        bindings: &Bindings,
    ) -> ChxResult<Vec<String>> {
        if chunks_count <= 1 || chunks_count > MAX_CHUNKS {
            return Err(ChxError::InvalidArguments(format!(
                "chunks count must be within 2..={MAX_CHUNKS}, got {chunks_count}"
            )));
        }

        let mut sql = String::from("SELECT toString(quantile(:quantile)({field})) quantile FROM {table}");
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(conditions);
        }

        let table = self.table_name(true)?;
        let delta = 1.0 / chunks_count as f64;
        let mut result = Vec::with_capacity(chunks_count - 1);
        let mut quantile = delta;
        while 1.0 - quantile > 0.001 {
            let defaults = Bindings::new()
                .with("table", table.as_str())
                .with("field", field)
                .with("quantile", quantile);
            let boundary = self
                .select(&sql, &bindings.clone().merge(defaults))?
                .fetch_string("quantile")
                .unwrap_or_default();
            result.push(if boundary.eq_ignore_ascii_case("nan") {
                String::new()
            } else {
                boundary
            });
            quantile += delta;
        }
        Ok(result)
    }

    // ════════════════════════════════════════════
    // Writes
    // ════════════════════════════════════════════

    pub fn insert(&self, rows: &[Row]) -> ChxResult<RowSet> {
        let descriptor = self.descriptor()?;
        self.writer()?.insert_rows(descriptor.name(), rows)
    }

    pub fn insert_one(&self, row: &Row) -> ChxResult<RowSet> {
        self.insert(std::slice::from_ref(row))
    }

    pub fn create_transaction(&self) -> ChxResult<BulkTransaction> {
        self.create_transaction_with(RetryPolicy::default())
    }

    pub fn create_transaction_with(&self, retry: RetryPolicy) -> ChxResult<BulkTransaction> {
        let descriptor = self.descriptor()?;
        let writer = self.writer()?;
        let fields = self.schema()?.field_names();
        BulkTransaction::new(
            writer,
            descriptor.name(),
            fields,
            &self.registry.connections().settings().staging_dir,
            retry,
        )
    }

    /// Runs `f` inside a transaction.
    ///
    /// `Ok` commits (or rolls back when nothing was appended); `Err` rolls back.
    pub fn with_transaction<R>(
        &self,
        f: impl FnOnce(&mut BulkTransaction) -> ChxResult<R>,
    ) -> ChxResult<R> {
        let mut transaction = self.create_transaction()?;
        match f(&mut transaction) {
            Ok(value) => {
                if transaction.has_data() {
                    transaction.commit()?;
                } else {
                    transaction.rollback();
                }
                Ok(value)
            }
            Err(e) => {
                transaction.rollback();
                Err(e)
            }
        }
    }

    pub fn truncate(&self) -> ChxResult<()> {
        let descriptor = self.descriptor()?;
        self.writer()?
            .write(&format!("TRUNCATE TABLE {}", descriptor.name()), &Bindings::new())?;
        Ok(())
    }

    /// Asynchronous mutation `ALTER TABLE ... DELETE WHERE <conditions>`.
    pub fn delete_all(&self, conditions: &str, bindings: &Bindings) -> ChxResult<()> {
        let descriptor = self.descriptor()?;
        self.writer()?.write(
            &format!("ALTER TABLE {} DELETE WHERE {conditions}", descriptor.name()),
            bindings,
        )?;
        Ok(())
    }

    /// `delete_all` followed by `wait_mutations`.
    pub fn delete_all_sync(&self, conditions: &str, bindings: &Bindings) -> ChxResult<()> {
        self.delete_all(conditions, bindings)?;
        self.wait_mutations()
    }

    pub fn optimize(&self) -> ChxResult<()> {
        let descriptor = self.descriptor()?;
        self.writer()?.write(
            "OPTIMIZE TABLE {me}",
            &Bindings::new().with("me", descriptor.name()),
        )?;
        Ok(())
    }

    /// `SYSTEM RELOAD DICTIONARY` for dictionary tables.
    pub fn reload(&self) -> ChxResult<()> {
        if T::SOURCE != SourceKind::MySqlDictionary {
            return Err(ChxError::InvalidArguments(format!(
                "{} is not a dictionary",
                self.short_table_name()?
            )));
        }
        let table = self.table_name(true)?;
        self.reader()?.write(
            "SYSTEM RELOAD DICTIONARY {table}",
            &Bindings::new().with("table", table),
        )?;
        Ok(())
    }

    // ════════════════════════════════════════════
    // Mutations
    // ════════════════════════════════════════════

    /// Unfinished mutations on the writer database
    pub fn has_mutations(&self) -> ChxResult<bool> {
        let descriptor = self.descriptor()?;
        let writer = self.writer()?;
        let bindings = Bindings::new()
            .with("writerDB", writer.database())
            .with("table", descriptor.name());
        let pending = writer
            .select(
                "SELECT count() cnt FROM system.mutations WHERE database=:writerDB AND table=:table AND is_done=0",
                &bindings,
            )?
            .fetch_i64("cnt")
            .unwrap_or(0);
        Ok(pending > 0)
    }

    /// Polls until no mutation is pending; sleeps before every check.
    pub fn wait_mutations(&self) -> ChxResult<()> {
        let interval = self.check_interval();
        loop {
            std::thread::sleep(interval);
            if !self.has_mutations()? {
                return Ok(());
            }
        }
    }

    /// `wait_mutations` with a deadline.
    pub fn wait_mutations_for(&self, timeout: Duration) -> ChxResult<()> {
        let interval = self.check_interval();
        let started = Instant::now();
        loop {
            std::thread::sleep(interval);
            if !self.has_mutations()? {
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(ChxError::MutationsTimeout {
                    table: self.short_table_name()?,
                    waited,
                });
            }
            debug!(table = std::any::type_name::<T>(), ?waited, "mutations still pending");
        }
    }

    fn check_interval(&self) -> Duration {
        self.registry
            .connections()
            .settings()
            .mutations_check_interval()
    }

    // ════════════════════════════════════════════
    // Temp tables
    // ════════════════════════════════════════════

    /// Memory-engine copy of this table's schema on the `temp` profile,
    /// optionally filled with `INSERT INTO <temp> <fill_query>`.
    pub fn create_temp_table(
        &self,
        hint: &str,
        fill_query: &str,
        bindings: &Bindings,
    ) -> ChxResult<TempTable> {
        let table = TempTable::create(
            self.registry.connections(),
            hint,
            self.schema()?,
            DEFAULT_TEMP_PROFILE,
        )?;
        if !fill_query.is_empty() {
            table.fill(fill_query, bindings)?;
        }
        Ok(table)
    }
}

