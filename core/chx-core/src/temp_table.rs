//! Ephemeral tables: `TempTable` (Memory engine) and `TempSet` (Set engine).
//!
//! Both are created on construction and dropped when the handle is dropped.

use crate::client::Bindings;
use crate::connection::{Connection, ConnectionRegistry};
use crate::error::ChxResult;
use crate::schema::TableSchema;
use crate::transaction::{BulkTransaction, RetryPolicy};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Profile temp tables are created on unless told otherwise
pub const DEFAULT_TEMP_PROFILE: &str = "temp";

const SET_PREFIX: &str = "tempSet";

/// `yymmddHHMMSS`
fn timestamp() -> String {
    Local::now().format("%y%m%d%H%M%S").to_string()
}

/// 13 hex digits
fn unique_suffix() -> String {
    format!("{:013x}", rand::random::<u64>() & 0x000F_FFFF_FFFF_FFFF)
}

fn upper_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Columns `field0`, `field1`, ... for positional type lists.
pub fn positional_schema(types: &[&str]) -> TableSchema {
    types
        .iter()
        .enumerate()
        .map(|(index, data_type)| (format!("field{index}"), data_type.to_string()))
        .collect()
}

fn column_list(schema: &TableSchema) -> String {
    schema
        .columns()
        .iter()
        .map(|c| format!("    `{}` {}", c.name, c.data_type))
        .collect::<Vec<_>>()
        .join(",\n")
}

fn drop_quietly(connection: &Connection, name: &str) {
    if let Err(e) = connection.write(&format!("DROP TABLE IF EXISTS {name}"), &Bindings::new()) {
        warn!(table = name, error = %e, "failed to drop temporary table");
    }
}

// ════════════════════════════════════════════
// TempTable
// ════════════════════════════════════════════

/// Memory-engine table named `<prefix><Hint>_<yymmddHHMMSS>_<suffix>`
#[derive(Debug)]
pub struct TempTable {
    name: String,
    database: String,
    profile: String,
    schema: TableSchema,
    staging_dir: PathBuf,
    connection: Arc<Connection>,
}

impl TempTable {
    /// Creates the table on `profile` with the given columns.
    pub fn create(
        connections: &ConnectionRegistry,
        hint: &str,
        schema: TableSchema,
        profile: &str,
    ) -> ChxResult<Self> {
        let settings = connections.settings();
        let name = format!(
            "{}{}_{}_{}",
            settings.temp_table_prefix,
            upper_first(hint),
            timestamp(),
            unique_suffix()
        );
        let connection = connections.get(profile)?;

        drop_quietly(&connection, &name);
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {name}\n(\n{}\n) ENGINE = Memory()",
            column_list(&schema)
        );
        connection.write(&ddl, &Bindings::new())?;
        debug!(table = %name, profile, "temporary table created");

        Ok(Self {
            database: connection.database(),
            name,
            profile: profile.to_string(),
            schema,
            staging_dir: settings.staging_dir.clone(),
            connection,
        })
    }

    /// `INSERT INTO <name> <query>`
    pub fn fill(&self, query: &str, bindings: &Bindings) -> ChxResult<()> {
        self.connection
            .write(&format!("INSERT INTO {} {query}", self.name), bindings)?;
        Ok(())
    }

    /// `<database>.<name>`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    pub fn name_part(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn create_transaction(&self) -> ChxResult<BulkTransaction> {
        self.create_transaction_with(RetryPolicy::default())
    }

    pub fn create_transaction_with(&self, retry: RetryPolicy) -> ChxResult<BulkTransaction> {
        BulkTransaction::new(
            Arc::clone(&self.connection),
            &self.name,
            self.schema.field_names(),
            &self.staging_dir,
            retry,
        )
    }
}

impl Drop for TempTable {
    fn drop(&mut self) {
        drop_quietly(&self.connection, &self.name);
    }
}

// ════════════════════════════════════════════
// TempSet
// ════════════════════════════════════════════

/// Set-engine table for `IN <set>` sub-queries, columns `field0..`
#[derive(Debug)]
pub struct TempSet {
    name: String,
    connection: Arc<Connection>,
}

impl TempSet {
    /// Creates the set and fills it with `INSERT INTO <name> <fill_query>`.
    pub fn create(
        connections: &ConnectionRegistry,
        types: &[&str],
        fill_query: &str,
        bindings: &Bindings,
        profile: &str,
    ) -> ChxResult<Self> {
        let name = format!("{SET_PREFIX}{}_{}", timestamp(), unique_suffix());
        let connection = connections.get(profile)?;

        drop_quietly(&connection, &name);
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {name}\n(\n{}\n) ENGINE = Set",
            column_list(&positional_schema(types))
        );
        connection.write(&ddl, &Bindings::new())?;

        let set = Self { name, connection };
        set.connection
            .write(&format!("INSERT INTO {} {fill_query}", set.name), bindings)?;
        Ok(set)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for TempSet {
    fn drop(&mut self) {
        drop_quietly(&self.connection, &self.name);
    }
}
