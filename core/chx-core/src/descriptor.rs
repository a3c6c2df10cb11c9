//! Table descriptor — resolved physical table plus lazily fetched schema.

use crate::cache::Cache;
use crate::client::Bindings;
use crate::connection::ConnectionRegistry;
use crate::error::{ChxError, ChxResult};
use crate::schema::TableSchema;
use crate::temp_table::TempTable;
use std::sync::{Arc, OnceLock};

/// Cache key prefix of table schemas
pub const SCHEMA_CACHE_PREFIX: &str = "ClickHouse-schema#";

/// Resolved table: physical name and connection profiles.
///
/// Immutable once built; only the schema is filled in, once.
#[derive(Debug)]
pub struct TableDescriptor {
    name: String,
    reader_profile: String,
    writer_profile: Option<String>,
    mock_table: Option<Arc<TempTable>>,
    schema: OnceLock<TableSchema>,
}

impl TableDescriptor {
    pub fn new(name: &str, reader_profile: &str, writer_profile: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            reader_profile: reader_profile.to_string(),
            writer_profile: writer_profile.map(str::to_string),
            mock_table: None,
            schema: OnceLock::new(),
        }
    }

    /// Descriptor of a mock: reads and writes go to the temp table.
    pub fn for_mock(temp_table: Arc<TempTable>) -> Self {
        let profile = temp_table.profile().to_string();
        let schema = OnceLock::from(temp_table.schema().clone());
        Self {
            name: temp_table.name_part().to_string(),
            reader_profile: profile.clone(),
            writer_profile: Some(profile),
            mock_table: Some(temp_table),
            schema,
        }
    }

    /// Pre-filled schema; `DESCRIBE` is skipped. A later call replaces an earlier one.
    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = OnceLock::from(schema);
        self
    }

    /// Physical name without the database prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reader_profile(&self) -> &str {
        &self.reader_profile
    }

    pub fn has_writer(&self) -> bool {
        self.writer_profile.is_some()
    }

    pub fn writer_profile(&self) -> ChxResult<&str> {
        self.writer_profile
            .as_deref()
            .ok_or_else(|| ChxError::WriterNotConfigured {
                table: self.name.clone(),
            })
    }

    pub fn mock_table(&self) -> Option<&Arc<TempTable>> {
        self.mock_table.as_ref()
    }

    pub fn schema_cache_key(&self) -> String {
        format!("{SCHEMA_CACHE_PREFIX}{}.{}", self.reader_profile, self.name)
    }

    /// Ordered schema; `DESCRIBE` runs at most once per descriptor and cache entry.
    pub fn schema(
        &self,
        connections: &ConnectionRegistry,
        cache: &dyn Cache,
        cache_profile: &str,
    ) -> ChxResult<&TableSchema> {
        if let Some(schema) = self.schema.get() {
            return Ok(schema);
        }

        let value = cache.remember(&self.schema_cache_key(), cache_profile, &mut || {
            let reader = connections.get(&self.reader_profile)?;
            let described = reader.select(&format!("DESCRIBE {}", self.name), &Bindings::new())?;
            let schema = TableSchema::from_describe(&self.name, &described)?;
            Ok(serde_json::to_value(schema)?)
        })?;

        let schema: TableSchema = serde_json::from_value(value)?;
        if schema.is_empty() {
            return Err(ChxError::Schema(format!(
                "cannot build schema of table {}",
                self.name
            )));
        }
        Ok(self.schema.get_or_init(|| schema))
    }
}

impl PartialEq for TableDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.reader_profile == other.reader_profile
            && self.writer_profile == other.writer_profile
            && self.mock_table.as_ref().map(|t| t.full_name())
                == other.mock_table.as_ref().map(|t| t.full_name())
    }
}

impl Eq for TableDescriptor {}
