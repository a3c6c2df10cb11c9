//! Table identity — 논리 테이블 선언과 이름 규칙
//!
//! A table type either declares its physical name explicitly or follows the
//! `<Name>ClickHouseTable` naming convention (`WidgetClickHouseTable` → `widget`).
//! `#[derive(Table)]` applies the convention at compile time; hand-written
//! [`TableDefinition`] impls fall back to [`TableIdentity::resolve`] at runtime.

use crate::doubler::{DictionarySource, ExternalSource, MySqlEngineSource};
use crate::error::{ChxError, ChxResult};

/// Type-name suffix of the naming convention
pub const TABLE_TYPE_SUFFIX: &str = "ClickHouseTable";

/// Where the table's data physically lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Regular ClickHouse table
    Native,
    /// Dictionary with a MySQL source
    MySqlDictionary,
    /// Table on the MySQL engine
    MySqlEngine,
}

impl SourceKind {
    pub fn is_external(&self) -> bool {
        !matches!(self, SourceKind::Native)
    }
}

/// Compile-time table declaration.
///
/// # Example
///
/// ```rust
/// use chx_core::{SourceKind, TableDefinition};
///
/// pub struct WidgetClickHouseTable;
///
/// impl TableDefinition for WidgetClickHouseTable {
///     const WRITER_PROFILE: Option<&'static str> = Some("writer");
/// }
///
/// assert_eq!(WidgetClickHouseTable::SOURCE, SourceKind::Native);
/// ```
pub trait TableDefinition: 'static {
    /// Explicit physical name; empty means "derive from the type name"
    const TABLE: &'static str = "";

    const READER_PROFILE: &'static str = "default";

    /// `None` for read-only tables
    const WRITER_PROFILE: Option<&'static str> = None;

    const CACHE_PROFILE: &'static str = "default";

    const SOURCE: SourceKind = SourceKind::Native;

    /// DDL rewriter used to build the doubler of an external-source table.
    fn external_source() -> Option<&'static dyn ExternalSource> {
        match Self::SOURCE {
            SourceKind::Native => None,
            SourceKind::MySqlDictionary => Some(&DictionarySource),
            SourceKind::MySqlEngine => Some(&MySqlEngineSource),
        }
    }
}

/// Resolved short table name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentity {
    name: String,
}

impl TableIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_name(self) -> String {
        self.name
    }

    /// Explicit `TABLE`, otherwise the naming convention applied to `T`'s type name.
    pub fn resolve<T: TableDefinition>() -> ChxResult<Self> {
        if !T::TABLE.is_empty() {
            return Ok(Self::new(T::TABLE));
        }
        Self::from_type_name(short_type_name(std::any::type_name::<T>()))
    }

    /// `WidgetClickHouseTable` → `widget`
    pub fn from_type_name(type_name: &str) -> ChxResult<Self> {
        let invalid = || ChxError::InvalidTableName {
            type_name: type_name.to_string(),
        };

        let stem = type_name.strip_suffix(TABLE_TYPE_SUFFIX).ok_or_else(invalid)?;
        let mut chars = stem.chars();
        let first = chars.next().ok_or_else(invalid)?;

        let mut name = String::with_capacity(stem.len());
        name.extend(first.to_lowercase());
        name.push_str(chars.as_str());
        Ok(Self::new(name))
    }
}

impl std::fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// `crate::module::Type<Args>` → `Type`
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
