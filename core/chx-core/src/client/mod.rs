//! Network client seam
//!
//! The access layer never speaks the wire protocol itself. Every query goes through
//! a [`Client`] created by a [`ClientFactory`] for one connection profile.

pub mod bindings;

pub use bindings::{Bindings, IntoParam, ScalarValue, render};

use crate::config::ProfileConfig;
use crate::error::ChxResult;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// One result row, column name → value.
pub type Row = Map<String, Value>;

/// Ordered query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// 첫 행의 컬럼 값
    pub fn fetch_one(&self, column: &str) -> Option<&Value> {
        self.rows.first().and_then(|row| row.get(column))
    }

    /// 첫 행의 정수 값; the server may send 64-bit integers as strings
    pub fn fetch_i64(&self, column: &str) -> Option<i64> {
        match self.fetch_one(column)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.parse().ok(),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// 첫 행의 문자열 값 (`null` → `None`)
    pub fn fetch_string(&self, column: &str) -> Option<String> {
        match self.fetch_one(column)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl From<Vec<Row>> for RowSet {
    fn from(rows: Vec<Row>) -> Self {
        Self::new(rows)
    }
}

/// Database client for one connection profile.
pub trait Client: Send + Sync {
    /// Database the client is connected to.
    fn database(&self) -> String;

    fn select(&self, sql: &str, bindings: &Bindings) -> ChxResult<RowSet>;

    fn write(&self, sql: &str, bindings: &Bindings) -> ChxResult<RowSet>;

    fn insert_rows(&self, table: &str, rows: &[Row]) -> ChxResult<RowSet>;

    /// Bulk-loads whole files; one result per file.
    fn insert_bulk_from_file(
        &self,
        table: &str,
        files: &[PathBuf],
        columns: &[String],
        format: &str,
    ) -> ChxResult<Vec<RowSet>>;

    fn ping(&self) -> bool;
}

/// Creates clients for named profiles.
pub trait ClientFactory: Send + Sync {
    fn create(
        &self,
        profile: &str,
        config: &ProfileConfig,
        timeout: Duration,
    ) -> ChxResult<Arc<dyn Client>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&str, &ProfileConfig, Duration) -> ChxResult<Arc<dyn Client>> + Send + Sync,
{
    fn create(
        &self,
        profile: &str,
        config: &ProfileConfig,
        timeout: Duration,
    ) -> ChxResult<Arc<dyn Client>> {
        self(profile, config, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_fetch_helpers() {
        let set = RowSet::new(vec![row(json!({"cnt": "42", "maxDate": null, "q": 1.5}))]);
        assert_eq!(set.fetch_i64("cnt"), Some(42));
        assert_eq!(set.fetch_string("maxDate"), None);
        assert_eq!(set.fetch_string("q").as_deref(), Some("1.5"));
        assert_eq!(set.fetch_one("missing"), None);
    }

    #[test]
    fn test_empty_row_set() {
        let set = RowSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.fetch_i64("cnt"), None);
    }
}
