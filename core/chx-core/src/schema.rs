//! Table schema: ordered column name → type.

use crate::client::RowSet;
use crate::error::{ChxError, ChxResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Columns in table order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Builds the schema from `DESCRIBE` output (`name`, `type` columns).
    pub fn from_describe(table: &str, result: &RowSet) -> ChxResult<Self> {
        let mut columns = Vec::with_capacity(result.len());
        for row in result.rows() {
            let name = row.get("name").and_then(|v| v.as_str());
            let data_type = row.get("type").and_then(|v| v.as_str());
            match (name, data_type) {
                (Some(name), Some(data_type)) => columns.push(Column {
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                }),
                _ => {
                    return Err(ChxError::Schema(format!(
                        "unexpected DESCRIBE row for table {table}"
                    )));
                }
            }
        }
        if columns.is_empty() {
            return Err(ChxError::Schema(format!(
                "cannot build schema of table {table}"
            )));
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column type
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.data_type.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>, T: Into<String>> FromIterator<(S, T)> for TableSchema {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, data_type)| Column {
                    name: name.into(),
                    data_type: data_type.into(),
                })
                .collect(),
        }
    }
}
