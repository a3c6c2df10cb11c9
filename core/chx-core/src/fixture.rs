//! Fixture factories: fill a temp table with rows and mock a table with it.
//!
//! ```rust,no_run
//! use chx_core::{FixtureFactory, Row, TableContext, Table};
//! use serde_json::json;
//!
//! #[derive(Table)]
//! #[chx(writer = "writer")]
//! pub struct WidgetClickHouseTable;
//!
//! struct WidgetFixtures;
//!
//! impl FixtureFactory for WidgetFixtures {
//!     type Table = WidgetClickHouseTable;
//!
//!     fn default_row(&self) -> Row {
//!         json!({"id": 1, "checkDate": "2024-01-31"}).as_object().cloned().unwrap_or_default()
//!     }
//! }
//!
//! fn seed(context: &TableContext) -> chx_core::ChxResult<()> {
//!     WidgetFixtures.persist(context, &[], 10)?;
//!     Ok(())
//! }
//! ```

use crate::client::Row;
use crate::context::TableContext;
use crate::error::ChxResult;
use crate::identity::TableDefinition;
use crate::temp_table::{DEFAULT_TEMP_PROFILE, TempTable};
use std::sync::Arc;
use tracing::debug;

/// Minimum number of fixture rows
pub const DEFAULT_ROW_COUNT: usize = 10;

pub trait FixtureFactory {
    /// Table the fixtures substitute
    type Table: TableDefinition;

    fn default_row(&self) -> Row;

    /// `max(row_count, items.len())` rows; each item overrides the defaults.
    fn rows(&self, items: &[Row], row_count: usize) -> Vec<Row> {
        let defaults = self.default_row();
        (0..row_count.max(items.len()))
            .map(|index| {
                let mut row = defaults.clone();
                if let Some(item) = items.get(index) {
                    row.extend(item.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                row
            })
            .collect()
    }

    /// Loads the rows into a temp table shaped like the real one and mocks the
    /// table with it.
    fn persist(
        &self,
        context: &TableContext,
        items: &[Row],
        row_count: usize,
    ) -> ChxResult<Arc<TempTable>> {
        let table = context.table::<Self::Table>();
        let name = table.short_table_name()?;
        let temp = TempTable::create(
            context.connections(),
            &name,
            table.schema()?,
            DEFAULT_TEMP_PROFILE,
        )?;

        let rows = self.rows(items, row_count);
        let mut transaction = temp.create_transaction()?;
        for row in &rows {
            transaction.append(row)?;
        }
        if transaction.has_data() {
            transaction.commit()?;
        } else {
            transaction.rollback();
        }

        let temp = Arc::new(temp);
        context.mock::<Self::Table>(Arc::clone(&temp))?;
        debug!(table = %name, rows = rows.len(), mock = temp.name_part(), "fixtures persisted");
        Ok(temp)
    }
}
