//! Table context — 설정, 커넥션, 캐시, 레지스트리의 소유자
//!
//! One context per process (or per test). `reset()` forgets every resolution and mock.

use crate::cache::{Cache, MemoryCache};
use crate::client::{Bindings, ClientFactory};
use crate::config::{Feature, FeatureFlags, Settings};
use crate::connection::ConnectionRegistry;
use crate::error::ChxResult;
use crate::identity::TableDefinition;
use crate::registry::TableRegistry;
use crate::schema::TableSchema;
use crate::table::Table;
use crate::temp_table::{DEFAULT_TEMP_PROFILE, TempSet, TempTable};
use std::sync::Arc;
use tracing::info;

pub struct TableContext {
    settings: Arc<Settings>,
    flags: FeatureFlags,
    connections: Arc<ConnectionRegistry>,
    cache: Arc<dyn Cache>,
    registry: Arc<TableRegistry>,
}

impl TableContext {
    /// Context with an in-memory schema cache.
    pub fn new(settings: Settings, factory: Arc<dyn ClientFactory>) -> Self {
        let cache = Arc::new(MemoryCache::new(settings.schema_cache_capacity));
        Self::with_cache(settings, factory, cache)
    }

    pub fn with_cache(
        settings: Settings,
        factory: Arc<dyn ClientFactory>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        let flags = settings.feature_flags();
        let settings = Arc::new(settings);
        let connections = Arc::new(ConnectionRegistry::new(
            Arc::clone(&settings),
            factory,
            flags.clone(),
        ));
        let registry = Arc::new(TableRegistry::new(Arc::clone(&connections), flags.clone()));

        info!(
            writers = settings.writers.len(),
            mode = ?settings.connection_mode,
            doublers = flags.is_enabled(Feature::UseDoublers),
            "table context created"
        );

        Self {
            settings,
            flags,
            connections,
            cache,
            registry,
        }
    }

    pub fn table<T: TableDefinition>(&self) -> Table<T> {
        Table::new(Arc::clone(&self.registry), Arc::clone(&self.cache))
    }

    /// Substitutes `T` with `table` until `clear_mocks` or `reset`.
    pub fn mock<T: TableDefinition>(&self, table: Arc<TempTable>) -> ChxResult<()> {
        self.registry.mock::<T>(table)
    }

    pub fn clear_mocks(&self) {
        self.registry.clear_mocks();
    }

    /// Forgets resolved identities, descriptors and mocks.
    pub fn reset(&self) {
        self.registry.clear();
    }

    /// Memory-engine table on the `temp` profile.
    pub fn create_temp_table(&self, hint: &str, schema: TableSchema) -> ChxResult<TempTable> {
        TempTable::create(&self.connections, hint, schema, DEFAULT_TEMP_PROFILE)
    }

    /// Set-engine table on `profile`, filled by `fill_query`.
    pub fn create_temp_set(
        &self,
        types: &[&str],
        fill_query: &str,
        bindings: &Bindings,
        profile: &str,
    ) -> ChxResult<TempSet> {
        TempSet::create(&self.connections, types, fill_query, bindings, profile)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    pub fn registry(&self) -> &Arc<TableRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }
}

impl std::fmt::Debug for TableContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableContext")
            .field("connections", &self.connections.len())
            .finish()
    }
}
