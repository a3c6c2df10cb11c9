//! Table Registry — 논리 테이블 → 현재 descriptor
//!
//! Resolution happens once per table type and is memoized. External-source tables
//! may resolve to a doubler; a registered mock shadows the real descriptor without
//! replacing it, so clearing mocks restores the exact previous resolution.

use crate::config::{Feature, FeatureFlags};
use crate::connection::ConnectionRegistry;
use crate::credentials::MySqlCredentials;
use crate::descriptor::TableDescriptor;
use crate::doubler::ensure_doubler;
use crate::error::{ChxError, ChxResult};
use crate::identity::{TableDefinition, TableIdentity};
use crate::temp_table::TempTable;
use parking_lot::Mutex;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

struct MockEntry {
    table: Arc<TempTable>,
    descriptor: Arc<TableDescriptor>,
}

#[derive(Default)]
struct RegistryState {
    identities: HashMap<TypeId, TableIdentity>,
    descriptors: HashMap<TypeId, Arc<TableDescriptor>>,
    /// Keyed by table identity
    mocks: HashMap<String, MockEntry>,
    /// Bumped by `clear()`; resolutions started earlier are not memoized
    generation: u64,
}

pub struct TableRegistry {
    connections: Arc<ConnectionRegistry>,
    flags: FeatureFlags,
    state: Mutex<RegistryState>,
}

impl TableRegistry {
    pub fn new(connections: Arc<ConnectionRegistry>, flags: FeatureFlags) -> Self {
        Self {
            connections,
            flags,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Memoized short table name of `T`.
    pub fn identity<T: TableDefinition>(&self) -> ChxResult<TableIdentity> {
        let type_id = TypeId::of::<T>();
        if let Some(identity) = self.state.lock().identities.get(&type_id) {
            return Ok(identity.clone());
        }
        let identity = TableIdentity::resolve::<T>()?;
        Ok(self
            .state
            .lock()
            .identities
            .entry(type_id)
            .or_insert(identity)
            .clone())
    }

    /// Current descriptor of `T`; an active mock wins when `use_mock` is set.
    pub fn descriptor<T: TableDefinition>(&self, use_mock: bool) -> ChxResult<Arc<TableDescriptor>> {
        let identity = self.identity::<T>()?;
        let type_id = TypeId::of::<T>();

        let generation = {
            let state = self.state.lock();
            if use_mock && let Some(mock) = state.mocks.get(identity.name()) {
                return Ok(Arc::clone(&mock.descriptor));
            }
            if let Some(descriptor) = state.descriptors.get(&type_id) {
                return Ok(Arc::clone(descriptor));
            }
            state.generation
        };

        // network round trips happen outside the lock; the first insert wins
        let resolved = Arc::new(self.resolve::<T>(&identity)?);
        Ok(self.memoize(type_id, generation, resolved))
    }

    /// Stores `resolved` unless `clear()` ran since `generation` was read.
    fn memoize(
        &self,
        type_id: TypeId,
        generation: u64,
        resolved: Arc<TableDescriptor>,
    ) -> Arc<TableDescriptor> {
        let mut state = self.state.lock();
        if state.generation != generation {
            debug!("registry cleared during resolution, result not memoized");
            return resolved;
        }
        Arc::clone(state.descriptors.entry(type_id).or_insert(resolved))
    }

    #[instrument(skip(self), fields(table = %identity))]
    fn resolve<T: TableDefinition>(&self, identity: &TableIdentity) -> ChxResult<TableDescriptor> {
        let mut name = identity.name().to_string();

        if T::SOURCE.is_external() && self.doublers_enabled() {
            let source = T::external_source().ok_or_else(|| {
                ChxError::Config(format!("no DDL rewriter declared for external table {identity}"))
            })?;
            let settings = self.connections.settings();
            let credentials = MySqlCredentials::from_config(&settings.shadow_source)?;
            let reader = self.connections.get(T::READER_PROFILE)?;
            name = ensure_doubler(&reader, source, &name, &credentials, settings.ddl_comparison)?;
        }

        debug!(physical = %name, reader = T::READER_PROFILE, "table resolved");
        Ok(TableDescriptor::new(
            &name,
            T::READER_PROFILE,
            T::WRITER_PROFILE,
        ))
    }

    fn doublers_enabled(&self) -> bool {
        self.flags.is_enabled(Feature::UseDoublers) && !self.flags.is_enabled(Feature::TestMode)
    }

    /// Replaces the memoized descriptor of `T`.
    pub fn set_descriptor<T: TableDefinition>(&self, descriptor: TableDescriptor) {
        self.state
            .lock()
            .descriptors
            .insert(TypeId::of::<T>(), Arc::new(descriptor));
    }

    /// Substitutes `T` with `table` until mocks are cleared.
    pub fn mock<T: TableDefinition>(&self, table: Arc<TempTable>) -> ChxResult<()> {
        let identity = self.identity::<T>()?;
        let descriptor = Arc::new(TableDescriptor::for_mock(Arc::clone(&table)));
        debug!(table = %identity, mock = table.name_part(), "table mocked");
        self.state
            .lock()
            .mocks
            .insert(identity.into_name(), MockEntry { table, descriptor });
        Ok(())
    }

    pub fn is_mocked<T: TableDefinition>(&self) -> ChxResult<bool> {
        Ok(self.mock_table::<T>()?.is_some())
    }

    /// Active mock of `T`; a type without a valid identity is an error, not "unmocked".
    pub fn mock_table<T: TableDefinition>(&self) -> ChxResult<Option<Arc<TempTable>>> {
        let identity = self.identity::<T>()?;
        Ok(self
            .state
            .lock()
            .mocks
            .get(identity.name())
            .map(|entry| Arc::clone(&entry.table)))
    }

    pub fn clear_mocks(&self) {
        // temp tables are dropped after the lock is released
        let mocks = std::mem::take(&mut self.state.lock().mocks);
        drop(mocks);
    }

    /// Forgets identities, descriptors and mocks.
    ///
    /// A resolution running concurrently still returns its descriptor but does
    /// not memoize it.
    pub fn clear(&self) {
        let state = {
            let mut guard = self.state.lock();
            let generation = guard.generation + 1;
            std::mem::replace(
                &mut *guard,
                RegistryState {
                    generation,
                    ..RegistryState::default()
                },
            )
        };
        drop(state);
    }

    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }
}
