//! Connection Registry
//!
//! 프로필당 하나의 클라이언트 핸들을 lazily 생성하고 context 수명 동안 재사용.

use crate::client::{Bindings, Client, ClientFactory, Row, RowSet};
use crate::config::{Feature, FeatureFlags, Settings};
use crate::error::{ChxError, ChxResult};
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Client handle bound to one profile.
pub struct Connection {
    profile: String,
    client: Arc<dyn Client>,
    flags: FeatureFlags,
}

impl Connection {
    pub fn new(profile: &str, client: Arc<dyn Client>, flags: FeatureFlags) -> Self {
        Self {
            profile: profile.to_string(),
            client,
            flags,
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn client(&self) -> &Arc<dyn Client> {
        &self.client
    }

    pub fn database(&self) -> String {
        self.client.database()
    }

    pub fn select(&self, sql: &str, bindings: &Bindings) -> ChxResult<RowSet> {
        if !self.flags.is_enabled(Feature::QueryTiming) {
            return self.client.select(sql, bindings);
        }
        let started = Instant::now();
        let result = self.client.select(sql, bindings);
        debug!(
            profile = %self.profile,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ClickHouse query: {}",
            sql.trim()
        );
        result
    }

    pub fn write(&self, sql: &str, bindings: &Bindings) -> ChxResult<RowSet> {
        self.client.write(sql, bindings)
    }

    pub fn insert_rows(&self, table: &str, rows: &[Row]) -> ChxResult<RowSet> {
        if !self.flags.is_enabled(Feature::QueryTiming) {
            return self.client.insert_rows(table, rows);
        }
        let started = Instant::now();
        let result = self.client.insert_rows(table, rows);
        debug!(
            profile = %self.profile,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ClickHouse insert: {table}"
        );
        result
    }

    pub fn insert_bulk_from_file(
        &self,
        table: &str,
        files: &[PathBuf],
        columns: &[String],
        format: &str,
    ) -> ChxResult<Vec<RowSet>> {
        self.client
            .insert_bulk_from_file(table, files, columns, format)
    }

    pub fn ping(&self) -> bool {
        self.client.ping()
    }

    /// `SHOW CREATE TABLE` 결과
    pub fn create_table_statement(&self, full_name: &str) -> ChxResult<String> {
        self.select(&format!("SHOW CREATE TABLE {full_name}"), &Bindings::new())?
            .fetch_string("statement")
            .ok_or_else(|| ChxError::backend(format!("no DDL returned for {full_name}")))
    }

    pub fn table_exists(&self, full_name: &str) -> ChxResult<bool> {
        let result = self.select(&format!("EXISTS TABLE {full_name}"), &Bindings::new())?;
        Ok(result.fetch_i64("result").unwrap_or(0) != 0)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("profile", &self.profile)
            .finish()
    }
}

/// 프로필 이름 → Connection
pub struct ConnectionRegistry {
    settings: Arc<Settings>,
    factory: Arc<dyn ClientFactory>,
    flags: FeatureFlags,
    connections: DashMap<String, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new(settings: Arc<Settings>, factory: Arc<dyn ClientFactory>, flags: FeatureFlags) -> Self {
        Self {
            settings,
            factory,
            flags,
            connections: DashMap::new(),
        }
    }

    /// Memoized connection for `profile`; unknown profiles are a configuration error.
    pub fn get(&self, profile: &str) -> ChxResult<Arc<Connection>> {
        if let Some(existing) = self.connections.get(profile) {
            return Ok(Arc::clone(existing.value()));
        }

        let config = self.settings.profile(profile)?;
        let client = self
            .factory
            .create(profile, config, self.settings.timeout())?;
        let connection = Arc::new(Connection::new(profile, client, self.flags.clone()));

        let entry = self
            .connections
            .entry(profile.to_string())
            .or_insert(connection);
        Ok(Arc::clone(entry.value()))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn clear(&self) {
        self.connections.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfileConfig;
    use crate::testing::RecordingClient;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn settings() -> Arc<Settings> {
        Arc::new(Settings::default().with_writer("writer", ProfileConfig::default().with_database("w")))
    }

    #[test]
    fn test_connection_is_memoized_per_profile() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let factory = move |_: &str, config: &ProfileConfig, _: Duration| -> ChxResult<Arc<dyn Client>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(RecordingClient::new(&config.database)))
        };
        let registry = ConnectionRegistry::new(settings(), Arc::new(factory), FeatureFlags::new());

        let first = registry.get("default").unwrap();
        let second = registry.get("default").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.get("writer").unwrap().database(), "w");
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_profile() {
        let registry = ConnectionRegistry::new(
            settings(),
            Arc::new(RecordingClient::new("default")),
            FeatureFlags::new(),
        );
        assert!(matches!(
            registry.get("ssdNode"),
            Err(ChxError::ProfileNotConfigured(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_factory_receives_timeout() {
        let factory = |_: &str, _: &ProfileConfig, timeout: Duration| -> ChxResult<Arc<dyn Client>> {
            assert_eq!(timeout, Duration::from_secs(150));
            Ok(Arc::new(RecordingClient::new("default")))
        };
        let registry = ConnectionRegistry::new(settings(), Arc::new(factory), FeatureFlags::new());
        assert!(registry.get("default").unwrap().ping());
    }
}
