// Shared helpers for the integration tests
#![allow(dead_code)]

use chx_core::testing::RecordingClient;
use chx_core::{ProfileConfig, Row, Settings, Table, TableContext};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Table)]
#[chx(writer = "writer")]
pub struct WidgetClickHouseTable;

#[derive(Table)]
pub struct ReadOnlyClickHouseTable;

#[derive(Table)]
#[chx(writer = "writer", source = "dictionary")]
pub struct TestDictClickHouseTable;

#[derive(Table)]
#[chx(source = "mysql")]
pub struct TestMysqlExternalClickHouseTable;

pub const DICTIONARY: &str = "CREATE DICTIONARY default.testDict\n(\n    `id` UInt64,\n    `name` String\n)\nPRIMARY KEY id\nSOURCE(MYSQL(PORT 3306 HOST 'mysql' USER 'root' PASSWORD 'secret' DB 'prod' TABLE 'items'))\nLIFETIME(MIN 0 MAX 3600)\nLAYOUT(HASHED())";

pub const ENGINE_TABLE: &str = "CREATE TABLE default.testMysqlExternal\n(\n    `id` UInt64\n)\nENGINE = MySQL('mysql:3306', 'prod', 'external_items', 'root', 'secret')";

pub struct Harness {
    pub client: RecordingClient,
    pub context: TableContext,
    // staging files live here until the harness is dropped
    pub staging: TempDir,
}

pub fn harness() -> Harness {
    harness_with(|settings| settings)
}

/// Context over a [`RecordingClient`] with `writer` and `temp` profiles on `default`.
pub fn harness_with(configure: impl FnOnce(Settings) -> Settings) -> Harness {
    chx_core::logging::init_test();
    let staging = tempfile::tempdir().unwrap();
    let client = RecordingClient::new("default");
    client.create_table(
        "widget",
        &[("id", "UInt64"), ("name", "String"), ("checkDate", "Date")],
    );

    let settings = Settings {
        staging_dir: staging.path().to_path_buf(),
        mutations_check_interval_ms: 0,
        ..Settings::default()
    }
    .with_writer("writer", ProfileConfig::default())
    .with_writer("temp", ProfileConfig::default());

    let context = TableContext::new(configure(settings), Arc::new(client.clone()));
    Harness {
        client,
        context,
        staging,
    }
}

pub fn shadow_source() -> serde_json::Map<String, Value> {
    serde_json::json!({
        "database": "fake_db",
        "host": "shadow-host",
        "port": 3307,
        "username": "shadow",
        "password": "pa$$"
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

/// Files left in the staging area
pub fn staged_files(harness: &Harness) -> usize {
    let dir = harness.staging.path().join(chx_core::transaction::STAGING_SUBDIR);
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
