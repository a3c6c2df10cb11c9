//! derive(Table) 매크로 테스트

use chx_core::{SourceKind, TableDefinition, TableIdentity};
use chx_derive::Table;

#[derive(Table)]
pub struct WidgetClickHouseTable;

#[derive(Table)]
#[chx(table_name = "orders_v2", reader = "analytics", writer = "writer", cache = "schemas")]
pub struct Orders;

#[derive(Table)]
#[chx(writer = "writer", source = "dictionary")]
pub struct CurrencyClickHouseTable;

#[derive(Table)]
#[chx(source = "mysql")]
pub struct MySqlUsersClickHouseTable;

#[test]
fn test_table_name() {
    assert_eq!(WidgetClickHouseTable::TABLE_NAME, "widget");
    assert_eq!(Orders::TABLE_NAME, "orders_v2");
    assert_eq!(MySqlUsersClickHouseTable::TABLE_NAME, "mySqlUsers");
}

#[test]
fn test_defaults() {
    assert_eq!(WidgetClickHouseTable::READER_PROFILE, "default");
    assert_eq!(WidgetClickHouseTable::WRITER_PROFILE, None);
    assert_eq!(WidgetClickHouseTable::CACHE_PROFILE, "default");
    assert_eq!(WidgetClickHouseTable::SOURCE, SourceKind::Native);
}

#[test]
fn test_profiles() {
    assert_eq!(Orders::READER_PROFILE, "analytics");
    assert_eq!(Orders::WRITER_PROFILE, Some("writer"));
    assert_eq!(Orders::CACHE_PROFILE, "schemas");
}

#[test]
fn test_sources() {
    assert_eq!(CurrencyClickHouseTable::SOURCE, SourceKind::MySqlDictionary);
    assert_eq!(MySqlUsersClickHouseTable::SOURCE, SourceKind::MySqlEngine);
    assert!(CurrencyClickHouseTable::external_source().is_some());
}

#[test]
fn test_matches_runtime_identity() {
    assert_eq!(
        TableIdentity::resolve::<CurrencyClickHouseTable>().unwrap().name(),
        CurrencyClickHouseTable::TABLE_NAME
    );
}
