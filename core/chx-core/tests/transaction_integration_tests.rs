// Bulk transaction integration tests
//
// 스테이징 파일 → 벌크 적재, 재시도, 수명 주기 검증

mod common;

use chx_core::error::TRANSIENT_REWIND_MESSAGE;
use chx_core::transaction::BULK_FORMAT;
use chx_core::{ChxError, RetryPolicy};
use common::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn counting_policy(sleeps: &Arc<AtomicUsize>) -> RetryPolicy {
    let sleeps = Arc::clone(sleeps);
    RetryPolicy::new(2, Duration::from_secs(30)).with_sleeper(move |backoff| {
        assert_eq!(backoff, Duration::from_secs(30));
        sleeps.fetch_add(1, Ordering::SeqCst);
    })
}

// ─── Lifecycle ──────────────────────────────────────────

#[test]
fn test_commit_projects_rows_onto_schema() {
    let h = harness();
    let widgets = h.context.table::<WidgetClickHouseTable>();

    let mut transaction = widgets.create_transaction().unwrap();
    transaction
        .append(&row(json!({"name": "a", "id": 1, "unknown": true})))
        .unwrap();
    transaction.append(&row(json!({"id": 2}))).unwrap();
    assert_eq!(transaction.count(), 2);
    assert_eq!(transaction.used_fields(), ["id", "name"]);
    transaction.commit().unwrap();
    assert!(!transaction.has_data());
    assert!(!transaction.path().exists());
    assert!(!transaction.is_open());

    let rows = h.client.rows("widget");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], row(json!({"id": 1, "name": "a"})));

    let loads = h.client.bulk_loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].columns, vec!["id", "name"]);
    assert_eq!(loads[0].format, BULK_FORMAT);
    assert_eq!(staged_files(&h), 0);
}

#[test]
fn test_row_without_known_fields_is_rejected() {
    let h = harness();
    let mut transaction = h
        .context
        .table::<WidgetClickHouseTable>()
        .create_transaction()
        .unwrap();

    let err = transaction.append(&row(json!({"other": 1}))).unwrap_err();
    assert!(matches!(err, ChxError::FieldNotFound { fields, .. } if fields.len() == 3));
    // a failed transaction may be dropped open
    drop(transaction);
    assert_eq!(staged_files(&h), 0);
}

#[test]
fn test_empty_commit() {
    let h = harness();
    let mut transaction = h
        .context
        .table::<WidgetClickHouseTable>()
        .create_transaction()
        .unwrap();

    assert!(matches!(transaction.commit(), Err(ChxError::EmptyTransaction)));
    assert!(!transaction.path().exists());
    assert!(h.client.bulk_loads().is_empty());
}

#[test]
fn test_closed_transaction() {
    let h = harness();
    let mut transaction = h
        .context
        .table::<WidgetClickHouseTable>()
        .create_transaction()
        .unwrap();
    transaction.append(&row(json!({"id": 1}))).unwrap();
    transaction.commit().unwrap();

    assert!(!transaction.is_open());
    assert!(matches!(transaction.commit(), Err(ChxError::EmptyTransaction)));
    assert!(matches!(
        transaction.append(&row(json!({"id": 2}))),
        Err(ChxError::TransactionClosed)
    ));
    assert_eq!(h.client.bulk_loads().len(), 1);
}

#[test]
fn test_rollback_is_idempotent() {
    let h = harness();
    let mut transaction = h
        .context
        .table::<WidgetClickHouseTable>()
        .create_transaction()
        .unwrap();
    transaction.append(&row(json!({"id": 1}))).unwrap();

    transaction.rollback();
    transaction.rollback();

    assert_eq!(staged_files(&h), 0);
    assert!(h.client.rows("widget").is_empty());
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "dropped without commit or rollback")]
fn test_drop_while_open_panics_in_debug() {
    let h = harness();
    let mut transaction = h
        .context
        .table::<WidgetClickHouseTable>()
        .create_transaction()
        .unwrap();
    transaction.append(&row(json!({"id": 1}))).unwrap();
    drop(transaction);
}

#[test]
fn test_read_only_table_cannot_open_transaction() {
    let h = harness();
    h.client.create_table("readOnly", &[("id", "UInt64")]);
    assert!(matches!(
        h.context.table::<ReadOnlyClickHouseTable>().create_transaction(),
        Err(ChxError::WriterNotConfigured { .. })
    ));
}

// ─── Retry ──────────────────────────────────────────────

#[test]
fn test_transient_failure_is_retried_once() {
    let h = harness();
    let sleeps = Arc::new(AtomicUsize::new(0));
    h.client.fail_next_bulk(TRANSIENT_REWIND_MESSAGE);

    let mut transaction = h
        .context
        .table::<WidgetClickHouseTable>()
        .create_transaction_with(counting_policy(&sleeps))
        .unwrap();
    transaction.append(&row(json!({"id": 1}))).unwrap();
    transaction.commit().unwrap();

    assert_eq!(sleeps.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.bulk_loads().len(), 2);
    assert_eq!(h.client.rows("widget").len(), 1);
    assert_eq!(staged_files(&h), 0);
}

#[test]
fn test_repeated_transient_failure_gives_up() {
    let h = harness();
    let sleeps = Arc::new(AtomicUsize::new(0));
    h.client.fail_next_bulk(TRANSIENT_REWIND_MESSAGE);
    h.client.fail_next_bulk(TRANSIENT_REWIND_MESSAGE);

    let mut transaction = h
        .context
        .table::<WidgetClickHouseTable>()
        .create_transaction_with(counting_policy(&sleeps))
        .unwrap();
    transaction.append(&row(json!({"id": 1}))).unwrap();

    assert!(transaction.commit().unwrap_err().is_transient());
    assert_eq!(sleeps.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.bulk_loads().len(), 2);
}

#[test]
fn test_other_failures_keep_the_staging_file() {
    let h = harness();
    let sleeps = Arc::new(AtomicUsize::new(0));
    h.client.fail_next_bulk("Code: 27. Cannot parse input");

    let mut transaction = h
        .context
        .table::<WidgetClickHouseTable>()
        .create_transaction_with(counting_policy(&sleeps))
        .unwrap();
    transaction.append(&row(json!({"id": 1}))).unwrap();

    let err = transaction.commit().unwrap_err();
    assert!(matches!(err, ChxError::Backend { message } if message.contains("Cannot parse")));
    assert_eq!(sleeps.load(Ordering::SeqCst), 0);
    assert!(transaction.path().exists());
    assert_eq!(std::fs::read_to_string(transaction.path()).unwrap(), "{\"id\":1}\n");
}

// ─── Scoped transactions ────────────────────────────────

#[test]
fn test_with_transaction() {
    let h = harness();
    let widgets = h.context.table::<WidgetClickHouseTable>();

    let appended = widgets
        .with_transaction(|tx| {
            for id in 0..3 {
                tx.append(&row(json!({"id": id})))?;
            }
            Ok(tx.count())
        })
        .unwrap();
    assert_eq!(appended, 3);
    assert_eq!(h.client.rows("widget").len(), 3);

    widgets.with_transaction(|_| Ok(())).unwrap();
    assert_eq!(h.client.bulk_loads().len(), 1);

    let failed = widgets.with_transaction(|tx| -> chx_core::ChxResult<()> {
        tx.append(&row(json!({"id": 9})))?;
        Err(ChxError::InvalidArguments("abort".to_string()))
    });
    assert!(failed.is_err());
    assert_eq!(h.client.rows("widget").len(), 3);
    assert_eq!(staged_files(&h), 0);
}
