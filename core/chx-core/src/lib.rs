//! # CHX — ClickHouse Table Access Layer
//!
//! CHX는 ClickHouse 테이블을 타입으로 선언하고, 읽기/쓰기 커넥션 분리, 스키마 캐시,
//! 외부 소스 더블러, 테스트용 목 테이블, 파일 기반 벌크 트랜잭션을 제공합니다.
//!
//! ## 주요 특징
//!
//! - **Table Registry**: 타입 → 물리 테이블 해석 (프로세스당 1회, 메모이즈)
//! - **Doublers**: MySQL dictionary / MySQL engine 테이블을 다른 자격 증명으로 복제
//! - **Mocks**: 테스트에서 실제 테이블을 임시 Memory 테이블로 대체
//! - **Bulk Transactions**: JSONEachRow 스테이징 파일 → 단일 벌크 로드, 일시적 오류 1회 재시도
//! - **Chunks**: ID 범위/모듈로 기반 병렬 처리용 조건 생성
//!
//! ## 빠른 시작
//!
//! ```rust
//! use chx_core::testing::RecordingClient;
//! use chx_core::{Row, Settings, Table, TableContext};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[derive(Table)]
//! #[chx(writer = "writer")]
//! pub struct WidgetClickHouseTable;
//!
//! # fn main() -> chx_core::ChxResult<()> {
//! let client = RecordingClient::new("default");
//! client.create_table("widget", &[("id", "UInt64"), ("checkDate", "Date")]);
//!
//! let settings = Settings::default().with_writer("writer", Default::default());
//! let context = TableContext::new(settings, Arc::new(client.clone()));
//! let widgets = context.table::<WidgetClickHouseTable>();
//!
//! let row: Row = json!({"id": 1, "checkDate": "2024-01-31"})
//!     .as_object()
//!     .cloned()
//!     .unwrap_or_default();
//! widgets.insert(&[row])?;
//!
//! assert_eq!(client.rows("widget").len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## 모듈 구조
//!
//! - [`registry`] — 테이블 해석과 목 레이어 ([`TableRegistry`])
//! - [`table`] — 테이블 파사드 ([`Table`])
//! - [`doubler`] — 외부 소스 DDL 재작성과 더블러 생성
//! - [`transaction`] — 벌크 트랜잭션 ([`BulkTransaction`])
//! - [`temp_table`] — 임시 Memory / Set 테이블
//! - [`chunks`] — 청크 조건 생성기
//! - [`testing`] — 기록용 인메모리 클라이언트

extern crate self as chx_core;

pub mod cache;
pub mod chunks;
pub mod client;
pub mod config;
pub mod connection;
pub mod context;
pub mod credentials;
pub mod descriptor;
pub mod doubler;
pub mod error;
pub mod fixture;
pub mod identity;
pub mod registry;
pub mod schema;
pub mod statement;
pub mod table;
pub mod temp_table;
pub mod testing;
pub mod transaction;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use cache::{Cache, MemoryCache, NullCache};
pub use chunks::ChunksConditionBuilder;
pub use client::{Bindings, Client, ClientFactory, IntoParam, Row, RowSet, ScalarValue};
pub use config::{ConnectionMode, Feature, FeatureFlags, ProfileConfig, Settings};
pub use context::TableContext;
pub use descriptor::TableDescriptor;
pub use error::{ChxError, ChxResult};
pub use fixture::FixtureFactory;
pub use identity::{SourceKind, TableDefinition, TableIdentity};
pub use registry::TableRegistry;
pub use schema::{Column, TableSchema};
pub use table::Table;
pub use temp_table::{TempSet, TempTable};
pub use transaction::{BulkTransaction, RetryPolicy};

// Re-export derive macros
pub use chx_derive::Table;
