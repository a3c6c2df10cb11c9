//! Error types for the CHX table access layer.
//!
//! All public APIs return `ChxResult<T>`; library code does not panic.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Bulk-load message the server emits when it could not rewind the input stream.
/// It is the only backend error a bulk transaction retries.
pub const TRANSIENT_REWIND_MESSAGE: &str = "necessary data rewind wasn't possible";

/// Unified error type for all CHX operations.
#[derive(Debug, Error)]
pub enum ChxError {
    /// Invalid or incomplete process configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection profile is not present in the settings
    #[error("profile '{0}' is not configured")]
    ProfileNotConfigured(String),

    /// Table definition has no explicit name and its type name does not follow the convention
    #[error("table name is not set for '{type_name}' and the type name does not match '<Name>ClickHouseTable'")]
    InvalidTableName { type_name: String },

    /// Write requested on a table declared without a writer profile
    #[error("writer profile is not configured for table '{table}'")]
    WriterNotConfigured { table: String },

    /// Shadow source credentials are missing required fields
    #[error("shadow MySQL credentials are incomplete: missing {0}")]
    MissingCredentials(String),

    /// Schema could not be built
    #[error("schema error: {0}")]
    Schema(String),

    /// Row appended to a bulk transaction shares no field with the target schema
    #[error("fields not found: row {row} has none of {fields:?}")]
    FieldNotFound { row: Value, fields: Vec<String> },

    /// Neither the requested field nor the fallback exists in the table
    #[error("field '{field}' not found in table {table}")]
    FieldMissing { field: String, table: String },

    /// Commit attempted without any appended row
    #[error("nothing to commit: the transaction has no rows")]
    EmptyTransaction,

    /// Append attempted after the transaction was committed or rolled back
    #[error("transaction is already closed, cannot append rows")]
    TransactionClosed,

    /// Error reported by the database client
    #[error("backend error: {message}")]
    Backend { message: String },

    /// Doubler DDL could not be derived from the source DDL
    #[error("DDL rewrite failed: {0}")]
    DdlRewrite(String),

    /// Invalid arguments
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Mutations were still pending when the deadline passed
    #[error("mutations on '{table}' still pending after {waited:?}")]
    MutationsTimeout { table: String, waited: Duration },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl ChxError {
    /// Builds a backend error from any client message.
    pub fn backend(message: impl Into<String>) -> Self {
        ChxError::Backend {
            message: message.into(),
        }
    }

    /// True only for the one bulk-load failure worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChxError::Backend { message } if message == TRANSIENT_REWIND_MESSAGE)
    }
}

/// Result type alias for all CHX operations.
pub type ChxResult<T> = Result<T, ChxError>;

impl From<serde_json::Error> for ChxError {
    fn from(err: serde_json::Error) -> Self {
        ChxError::Serialization(err.to_string())
    }
}
