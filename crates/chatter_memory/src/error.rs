use std::time::Duration;
use thiserror::Error;

/// Errors raised by the persistent indexed store and the collections built on it.
///
/// Insufficient-data outcomes are never errors; they are sentinel values owned
/// by the brain. Everything here means a read or write did not happen.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("{operation} on table '{table}' timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        table: String,
        after: Duration,
    },

    #[error("corrupt entry in table '{table}' at key {key}: {reason}")]
    Corrupt {
        table: String,
        key: String,
        reason: String,
    },

    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("value for key {key} in table '{table}' would not read back unchanged")]
    Unrepresentable { table: String, key: String },

    #[error("invalid table name '{0}': use ASCII letters, digits and underscores")]
    InvalidTableName(String),

    #[error("table '{table}' is missing column(s) {missing:?} and schema migration is disabled")]
    SchemaMismatch { table: String, missing: Vec<String> },
}

pub type StoreResult<T> = Result<T, StoreError>;
