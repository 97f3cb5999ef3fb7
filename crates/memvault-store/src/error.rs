//! Error types for block storage operations.

use thiserror::Error;

/// Errors returned by block normalization and storage engines.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Block id missing or empty after trimming.
    #[error("block id must be a non-empty string")]
    MissingId,
    /// Session url missing or empty after trimming.
    #[error("block session url must be a non-empty string")]
    MissingSessionUrl,
    /// Ordinal range absent or not a pair of finite numbers.
    #[error("block ordinal range must be a pair of finite numbers")]
    InvalidOrdinalRange,
    /// Timestamp absent or non-finite.
    #[error("block timestamp must be a finite number")]
    InvalidTimestamp,
    /// Embedding is not a byte buffer or an in-bounds view over one.
    #[error("block embedding must be a byte buffer or a view over one: {0}")]
    InvalidEmbedding(String),
    /// Table name is not a plain SQL identifier.
    #[error("invalid table name: {0}")]
    InvalidTable(String),
    /// Stored schema version is newer than the supported one.
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(u32),
    /// Engine was closed before the operation ran.
    #[error("block store is closed")]
    Closed,
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
