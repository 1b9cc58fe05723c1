//! Error types for btreedb
//!
//! Provides a unified error type for the row codec, the engine and the adapter.

use thiserror::Error;

/// Result type alias using BTreeDbError
pub type Result<T> = std::result::Result<T, BTreeDbError>;

/// Unified error type for btreedb operations
#[derive(Debug, Error)]
pub enum BTreeDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Row Codec Errors
    // -------------------------------------------------------------------------
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error("Requested field {name:?} not found in stored row")]
    FieldNotFound { name: String },

    #[error("Row has {actual} fields, expected {expected}")]
    FieldCountMismatch { expected: usize, actual: usize },

    #[error("Field of {len} bytes exceeds the 32-bit length prefix")]
    FieldTooLarge { len: usize },

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("Snapshot corruption detected: {0}")]
    Corruption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Factory Errors
    // -------------------------------------------------------------------------
    #[error("Unknown database: {0}")]
    UnknownDb(String),
}
