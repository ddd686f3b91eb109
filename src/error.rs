//! Error types for HareDB
//!
//! Provides a unified error type for all operations.
//!
//! The four contract errors (`TableNotFound`, `TableExists`, `RecordNotFound`,
//! `RecordExists`) are reported identically by every datastore backend. The
//! remaining variants only come out of the file-backed store or the typed
//! record layer.

use thiserror::Error;

/// Result type alias using HareError
pub type Result<T> = std::result::Result<T, HareError>;

/// Unified error type for HareDB operations
#[derive(Debug, Error)]
pub enum HareError {
    // -------------------------------------------------------------------------
    // Not-found Errors
    // -------------------------------------------------------------------------
    #[error("table {0:?} does not exist")]
    TableNotFound(String),

    #[error("record {id} does not exist in table {table:?}")]
    RecordNotFound { table: String, id: u64 },

    // -------------------------------------------------------------------------
    // Conflict Errors
    // -------------------------------------------------------------------------
    #[error("table {0:?} already exists")]
    TableExists(String),

    #[error("record {id} already exists in table {table:?}")]
    RecordExists { table: String, id: u64 },

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Corruption Errors (scan-time or read-time)
    // -------------------------------------------------------------------------
    #[error("table {table:?} is corrupt at byte {offset}: {reason}")]
    Corruption {
        table: String,
        offset: u64,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Input Validation Errors
    // -------------------------------------------------------------------------
    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HareError {
    /// True for `TableNotFound` and `RecordNotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HareError::TableNotFound(_) | HareError::RecordNotFound { .. }
        )
    }

    /// True for `TableExists` and `RecordExists`.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            HareError::TableExists(_) | HareError::RecordExists { .. }
        )
    }

    pub(crate) fn table_not_found(table: &str) -> Self {
        HareError::TableNotFound(table.to_string())
    }

    pub(crate) fn table_exists(table: &str) -> Self {
        HareError::TableExists(table.to_string())
    }

    pub(crate) fn record_not_found(table: &str, id: u64) -> Self {
        HareError::RecordNotFound {
            table: table.to_string(),
            id,
        }
    }

    pub(crate) fn record_exists(table: &str, id: u64) -> Self {
        HareError::RecordExists {
            table: table.to_string(),
            id,
        }
    }

    pub(crate) fn corruption(table: &str, offset: u64, reason: impl Into<String>) -> Self {
        HareError::Corruption {
            table: table.to_string(),
            offset,
            reason: reason.into(),
        }
    }
}
