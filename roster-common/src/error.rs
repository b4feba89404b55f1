//! Common error types for the roster tools

use thiserror::Error;

/// Common result type for roster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the reconciliation engine and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Import file is malformed: missing header row, missing top-level key, etc.
    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    /// One or more rows lacked a required key and the omission policy is fatal
    #[error("Required field missing: {count} row(s) excluded, first at row {first_row} (missing {missing})")]
    RequiredFieldMissing {
        count: usize,
        first_row: usize,
        missing: String,
    },

    /// Confirmation attempted without a current, non-empty diff
    #[error("Stale precondition: {0}")]
    StalePrecondition(String),

    /// Existing collection holds the same primary key more than once
    #[error("Primary key collision in existing {record_type}: '{key}' appears {count} times")]
    PrimaryKeyCollision {
        record_type: String,
        key: String,
        count: usize,
    },
}
