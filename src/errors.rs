//! Error types for the Persister crate
//!
//! This module contains all error types that can be returned while opening and
//! using a database connection.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("unsupported database type requested: {0}")]
    UnsupportedDriver(String),

    #[error("database name must be provided")]
    MissingName,

    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unexpected row shape: {0}")]
    UnexpectedRow(String),

    #[error("Transaction already finished")]
    TransactionFinished,

    #[error("Nested transactions are not supported")]
    NestedTransaction,
}
