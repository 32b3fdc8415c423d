//! Convenience re-exports for common Persister usage
//!
//! This prelude module re-exports the most commonly used items from Persister,
//! making it easier to import everything you need with a single use statement.
//!
//! # Example
//!
//! ```rust
//! use persister::prelude::*;
//!
//! // Now you have access to Database, Persister, Condition, Order and friends
//! ```

// Core Persister components
pub use crate::core::Database;
pub use crate::errors::DatabaseError;
pub use crate::postgres::{PgConnection, PgTransaction};
pub use crate::sqlite::{SqliteConnection, SqliteTransaction};

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig};

// Re-export commonly used repository types for convenience
pub use repository::prelude::*;

// Common external dependencies
pub use anyhow;
pub use async_trait;
pub use sqlx;
pub use tokio;

// Commonly used sqlx types
pub use sqlx::{PgPool, SqlitePool};
pub use uuid::Uuid;
