//! # Persister
//!
//! A generic repository layer for PostgreSQL and SQLite: fluent, immutable query building,
//! soft deletes, eager loading and transactions over a narrow connection capability.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use persister::prelude::*;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
//! pub struct User {
//!     pub id: i64,
//!     pub name: String,
//!     pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = DatabaseConfig::new(
//!         "localhost".to_string(), 5432, "persister".to_string(),
//!         "postgres".to_string(), "password".to_string(),
//!         1, 5, 30, 600, 3600,
//!     );
//!
//!     let database = Database::connect(&config).await?;
//!     let users = database.repository::<User>();
//!
//!     let mut user = User { name: "John Doe".to_string(), ..Default::default() };
//!     users.create(&mut user).await?;
//!
//!     let found = users
//!         .order_by(vec![Order::desc("id")])
//!         .one(vec![Condition::eq("name", "John Doe")])
//!         .await?;
//!     println!("Found user: {}", found.id);
//!
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
mod logging;
pub mod postgres;
pub mod prelude;
pub mod sqlite;

// Re-export the main public types for convenience
pub use core::Database;
pub use errors::DatabaseError;
pub use postgres::{PgConnection, PgTransaction};
pub use sqlite::{SqliteConnection, SqliteTransaction};

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig};

// Re-export the repository crate; derived `Model` impls name it directly
pub use repository;

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
