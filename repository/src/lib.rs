//! Repository - generic query builder and persistence layer for Persister
//!
//! This crate provides the model contract, filter conditions, relation and
//! ordering descriptors, SQL generation and the `Persister` repository that
//! composes them into statements for a `Connection`.

// Lets `#[derive(Model)]` output (which names `::repository`) compile inside this crate.
extern crate self as repository;

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

pub mod condition;
pub mod connection;
pub mod errors;
pub mod mock;
pub mod model;
pub mod ordering;
pub mod persister;
pub mod prelude;
pub mod relation;
pub mod sql_generation;


pub use condition::{Condition, Raw};
pub use connection::{BoxError, Connection, Dialect, Row, Statement, Transaction};
pub use errors::{QueryError, RepositoryError};
pub use model::Model;
pub use model_derive::Model;
pub use ordering::Order;
pub use persister::{Persister, Repository};
pub use relation::{Relation, Relationship};
