//! Convenience re-exports for common repository usage

// Core traits (`Model` also brings the derive macro)
pub use crate::Model;
pub use crate::connection::{Connection, Transaction};
pub use crate::persister::{Persister, Repository};

// Query descriptors
pub use crate::condition::{Condition, Raw};
pub use crate::ordering::Order;
pub use crate::relation::Relationship;

// Error types
pub use crate::errors::{QueryError, RepositoryError};

// Connection data
pub use crate::connection::{Dialect, Row, Statement};

// Common external dependencies that are frequently used
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
