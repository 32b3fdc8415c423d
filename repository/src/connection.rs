//! Connection capability
//!
//! The narrow interface the repository targets. Execution, pooling and
//! transactions belong to the implementor (see `persister::PgConnection` and
//! `persister::SqliteConnection`).

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Error type surfaced by connection implementations
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A result row keyed by column name
pub type Row = Map<String, Value>;

/// SQL text plus positional parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub sql: String,
    pub parameters: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }
}

/// Placeholder style of the engine behind a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Numbered placeholders (`$1`, `$2`, ...)
    #[default]
    Postgres,
    /// Positional placeholders (`?`)
    Sqlite,
}

impl Dialect {
    /// Placeholder for the parameter at 1-based `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Current time as an SQL expression; SQLite renders RFC 3339 text so it reads back as a timestamp
    pub fn now(&self) -> &'static str {
        match self {
            Dialect::Postgres => "CURRENT_TIMESTAMP",
            Dialect::Sqlite => "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        }
    }

    /// Quote an identifier, doubling embedded quotes
    pub fn quote(&self, identifier: &str) -> String {
        let mut quoted = String::with_capacity(identifier.len() + 2);
        quoted.push('"');
        for c in identifier.chars() {
            if c == '"' {
                quoted.push('"');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    }
}

/// Execution capability consumed by `Repository`
#[async_trait]
pub trait Connection: Send + Sync {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    /// Run a statement that returns no rows, yielding the number of rows affected
    async fn execute(&self, statement: &Statement) -> Result<u64, BoxError>;

    /// Run a statement that returns rows
    async fn query(&self, statement: &Statement) -> Result<Vec<Row>, BoxError>;

    /// Start a transaction; the returned handle is itself a connection
    async fn begin(&self) -> Result<Arc<dyn Transaction>, BoxError>;
}

/// Transaction-scoped connection handle
#[async_trait]
pub trait Transaction: Connection {
    async fn commit(&self) -> Result<(), BoxError>;

    async fn rollback(&self) -> Result<(), BoxError>;

    /// This transaction as a plain connection, for `Persister::part_of`
    fn connection(self: Arc<Self>) -> Arc<dyn Connection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?");
    }

    #[test]
    fn test_now_expression() {
        assert_eq!(Dialect::Postgres.now(), "CURRENT_TIMESTAMP");
        assert!(Dialect::Sqlite.now().starts_with("strftime("));
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(Dialect::Postgres.quote("posts"), "\"posts\"");
        assert_eq!(Dialect::Sqlite.quote("we\"ird"), "\"we\"\"ird\"");
    }
}
