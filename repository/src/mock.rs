//! Scripted connection for tests
//!
//! `MockConnection` answers statements from a queue of expectations, in order.
//! A statement that does not match the next expectation fails with
//! `MockError::Unexpected`. Transactions started from a mock share its queue.

use crate::connection::{BoxError, Connection, Dialect, Row, Statement, Transaction};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MockError {
    #[error("unexpected statement: expected {expected}, got {actual}")]
    Unexpected { expected: String, actual: String },

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone)]
enum Expectation {
    Query { statement: Statement, rows: Vec<Row> },
    Execute { statement: Statement, affected: u64 },
    Error { statement: Statement, message: String },
    Begin,
    Commit,
    Rollback,
}

impl Expectation {
    fn describe(&self) -> String {
        match self {
            Expectation::Query { statement, .. }
            | Expectation::Execute { statement, .. }
            | Expectation::Error { statement, .. } => describe(statement),
            Expectation::Begin => "BEGIN".to_string(),
            Expectation::Commit => "COMMIT".to_string(),
            Expectation::Rollback => "ROLLBACK".to_string(),
        }
    }
}

fn describe(statement: &Statement) -> String {
    format!("{} {:?}", statement.sql, statement.parameters)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn to_row(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        _ => Row::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Call {
    Query,
    Execute,
}

/// Connection double driven by scripted expectations
#[derive(Debug, Clone)]
pub struct MockConnection {
    dialect: Dialect,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    statements: Arc<Mutex<Vec<Statement>>>,
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnection {
    pub fn new() -> Self {
        Self::with_dialect(Dialect::Postgres)
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            expectations: Arc::new(Mutex::new(VecDeque::new())),
            statements: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Expect a row-returning statement; `rows` are JSON objects
    pub fn expect_query(&self, sql: &str, parameters: Vec<Value>, rows: Vec<Value>) -> &Self {
        self.push(Expectation::Query {
            statement: Statement::new(sql, parameters),
            rows: rows.into_iter().map(to_row).collect(),
        })
    }

    pub fn expect_execute(&self, sql: &str, parameters: Vec<Value>, affected: u64) -> &Self {
        self.push(Expectation::Execute {
            statement: Statement::new(sql, parameters),
            affected,
        })
    }

    /// Expect a statement that fails with `message`, whether queried or executed
    pub fn expect_error(&self, sql: &str, parameters: Vec<Value>, message: &str) -> &Self {
        self.push(Expectation::Error {
            statement: Statement::new(sql, parameters),
            message: message.to_string(),
        })
    }

    pub fn expect_begin(&self) -> &Self {
        self.push(Expectation::Begin)
    }

    pub fn expect_commit(&self) -> &Self {
        self.push(Expectation::Commit)
    }

    pub fn expect_rollback(&self) -> &Self {
        self.push(Expectation::Rollback)
    }

    /// Statements run through this handle, in order
    pub fn statements(&self) -> Vec<Statement> {
        lock(&self.statements).clone()
    }

    /// Expectations not yet consumed, shared with any transactions
    pub fn remaining(&self) -> usize {
        lock(&self.expectations).len()
    }

    fn push(&self, expectation: Expectation) -> &Self {
        lock(&self.expectations).push_back(expectation);
        self
    }

    /// Handle sharing this mock's queue but with its own statement log
    fn fork(&self) -> Self {
        Self {
            dialect: self.dialect,
            expectations: Arc::clone(&self.expectations),
            statements: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn answer(&self, call: Call, statement: &Statement) -> Result<(Vec<Row>, u64), MockError> {
        lock(&self.statements).push(statement.clone());

        let mut expectations = lock(&self.expectations);
        let unexpected = |expected: String| MockError::Unexpected {
            expected,
            actual: describe(statement),
        };

        let matches = match expectations.front() {
            Some(Expectation::Query { statement: e, .. }) => call == Call::Query && e == statement,
            Some(Expectation::Execute { statement: e, .. }) => {
                call == Call::Execute && e == statement
            }
            Some(Expectation::Error { statement: e, .. }) => e == statement,
            Some(other) => return Err(unexpected(other.describe())),
            None => return Err(unexpected("nothing".to_string())),
        };

        if !matches {
            let expected = expectations
                .front()
                .map(Expectation::describe)
                .unwrap_or_default();
            return Err(unexpected(expected));
        }

        match expectations.pop_front() {
            Some(Expectation::Query { rows, .. }) => Ok((rows, 0)),
            Some(Expectation::Execute { affected, .. }) => Ok((Vec::new(), affected)),
            Some(Expectation::Error { message, .. }) => Err(MockError::Failed(message)),
            _ => Err(unexpected("nothing".to_string())),
        }
    }

    fn control(&self, wanted: &str) -> Result<(), MockError> {
        let mut expectations = lock(&self.expectations);
        let next = expectations.front().map(Expectation::describe);

        match next {
            Some(expected) if expected == wanted => {
                expectations.pop_front();
                Ok(())
            }
            expected => Err(MockError::Unexpected {
                expected: expected.unwrap_or_else(|| "nothing".to_string()),
                actual: wanted.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, BoxError> {
        let (_, affected) = self.answer(Call::Execute, statement)?;
        Ok(affected)
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>, BoxError> {
        let (rows, _) = self.answer(Call::Query, statement)?;
        Ok(rows)
    }

    async fn begin(&self) -> Result<Arc<dyn Transaction>, BoxError> {
        self.control("BEGIN")?;
        Ok(Arc::new(MockTransaction {
            inner: self.fork(),
        }))
    }
}

/// Transaction double; statements are logged on the transaction, not its parent
#[derive(Debug, Clone)]
pub struct MockTransaction {
    inner: MockConnection,
}

impl MockTransaction {
    pub fn statements(&self) -> Vec<Statement> {
        self.inner.statements()
    }
}

#[async_trait]
impl Connection for MockTransaction {
    fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, BoxError> {
        self.inner.execute(statement).await
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>, BoxError> {
        self.inner.query(statement).await
    }

    async fn begin(&self) -> Result<Arc<dyn Transaction>, BoxError> {
        self.inner.begin().await
    }
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn commit(&self) -> Result<(), BoxError> {
        Ok(self.inner.control("COMMIT")?)
    }

    async fn rollback(&self) -> Result<(), BoxError> {
        Ok(self.inner.control("ROLLBACK")?)
    }

    fn connection(self: Arc<Self>) -> Arc<dyn Connection> {
        self
    }
}
