//! SQLite implementation of the repository connection capability
//!
//! Rows are decoded column by column from SQLite's storage classes. Integers in
//! a column declared `BOOLEAN` come back as booleans; JSON values are stored and
//! returned as text.

use async_trait::async_trait;
use repository::{BoxError, Connection, Dialect, Row, Statement, Transaction};
use serde_json::{Number, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::DatabaseError;
use crate::logging::{log_failure, log_statement};

fn bind_parameters<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    parameters: &[Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in parameters.iter().cloned() {
        query = match param {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(f) = n.as_f64() {
                    query.bind(f)
                } else {
                    query.bind(n.to_string())
                }
            }
            Value::String(s) => query.bind(s),
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn decode_row(row: &SqliteRow) -> Result<Row, DatabaseError> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let declared = column.type_info().name();
        decoded.insert(
            column.name().to_string(),
            decode_value(row, column.ordinal(), declared)?,
        );
    }
    Ok(decoded)
}

fn decode_value(row: &SqliteRow, index: usize, declared: &str) -> Result<Value, DatabaseError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();

    let value = match storage.as_str() {
        "INTEGER" | "BIGINT" | "BOOLEAN" => {
            let i: i64 = row.try_get_unchecked(index)?;
            if declared.eq_ignore_ascii_case("BOOLEAN") || storage == "BOOLEAN" {
                Value::Bool(i != 0)
            } else {
                Value::from(i)
            }
        }
        "REAL" => {
            let f: f64 = row.try_get_unchecked(index)?;
            Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
        }
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get_unchecked(index)?;
            Value::from(bytes)
        }
        _ => Value::String(row.try_get_unchecked(index)?),
    };

    Ok(value)
}

async fn fetch_rows<'e, E>(executor: E, statement: &Statement) -> Result<Vec<Row>, DatabaseError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = bind_parameters(sqlx::query(&statement.sql), &statement.parameters)
        .fetch_all(executor)
        .await?;

    rows.iter().map(decode_row).collect()
}

async fn execute_statement<'e, E>(executor: E, statement: &Statement) -> Result<u64, DatabaseError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = bind_parameters(sqlx::query(&statement.sql), &statement.parameters)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Pool-backed SQLite connection handle
#[derive(Debug, Clone)]
pub struct SqliteConnection {
    pool: SqlitePool,
    debug: bool,
}

impl SqliteConnection {
    pub fn new(pool: SqlitePool, debug: bool) -> Self {
        Self { pool, debug }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin_transaction(&self) -> Result<SqliteTransaction, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(SqliteTransaction {
            inner: Mutex::new(Some(tx)),
            debug: self.debug,
        })
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, BoxError> {
        log_statement(self.debug, statement);
        log_failure(statement, execute_statement(&self.pool, statement).await)
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>, BoxError> {
        log_statement(self.debug, statement);
        log_failure(statement, fetch_rows(&self.pool, statement).await)
    }

    async fn begin(&self) -> Result<Arc<dyn Transaction>, BoxError> {
        Ok(Arc::new(self.begin_transaction().await?))
    }
}

/// SQLite transaction handle; rolled back on drop unless committed
pub struct SqliteTransaction {
    inner: Mutex<Option<sqlx::Transaction<'static, Sqlite>>>,
    debug: bool,
}

impl std::fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for SqliteTransaction {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, BoxError> {
        log_statement(self.debug, statement);

        let mut guard = self.inner.lock().await;
        let result = match guard.as_mut() {
            Some(tx) => execute_statement(&mut **tx, statement).await,
            None => Err(DatabaseError::TransactionFinished),
        };
        log_failure(statement, result)
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>, BoxError> {
        log_statement(self.debug, statement);

        let mut guard = self.inner.lock().await;
        let result = match guard.as_mut() {
            Some(tx) => fetch_rows(&mut **tx, statement).await,
            None => Err(DatabaseError::TransactionFinished),
        };
        log_failure(statement, result)
    }

    async fn begin(&self) -> Result<Arc<dyn Transaction>, BoxError> {
        Err(DatabaseError::NestedTransaction.into())
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(&self) -> Result<(), BoxError> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(DatabaseError::TransactionFinished)?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), BoxError> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(DatabaseError::TransactionFinished)?;
        tx.rollback().await.map_err(DatabaseError::from)?;
        Ok(())
    }

    fn connection(self: Arc<Self>) -> Arc<dyn Connection> {
        self
    }
}
