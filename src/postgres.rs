//! PostgreSQL implementation of the repository connection capability
//!
//! Every statement is wrapped so each result row comes back as a single JSON
//! object (`row_to_json`), which is the row shape the repository decodes.
//! Parameters are bound from JSON values with the type rules in `bind_json_param!`.

use async_trait::async_trait;
use repository::{BoxError, Connection, Dialect, Row, Statement, Transaction};
use serde_json::Value;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgPool, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::{Postgres, Row as _};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::DatabaseError;
use crate::logging::{log_failure, log_statement};

/// NULL parameter whose type the server infers from context
///
/// Binding a typed NULL (e.g. text) into a timestamp or integer column fails,
/// so nulls go out with the unspecified type OID.
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl<'q> sqlx::Encode<'q, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

// Macro for the shared parameter binding logic
macro_rules! bind_json_param {
    ($query:expr, $param:expr) => {
        match $param {
            Value::String(s) => {
                // Try to parse as RFC3339 timestamp first
                if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&s) {
                    $query.bind(dt.with_timezone(&chrono::Utc))
                // Try to parse as UUID
                } else if let Ok(uuid) = uuid::Uuid::parse_str(&s) {
                    $query.bind(uuid)
                } else {
                    $query.bind(s)
                }
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                        $query.bind(i as i32)
                    } else {
                        $query.bind(i)
                    }
                } else if let Some(f) = n.as_f64() {
                    $query.bind(f)
                } else {
                    $query.bind(n.to_string())
                }
            }
            Value::Bool(b) => $query.bind(b),
            Value::Null => $query.bind(UntypedNull),
            other => $query.bind(sqlx::types::Json(other)),
        }
    };
}

fn bind_parameters<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    parameters: &[Value],
) -> Query<'q, Postgres, PgArguments> {
    for param in parameters.iter().cloned() {
        query = bind_json_param!(query, param);
    }
    query
}

/// Select each result row as one JSON object
///
/// Queries become a derived table projected in place, so their ORDER BY
/// carries through. Writes with RETURNING can only run as a CTE.
fn rows_as_json(sql: &str) -> String {
    let is_query = sql
        .trim_start()
        .get(..6)
        .is_some_and(|keyword| keyword.eq_ignore_ascii_case("SELECT"));

    if is_query {
        format!(
            "SELECT row_to_json(__rows) AS __row FROM ({}) AS __rows",
            sql
        )
    } else {
        format!(
            "WITH __rows AS ({}) SELECT row_to_json(__rows) AS __row FROM __rows",
            sql
        )
    }
}

fn decode_row(row: &PgRow) -> Result<Row, DatabaseError> {
    match row.try_get::<Value, _>("__row")? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::UnexpectedRow(other.to_string())),
    }
}

async fn fetch_rows<'e, E>(executor: E, statement: &Statement) -> Result<Vec<Row>, DatabaseError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let sql = rows_as_json(&statement.sql);
    let rows = bind_parameters(sqlx::query(&sql), &statement.parameters)
        .fetch_all(executor)
        .await?;

    rows.iter().map(decode_row).collect()
}

async fn execute_statement<'e, E>(executor: E, statement: &Statement) -> Result<u64, DatabaseError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = bind_parameters(sqlx::query(&statement.sql), &statement.parameters)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Pool-backed connection handle
#[derive(Debug, Clone)]
pub struct PgConnection {
    pool: PgPool,
    debug: bool,
}

impl PgConnection {
    pub fn new(pool: PgPool, debug: bool) -> Self {
        Self { pool, debug }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Start a transaction with the concrete handle type
    pub async fn begin_transaction(&self) -> Result<PgTransaction, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction {
            inner: Mutex::new(Some(tx)),
            debug: self.debug,
        })
    }
}

#[async_trait]
impl Connection for PgConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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

/// Transaction handle; rolled back on drop unless committed
pub struct PgTransaction {
    inner: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
    debug: bool,
}

impl std::fmt::Debug for PgTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTransaction")
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for PgTransaction {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
impl Transaction for PgTransaction {
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
