//! Core Persister functionality
//!
//! This module contains the `Database` handle: it opens the connection pool
//! for the configured driver and hands out repositories and transactions bound to it.

use repository::{Connection, Model, Repository, Transaction};
use sqlx::pool::PoolOptions;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{PgPool, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::DatabaseError;
use crate::postgres::PgConnection;
use crate::sqlite::SqliteConnection;
use config::{AppConfig, DatabaseConfig};

#[derive(Debug, Clone)]
enum Backend {
    Postgres(Arc<PgConnection>),
    Sqlite(Arc<SqliteConnection>),
}

/// Main Persister handle that owns the connection pool
#[derive(Debug, Clone)]
pub struct Database {
    backend: Backend,
}

impl Database {
    /// Open a pool for the configured driver
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let database = if config.is_sqlite() {
            let options = sqlite_connect_options(config)?;
            let pool = pool_options(config).connect_with(options).await?;
            Self::from_sqlite_pool(pool, config.debug)
        } else {
            let options = connect_options(config)?;
            let pool = pool_options(config).connect_with(options).await?;
            Self::from_pool(pool, config.debug)
        };

        tracing::info!(driver = %config.driver, database = %config.name, "connected to database");
        Ok(database)
    }

    /// Load `AppConfig` (`.env`, `PERSISTER_CONFIG`, `./persister.toml`) and connect
    pub async fn from_env() -> Result<Self, DatabaseError> {
        let config = AppConfig::load()?;
        Self::connect(&config.database).await
    }

    /// Wrap an existing PostgreSQL pool
    pub fn from_pool(pool: PgPool, debug: bool) -> Self {
        Self {
            backend: Backend::Postgres(Arc::new(PgConnection::new(pool, debug))),
        }
    }

    /// Wrap an existing SQLite pool
    pub fn from_sqlite_pool(pool: SqlitePool, debug: bool) -> Self {
        Self {
            backend: Backend::Sqlite(Arc::new(SqliteConnection::new(pool, debug))),
        }
    }

    /// PostgreSQL pool reference, if that is the driver in use
    pub fn pool(&self) -> Option<&PgPool> {
        match &self.backend {
            Backend::Postgres(connection) => Some(connection.pool()),
            Backend::Sqlite(_) => None,
        }
    }

    /// SQLite pool reference, if that is the driver in use
    pub fn sqlite_pool(&self) -> Option<&SqlitePool> {
        match &self.backend {
            Backend::Sqlite(connection) => Some(connection.pool()),
            Backend::Postgres(_) => None,
        }
    }

    /// The pool as a repository connection
    pub fn connection(&self) -> Arc<dyn Connection> {
        match &self.backend {
            Backend::Postgres(connection) => connection.clone(),
            Backend::Sqlite(connection) => connection.clone(),
        }
    }

    /// A fresh repository for `M` on the pool
    pub fn repository<M: Model>(&self) -> Repository<M> {
        Repository::new(self.connection())
    }

    /// Start a transaction; pass `tx.connection()` to `Persister::part_of`
    pub async fn transaction(&self) -> Result<Arc<dyn Transaction>, DatabaseError> {
        let tx: Arc<dyn Transaction> = match &self.backend {
            Backend::Postgres(connection) => Arc::new(connection.begin_transaction().await?),
            Backend::Sqlite(connection) => Arc::new(connection.begin_transaction().await?),
        };
        Ok(tx)
    }

    /// Run a statement outside the repository layer (schema setup and the like)
    pub async fn execute_sql(&self, sql: &str) -> Result<u64, DatabaseError> {
        let affected = match &self.backend {
            Backend::Postgres(connection) => {
                sqlx::query(sql).execute(connection.pool()).await?.rows_affected()
            }
            Backend::Sqlite(connection) => {
                sqlx::query(sql).execute(connection.pool()).await?.rows_affected()
            }
        };
        Ok(affected)
    }

    /// Check database connection health
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        match &self.backend {
            Backend::Postgres(connection) => {
                sqlx::query("SELECT 1").fetch_one(connection.pool()).await?;
            }
            Backend::Sqlite(connection) => {
                sqlx::query("SELECT 1").fetch_one(connection.pool()).await?;
            }
        }
        Ok(())
    }
}

fn pool_options<DB: sqlx::Database>(config: &DatabaseConfig) -> PoolOptions<DB> {
    let mut pool_options = PoolOptions::<DB>::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

    if config.connection_timeout_seconds > 0 {
        pool_options =
            pool_options.acquire_timeout(Duration::from_secs(config.connection_timeout_seconds));
    }

    // Set max lifetime if specified
    if config.max_lifetime_seconds > 0 {
        pool_options = pool_options.max_lifetime(Duration::from_secs(config.max_lifetime_seconds));
    }

    pool_options
}

/// PostgreSQL connection options
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, DatabaseError> {
    if !config.is_postgres() {
        return Err(DatabaseError::UnsupportedDriver(config.driver.clone()));
    }

    if config.name.is_empty() {
        return Err(DatabaseError::MissingName);
    }

    let mut options = PgConnectOptions::new()
        .database(&config.name)
        .options([("TimeZone", "UTC")]);

    if let Some(socket) = &config.socket {
        options = options.socket(socket);
    } else if !config.host.is_empty() {
        options = options.host(&config.host);
    }

    if config.port > 0 {
        options = options.port(config.port);
    }

    if !config.username.is_empty() {
        options = options.username(&config.username);
    }

    if !config.password.is_empty() {
        options = options.password(&config.password);
    }

    if config.ssl_disabled() {
        options = options.ssl_mode(PgSslMode::Disable);
    }

    Ok(options)
}

/// SQLite connection options; `name` is a file path (created when missing) or `:memory:`
pub fn sqlite_connect_options(
    config: &DatabaseConfig,
) -> Result<SqliteConnectOptions, DatabaseError> {
    if !config.is_sqlite() {
        return Err(DatabaseError::UnsupportedDriver(config.driver.clone()));
    }

    if config.name.is_empty() {
        return Err(DatabaseError::MissingName);
    }

    let options = SqliteConnectOptions::from_str(&config.connection_string())?
        .create_if_missing(true)
        .foreign_keys(true);

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DatabaseConfig {
        DatabaseConfig::new(
            "localhost".to_string(),
            5432,
            "persister".to_string(),
            "postgres".to_string(),
            "password".to_string(),
            1,
            5,
            30,
            600,
            3600,
        )
    }

    #[test]
    fn test_unsupported_driver() {
        let mut config = sample();
        config.driver = "oracle".to_string();

        let error = connect_options(&config).unwrap_err();
        assert_eq!(error.to_string(), "unsupported database type requested: oracle");
    }

    #[test]
    fn test_driver_names_are_case_insensitive() {
        let mut config = sample();
        config.driver = "PostgreSQL".to_string();

        assert!(connect_options(&config).is_ok());
    }

    #[test]
    fn test_missing_database_name() {
        let mut config = sample();
        config.name = String::new();

        let error = connect_options(&config).unwrap_err();
        assert!(matches!(error, DatabaseError::MissingName));
    }

    #[test]
    fn test_connect_options() {
        let mut config = sample();
        config.port = 5433;
        config.sslmode = Some("disabled".to_string());

        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("persister"));
        assert_eq!(options.get_username(), "postgres");
    }

    #[test]
    fn test_sqlite_connect_options() {
        let mut config = sample();
        config.driver = "sqlite3".to_string();
        config.name = ":memory:".to_string();

        assert!(sqlite_connect_options(&config).is_ok());
        assert!(matches!(
            connect_options(&config),
            Err(DatabaseError::UnsupportedDriver(_))
        ));
        assert!(matches!(
            sqlite_connect_options(&sample()),
            Err(DatabaseError::UnsupportedDriver(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_sqlite_in_memory() {
        let mut config = sample();
        config.driver = "sqlite".to_string();
        config.name = ":memory:".to_string();
        config.max_lifetime_seconds = 0;

        let database = Database::connect(&config).await.unwrap();
        database.health_check().await.unwrap();

        assert!(database.pool().is_none());
        assert!(database.sqlite_pool().is_some());
        assert_eq!(database.connection().dialect(), repository::Dialect::Sqlite);
    }
}
