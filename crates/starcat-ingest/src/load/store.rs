//! Database seam for the catalog loader

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, MySql};
use tracing::debug;

use crate::value::SqlValue;

/// Error types for database access
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open database session: {0}")]
    Connect(String),

    #[error("Row rejected: {0}")]
    Rejected(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connection parameters for the destination database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "gaia".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);

        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }
}

/// Source of independent database sessions, one per loader worker
#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    type Session: RowSession;

    async fn open_session(&self) -> Result<Self::Session, StoreError>;
}

/// A single session; each insert commits on its own
#[async_trait]
pub trait RowSession: Send {
    async fn insert_row(&mut self, statement: &str, values: &[SqlValue]) -> Result<(), StoreError>;

    async fn close(self) -> Result<(), StoreError>;
}

/// MySQL/MariaDB store
#[derive(Debug, Clone)]
pub struct MySqlStore {
    options: MySqlConnectOptions,
}

impl MySqlStore {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            options: config.connect_options(),
        }
    }
}

#[async_trait]
impl CatalogStore for MySqlStore {
    type Session = MySqlSession;

    async fn open_session(&self) -> Result<MySqlSession, StoreError> {
        let conn = MySqlConnection::connect_with(&self.options)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        debug!("Opened database session");
        Ok(MySqlSession { conn })
    }
}

/// One MySQL connection in autocommit mode
pub struct MySqlSession {
    conn: MySqlConnection,
}

impl MySqlSession {
    /// Run a statement with no parameters, e.g. generated DDL
    pub async fn execute(&mut self, statement: &str) -> Result<u64, StoreError> {
        let result = sqlx::query::<MySql>(statement).execute(&mut self.conn).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RowSession for MySqlSession {
    async fn insert_row(&mut self, statement: &str, values: &[SqlValue]) -> Result<(), StoreError> {
        let mut query = sqlx::query::<MySql>(statement);
        for value in values {
            query = match value {
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::Float(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.clone()),
                SqlValue::Null => query.bind(None::<String>),
            };
        }

        query.execute(&mut self.conn).await.map_err(|e| match e {
            sqlx::Error::Database(db) => StoreError::Rejected(db.to_string()),
            other => StoreError::Database(other),
        })?;
        Ok(())
    }

    async fn close(self) -> Result<(), StoreError> {
        self.conn.close().await?;
        Ok(())
    }
}
