// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Relational Storage Backend
//!
//! Wraps the two interchangeable relational engines behind one [`Database`]
//! handle that every repository is written against:
//!
//! | Selection | Engine | Module |
//! |-----------|--------|--------|
//! | `Local { path }` | embedded SQLite file via `sqlx` | [`local`] |
//! | `Remote { url, token }` | libSQL / Turso over the HTTP pipeline protocol | [`remote`] |
//!
//! Selection is a pure function of [`DatabaseSettings`] ([`select_backend`]).
//! [`Database::open`] connects and applies pending [`migrations`] before it
//! returns, so a successfully opened handle always sees the current schema.

pub mod local;
pub mod migrations;
pub mod remote;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::config::DatabaseSettings;
use crate::domain::repository::RepositoryError;

pub use local::LocalConnection;
pub use remote::RemoteConnection;

/// Dynamically typed SQL value shared by both engines
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One SQL statement with positional (`?`) parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into(), params: Vec::new() }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Result row addressed by column name
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn value(&self, column: &str) -> Result<&SqlValue, DatabaseError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
            .ok_or_else(|| DatabaseError::Decode(format!("missing column '{column}'")))
    }

    pub fn text(&self, column: &str) -> Result<String, DatabaseError> {
        self.opt_text(column)?
            .ok_or_else(|| DatabaseError::Decode(format!("column '{column}' is NULL")))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, DatabaseError> {
        match self.value(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            SqlValue::Integer(i) => Ok(Some(i.to_string())),
            other => Err(DatabaseError::Decode(format!("column '{column}' is not text: {other:?}"))),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64, DatabaseError> {
        self.opt_integer(column)?
            .ok_or_else(|| DatabaseError::Decode(format!("column '{column}' is NULL")))
    }

    pub fn opt_integer(&self, column: &str) -> Result<Option<i64>, DatabaseError> {
        match self.value(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(i) => Ok(Some(*i)),
            SqlValue::Text(s) => s
                .parse()
                .map(Some)
                .map_err(|_| DatabaseError::Decode(format!("column '{column}' is not an integer"))),
            other => Err(DatabaseError::Decode(format!("column '{column}' is not an integer: {other:?}"))),
        }
    }
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Local database file could not be created or opened
    #[error("storage initialization failed: {0}")]
    StorageInit(String),

    /// Remote endpoint unreachable or credential rejected
    #[error("connection error: {0}")]
    Connection(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("migration {version} ({name}) failed: {reason}")]
    Migration {
        version: i64,
        name: &'static str,
        reason: String,
    },

    #[error("database handle is closed")]
    Closed,
}

impl From<DatabaseError> for RepositoryError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Constraint(msg) => RepositoryError::Conflict(msg),
            DatabaseError::Decode(msg) => RepositoryError::Serialization(msg),
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

/// Engine-neutral connection contract. Implementations are pools or stateless
/// HTTP clients and are safe to share across concurrent requests.
#[async_trait]
pub trait SqlConnection: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Run a statement and return the number of affected rows
    async fn execute(&self, statement: &Statement) -> Result<u64, DatabaseError>;

    async fn query(&self, statement: &Statement) -> Result<Vec<SqlRow>, DatabaseError>;

    /// Run all statements atomically; returns affected rows per statement
    async fn transaction(&self, statements: &[Statement]) -> Result<Vec<u64>, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Local => f.write_str("local"),
            BackendKind::Remote => f.write_str("remote"),
        }
    }
}

/// Outcome of backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSelection {
    Local { path: PathBuf },
    Remote { url: String, token: String },
}

impl BackendSelection {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendSelection::Local { .. } => BackendKind::Local,
            BackendSelection::Remote { .. } => BackendKind::Remote,
        }
    }
}

/// Remote when both URL and token are present and non-blank, local otherwise.
pub fn select_backend(settings: &DatabaseSettings) -> BackendSelection {
    let non_blank = |v: &Option<String>| {
        v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
    };
    match (non_blank(&settings.turso_url), non_blank(&settings.turso_auth_token)) {
        (Some(url), Some(token)) => BackendSelection::Remote { url, token },
        _ => BackendSelection::Local { path: PathBuf::from(&settings.sqlite_path) },
    }
}

/// Process-wide storage readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    Uninitialized,
    Ready(BackendKind),
}

static STORAGE_STATE: OnceLock<BackendKind> = OnceLock::new();

pub fn storage_state() -> StorageState {
    match STORAGE_STATE.get() {
        Some(kind) => StorageState::Ready(*kind),
        None => StorageState::Uninitialized,
    }
}

/// Shared handle to the opened relational backend
#[derive(Clone)]
pub struct Database {
    connection: Arc<dyn SqlConnection>,
    closed: Arc<AtomicBool>,
}

impl Database {
    /// Select, connect and migrate.
    pub async fn open(settings: &DatabaseSettings) -> Result<Self, DatabaseError> {
        Self::open_selection(select_backend(settings)).await
    }

    pub async fn open_selection(selection: BackendSelection) -> Result<Self, DatabaseError> {
        let kind = selection.kind();
        let connection: Arc<dyn SqlConnection> = match selection {
            BackendSelection::Local { path } => {
                info!(backend = %kind, path = %path.display(), "Opening local database");
                Arc::new(LocalConnection::open(&path).await?)
            }
            BackendSelection::Remote { url, token } => {
                info!(backend = %kind, url = %url, "Connecting to remote database");
                Arc::new(RemoteConnection::connect(&url, &token).await?)
            }
        };

        let database = Self::from_connection(connection);
        if let Err(e) = migrations::run_migrations(database.handle().as_ref()).await {
            database.close().await;
            return Err(e);
        }

        if STORAGE_STATE.set(kind).is_ok() {
            info!(backend = %kind, "Storage ready");
        } else {
            debug!(backend = %kind, "Storage already initialized for this process");
        }
        Ok(database)
    }

    /// Wrap an already-connected engine without running migrations.
    pub fn from_connection(connection: Arc<dyn SqlConnection>) -> Self {
        Self { connection, closed: Arc::new(AtomicBool::new(false)) }
    }

    /// Underlying session object shared by all repositories
    pub fn handle(&self) -> &Arc<dyn SqlConnection> {
        &self.connection
    }

    pub fn kind(&self) -> BackendKind {
        self.connection.kind()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn execute(&self, statement: Statement) -> Result<u64, DatabaseError> {
        self.ensure_open()?;
        self.connection.execute(&statement).await
    }

    pub async fn query(&self, statement: Statement) -> Result<Vec<SqlRow>, DatabaseError> {
        self.ensure_open()?;
        self.connection.query(&statement).await
    }

    pub async fn query_one(&self, statement: Statement) -> Result<Option<SqlRow>, DatabaseError> {
        Ok(self.query(statement).await?.into_iter().next())
    }

    pub async fn transaction(&self, statements: Vec<Statement>) -> Result<Vec<u64>, DatabaseError> {
        self.ensure_open()?;
        self.connection.transaction(&statements).await
    }

    pub async fn ping(&self) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.connection.ping().await
    }

    /// Release the backend. Only the first call has an effect.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connection.close().await;
        info!(backend = %self.kind(), "Database closed");
    }

    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.is_closed() {
            Err(DatabaseError::Closed)
        } else {
            Ok(())
        }
    }
}
