// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Local SQLite Engine
//!
//! Embedded file database served through a `sqlx` connection pool.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** `SqlConnection` over a local SQLite file (WAL, foreign keys on)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool,
    SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::{BackendKind, DatabaseError, SqlConnection, SqlRow, SqlValue, Statement};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_CONNECTIONS: u32 = 5;

pub struct LocalConnection {
    pool: SqlitePool,
}

impl LocalConnection {
    /// Open (creating if absent) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DatabaseError::StorageInit(format!("cannot create directory {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::StorageInit(format!("cannot open {}: {e}", path.display())))?;

        Ok(Self { pool })
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Blob(v) => query.bind(v.as_slice()),
        };
    }
    query
}

fn decode_row(row: &SqliteRow, columns: &Arc<[String]>) -> Result<SqlRow, DatabaseError> {
    let mut values = Vec::with_capacity(columns.len());
    for idx in 0..columns.len() {
        let raw = row.try_get_raw(idx).map_err(|e| DatabaseError::Decode(e.to_string()))?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            let decoded = match type_name.as_str() {
                "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(idx).map(SqlValue::Integer),
                "REAL" | "FLOAT" | "DOUBLE" => row.try_get_unchecked::<f64, _>(idx).map(SqlValue::Real),
                "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(idx).map(SqlValue::Blob),
                _ => row.try_get_unchecked::<String, _>(idx).map(SqlValue::Text),
            };
            decoded.map_err(|e| DatabaseError::Decode(e.to_string()))?
        };
        values.push(value);
    }
    Ok(SqlRow::new(columns.clone(), values))
}

fn map_error(err: sqlx::Error) -> DatabaseError {
    if let sqlx::Error::Database(db) = &err {
        use sqlx::error::ErrorKind;
        if matches!(
            db.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        ) {
            return DatabaseError::Constraint(db.message().to_string());
        }
    }
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DatabaseError::Connection(err.to_string())
        }
        other => DatabaseError::Query(other.to_string()),
    }
}

#[async_trait]
impl SqlConnection for LocalConnection {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, DatabaseError> {
        let result = bind_params(sqlx::query(&statement.sql), &statement.params)
            .execute(&self.pool)
            .await
            .map_err(map_error)?;
        Ok(result.rows_affected())
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<SqlRow>, DatabaseError> {
        let rows = bind_params(sqlx::query(&statement.sql), &statement.params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_error)?;

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Arc<[String]> = first.columns().iter().map(|c| c.name().to_string()).collect();
        rows.iter().map(|row| decode_row(row, &columns)).collect()
    }

    async fn transaction(&self, statements: &[Statement]) -> Result<Vec<u64>, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(map_error)?;
        let mut affected = Vec::with_capacity(statements.len());
        for statement in statements {
            let result = bind_params(sqlx::query(&statement.sql), &statement.params)
                .execute(&mut *tx)
                .await
                .map_err(map_error)?;
            affected.push(result.rows_affected());
        }
        tx.commit().await.map_err(map_error)?;
        Ok(affected)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(map_error)?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_file_and_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("invoice.db");

        let conn = LocalConnection::open(&path).await.unwrap();
        conn.ping().await.unwrap();
        assert!(path.exists());
        conn.close().await;
    }

    #[tokio::test]
    async fn test_values_round_trip_through_sqlite() {
        let dir = TempDir::new().unwrap();
        let conn = LocalConnection::open(&dir.path().join("t.db")).await.unwrap();

        conn.execute(&Statement::new("CREATE TABLE t (a TEXT, b INTEGER, c REAL, d BLOB, e TEXT)"))
            .await
            .unwrap();
        let inserted = conn
            .execute(
                &Statement::new("INSERT INTO t VALUES (?, ?, ?, ?, ?)")
                    .bind("x")
                    .bind(7i64)
                    .bind(SqlValue::Real(1.5))
                    .bind(SqlValue::Blob(vec![1, 2]))
                    .bind(None::<String>),
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let rows = conn.query(&Statement::new("SELECT a, b, c, d, e FROM t")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("a").unwrap(), "x");
        assert_eq!(rows[0].integer("b").unwrap(), 7);
        assert_eq!(rows[0].value("c").unwrap(), &SqlValue::Real(1.5));
        assert_eq!(rows[0].value("d").unwrap(), &SqlValue::Blob(vec![1, 2]));
        assert_eq!(rows[0].opt_text("e").unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_transaction_rolls_back() {
        let dir = TempDir::new().unwrap();
        let conn = LocalConnection::open(&dir.path().join("t.db")).await.unwrap();
        conn.execute(&Statement::new("CREATE TABLE t (id TEXT PRIMARY KEY)")).await.unwrap();

        let result = conn
            .transaction(&[
                Statement::new("INSERT INTO t VALUES (?)").bind("a"),
                Statement::new("INSERT INTO t VALUES (?)").bind("a"),
            ])
            .await;
        assert!(matches!(result, Err(DatabaseError::Constraint(_))));

        let rows = conn.query(&Statement::new("SELECT id FROM t")).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_path_is_storage_init_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let result = LocalConnection::open(&blocker.join("invoice.db")).await;
        assert!(matches!(result, Err(DatabaseError::StorageInit(_))));
    }
}
