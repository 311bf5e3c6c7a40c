// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Embedded schema migrations
//!
//! Applied in version order by `Database::open`. Each pending migration runs in
//! one transaction together with its `schema_migrations` bookkeeping row, so a
//! failed migration leaves no partial schema behind. Re-running is a no-op.

use std::collections::HashSet;

use chrono::Utc;
use tracing::info;

use super::{DatabaseError, SqlConnection, Statement};

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        statements: &[
            r#"CREATE TABLE categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL COLLATE NOCASE UNIQUE,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )"#,
            r#"CREATE TABLE companies (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                tax_id TEXT,
                email TEXT,
                phone TEXT,
                address TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )"#,
            r#"CREATE TABLE invoices (
                id TEXT PRIMARY KEY,
                number TEXT NOT NULL UNIQUE,
                company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE RESTRICT,
                category_id TEXT REFERENCES categories(id) ON DELETE RESTRICT,
                issue_date TEXT NOT NULL,
                due_date TEXT,
                currency TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('draft', 'sent', 'paid', 'cancelled')),
                notes TEXT,
                total_cents INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )"#,
            r#"CREATE TABLE invoice_items (
                invoice_id TEXT NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                description TEXT NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity >= 1),
                unit_price_cents INTEGER NOT NULL CHECK (unit_price_cents >= 0),
                PRIMARY KEY (invoice_id, position)
            )"#,
            "CREATE INDEX idx_invoices_company_id ON invoices(company_id)",
            "CREATE INDEX idx_invoices_category_id ON invoices(category_id)",
            "CREATE INDEX idx_invoices_issue_date ON invoices(issue_date DESC, number)",
        ],
    },
    Migration {
        version: 2,
        name: "invoice_attachments",
        statements: &[
            "ALTER TABLE invoices ADD COLUMN attachment_key TEXT",
            "ALTER TABLE invoices ADD COLUMN attachment_filename TEXT",
            "ALTER TABLE invoices ADD COLUMN attachment_content_type TEXT",
            "ALTER TABLE invoices ADD COLUMN attachment_size_bytes INTEGER",
            "ALTER TABLE invoices ADD COLUMN attachment_uploaded_at TEXT",
        ],
    },
];

const CREATE_BOOKKEEPING: &str = r#"CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
)"#;

/// Apply every migration not yet recorded. Returns how many were applied.
pub async fn run_migrations(connection: &dyn SqlConnection) -> Result<usize, DatabaseError> {
    connection.execute(&Statement::new(CREATE_BOOKKEEPING)).await?;

    let applied: HashSet<i64> = connection
        .query(&Statement::new("SELECT version FROM schema_migrations"))
        .await?
        .iter()
        .map(|row| row.integer("version"))
        .collect::<Result<_, _>>()?;

    let mut count = 0;
    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        let mut statements: Vec<Statement> =
            migration.statements.iter().map(|sql| Statement::new(*sql)).collect();
        statements.push(
            Statement::new("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .bind(Utc::now().to_rfc3339()),
        );

        connection
            .transaction(&statements)
            .await
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                name: migration.name,
                reason: e.to_string(),
            })?;
        info!(version = migration.version, name = migration.name, "Applied migration");
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::LocalConnection;
    use tempfile::TempDir;

    #[test]
    fn test_versions_are_strictly_increasing() {
        let versions: Vec<i64> = MIGRATIONS.iter().map(|m| m.version).collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_migrations_apply_once() {
        let dir = TempDir::new().unwrap();
        let conn = LocalConnection::open(&dir.path().join("m.db")).await.unwrap();

        assert_eq!(run_migrations(&conn).await.unwrap(), MIGRATIONS.len());
        assert_eq!(run_migrations(&conn).await.unwrap(), 0);

        let rows = conn
            .query(&Statement::new("SELECT version, name FROM schema_migrations ORDER BY version"))
            .await
            .unwrap();
        assert_eq!(rows.len(), MIGRATIONS.len());
        assert_eq!(rows[0].text("name").unwrap(), "initial_schema");
    }
}
