// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! SQL Invoice Repository
//!
//! Invoices live in `invoices`, their line items in `invoice_items` keyed by
//! `(invoice_id, position)`. Writes touching both tables go through one
//! transaction so readers never observe an invoice without its items.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `InvoiceRepository` over the shared `Database` handle

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{format_date, format_timestamp, parse_date, parse_timestamp};
use crate::domain::category::CategoryId;
use crate::domain::company::CompanyId;
use crate::domain::invoice::{Attachment, Invoice, InvoiceFilter, InvoiceId, InvoiceItem};
use crate::domain::repository::{InvoiceRepository, RepositoryError};
use crate::domain::validation::ValidationError;
use crate::infrastructure::database::{Database, SqlRow, SqlValue, Statement};

const COLUMNS: &str = "id, number, company_id, category_id, issue_date, due_date, currency, \
    status, notes, total_cents, attachment_key, attachment_filename, attachment_content_type, \
    attachment_size_bytes, attachment_uploaded_at, created_at, updated_at";

/// Invoice ids bound per item lookup; SQLite builds before 3.32 cap parameters at 999.
const ITEM_LOOKUP_CHUNK: usize = 500;

/// True while the invoice row carries the version just written by the same transaction.
const WRITTEN_VERSION: &str = "EXISTS (SELECT 1 FROM invoices WHERE id = ? AND updated_at = ?)";

pub struct SqlInvoiceRepository {
    db: Database,
}

impl SqlInvoiceRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Load items for the given invoices, grouped by invoice id in position order.
    /// Ids are looked up in chunks to stay below the engine's bound-parameter limit.
    async fn load_items(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<InvoiceItem>>, RepositoryError> {
        let mut grouped: HashMap<String, Vec<InvoiceItem>> = HashMap::new();
        for chunk in ids.chunks(ITEM_LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut statement = Statement::new(format!(
                "SELECT invoice_id, description, quantity, unit_price_cents FROM invoice_items \
                 WHERE invoice_id IN ({placeholders}) ORDER BY invoice_id, position"
            ));
            for id in chunk {
                statement = statement.bind(id.as_str());
            }

            for row in self.db.query(statement).await? {
                let quantity = u32::try_from(row.integer("quantity")?).map_err(|_| {
                    RepositoryError::Serialization("stored quantity out of range".to_string())
                })?;
                grouped.entry(row.text("invoice_id")?).or_default().push(InvoiceItem {
                    description: row.text("description")?,
                    quantity,
                    unit_price_cents: row.integer("unit_price_cents")?,
                });
            }
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<SqlRow>) -> Result<Vec<Invoice>, RepositoryError> {
        let ids = rows.iter().map(|r| r.text("id")).collect::<Result<Vec<_>, _>>()?;
        let mut items = self.load_items(&ids).await?;
        rows.iter()
            .map(|row| -> Result<Invoice, RepositoryError> {
                let id = row.text("id")?;
                from_row(row, items.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn find_where(
        &self,
        clause: &str,
        value: SqlValue,
    ) -> Result<Option<Invoice>, RepositoryError> {
        let rows = self
            .db
            .query(
                Statement::new(format!("SELECT {COLUMNS} FROM invoices WHERE {clause}")).bind(value),
            )
            .await?;
        Ok(self.hydrate(rows).await?.into_iter().next())
    }

    async fn exists_where(&self, clause: &str, value: String) -> Result<bool, RepositoryError> {
        let row = self
            .db
            .query_one(
                Statement::new(format!(
                    "SELECT EXISTS(SELECT 1 FROM invoices WHERE {clause}) AS found"
                ))
                .bind(value),
            )
            .await?;
        Ok(match row {
            Some(row) => row.integer("found")? != 0,
            None => false,
        })
    }
}

fn from_row(row: &SqlRow, items: Vec<InvoiceItem>) -> Result<Invoice, RepositoryError> {
    let attachment = match row.opt_text("attachment_key")? {
        None => None,
        Some(key) => Some(Attachment {
            key,
            filename: row.text("attachment_filename")?,
            content_type: row.text("attachment_content_type")?,
            size_bytes: u64::try_from(row.integer("attachment_size_bytes")?)
                .map_err(|_| RepositoryError::Serialization("negative attachment size".to_string()))?,
            uploaded_at: parse_timestamp(&row.text("attachment_uploaded_at")?)?,
        }),
    };

    Ok(Invoice {
        id: InvoiceId::from_string(&row.text("id")?)?,
        number: row.text("number")?,
        company_id: CompanyId::from_string(&row.text("company_id")?)?,
        category_id: row
            .opt_text("category_id")?
            .map(|id| CategoryId::from_string(&id))
            .transpose()?,
        issue_date: parse_date(&row.text("issue_date")?)?,
        due_date: row.opt_text("due_date")?.map(|d| parse_date(&d)).transpose()?,
        currency: row.text("currency")?,
        status: row
            .text("status")?
            .parse()
            .map_err(|e: ValidationError| RepositoryError::Serialization(e.0))?,
        items,
        notes: row.opt_text("notes")?,
        attachment,
        total_cents: row.integer("total_cents")?,
        created_at: parse_timestamp(&row.text("created_at")?)?,
        updated_at: parse_timestamp(&row.text("updated_at")?)?,
    })
}

/// Item rows for `invoice`. With `written_version` set, every statement only takes
/// effect if the invoice row holds that `updated_at`, so a rejected header update
/// leaves the stored items alone.
fn item_statements(invoice: &Invoice, written_version: Option<&str>) -> Vec<Statement> {
    let id = invoice.id.to_string();
    let guard = |statement: Statement| match written_version {
        Some(version) => statement.bind(id.as_str()).bind(version),
        None => statement,
    };
    let condition = if written_version.is_some() {
        format!(" WHERE {WRITTEN_VERSION}")
    } else {
        String::new()
    };

    let mut statements = Vec::with_capacity(invoice.items.len() + 1);
    if written_version.is_some() {
        statements.push(guard(
            Statement::new(format!(
                "DELETE FROM invoice_items WHERE invoice_id = ? AND {WRITTEN_VERSION}"
            ))
            .bind(id.as_str()),
        ));
    }
    for (position, item) in invoice.items.iter().enumerate() {
        statements.push(guard(
            Statement::new(format!(
                "INSERT INTO invoice_items (invoice_id, position, description, quantity, \
                 unit_price_cents) SELECT ?, ?, ?, ?, ?{condition}"
            ))
            .bind(id.as_str())
            .bind(position as i64)
            .bind(item.description.as_str())
            .bind(item.quantity)
            .bind(item.unit_price_cents),
        ));
    }
    statements
}

fn attachment_values(invoice: &Invoice) -> [SqlValue; 5] {
    match &invoice.attachment {
        Some(a) => [
            a.key.as_str().into(),
            a.filename.as_str().into(),
            a.content_type.as_str().into(),
            SqlValue::Integer(i64::try_from(a.size_bytes).unwrap_or(i64::MAX)),
            format_timestamp(&a.uploaded_at).into(),
        ],
        None => [SqlValue::Null, SqlValue::Null, SqlValue::Null, SqlValue::Null, SqlValue::Null],
    }
}

#[async_trait]
impl InvoiceRepository for SqlInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<(), RepositoryError> {
        let mut insert = Statement::new(format!(
            "INSERT INTO invoices ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(invoice.id.to_string())
        .bind(invoice.number.as_str())
        .bind(invoice.company_id.to_string())
        .bind(invoice.category_id.map(|c| c.to_string()))
        .bind(format_date(&invoice.issue_date))
        .bind(invoice.due_date.as_ref().map(format_date))
        .bind(invoice.currency.as_str())
        .bind(invoice.status.as_str())
        .bind(invoice.notes.clone())
        .bind(invoice.total_cents);
        for value in attachment_values(invoice) {
            insert = insert.bind(value);
        }
        insert = insert
            .bind(format_timestamp(&invoice.created_at))
            .bind(format_timestamp(&invoice.updated_at));

        let mut statements = vec![insert];
        statements.extend(item_statements(invoice, None));
        self.db.transaction(statements).await?;
        Ok(())
    }

    async fn update(
        &self,
        invoice: &Invoice,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let written_version = format_timestamp(&invoice.updated_at);
        let mut update = Statement::new(
            "UPDATE invoices SET number = ?, company_id = ?, category_id = ?, issue_date = ?, \
             due_date = ?, currency = ?, status = ?, notes = ?, total_cents = ?, \
             attachment_key = ?, attachment_filename = ?, attachment_content_type = ?, \
             attachment_size_bytes = ?, attachment_uploaded_at = ?, updated_at = ? \
             WHERE id = ? AND updated_at = ?",
        )
        .bind(invoice.number.as_str())
        .bind(invoice.company_id.to_string())
        .bind(invoice.category_id.map(|c| c.to_string()))
        .bind(format_date(&invoice.issue_date))
        .bind(invoice.due_date.as_ref().map(format_date))
        .bind(invoice.currency.as_str())
        .bind(invoice.status.as_str())
        .bind(invoice.notes.clone())
        .bind(invoice.total_cents);
        for value in attachment_values(invoice) {
            update = update.bind(value);
        }
        update = update
            .bind(written_version.as_str())
            .bind(invoice.id.to_string())
            .bind(format_timestamp(&expected_updated_at));

        let mut statements = vec![update];
        statements.extend(item_statements(invoice, Some(&written_version)));

        let affected = self.db.transaction(statements).await?;
        if affected.first().copied().unwrap_or(0) == 0 {
            if self.exists_where("id = ?", invoice.id.to_string()).await? {
                return Err(RepositoryError::Conflict(format!(
                    "invoice {} was modified concurrently",
                    invoice.id
                )));
            }
            return Err(RepositoryError::NotFound(format!("invoice {}", invoice.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        self.find_where("id = ?", id.to_string().into()).await
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Invoice>, RepositoryError> {
        self.find_where("number = ?", number.into()).await
    }

    async fn list(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, RepositoryError> {
        let mut conditions = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();
        if let Some(company_id) = filter.company_id {
            conditions.push("company_id = ?");
            params.push(company_id.to_string().into());
        }
        if let Some(category_id) = filter.category_id {
            conditions.push("category_id = ?");
            params.push(category_id.to_string().into());
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(status.as_str().into());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let mut statement = Statement::new(format!(
            "SELECT {COLUMNS} FROM invoices{where_clause} ORDER BY issue_date DESC, number ASC"
        ));
        for param in params {
            statement = statement.bind(param);
        }

        let rows = self.db.query(statement).await?;
        self.hydrate(rows).await
    }

    async fn delete(&self, id: InvoiceId) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .transaction(vec![
                Statement::new("DELETE FROM invoice_items WHERE invoice_id = ?").bind(id.to_string()),
                Statement::new("DELETE FROM invoices WHERE id = ?").bind(id.to_string()),
            ])
            .await?;
        Ok(affected.get(1).copied().unwrap_or(0) > 0)
    }

    async fn exists_for_company(&self, id: CompanyId) -> Result<bool, RepositoryError> {
        self.exists_where("company_id = ?", id.to_string()).await
    }

    async fn exists_for_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        self.exists_where("category_id = ?", id.to_string()).await
    }
}
