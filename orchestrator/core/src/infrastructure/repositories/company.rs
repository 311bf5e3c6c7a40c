// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;

use super::{format_timestamp, parse_timestamp};
use crate::domain::company::{Company, CompanyId};
use crate::domain::repository::{CompanyRepository, RepositoryError};
use crate::infrastructure::database::{Database, SqlRow, Statement};

const COLUMNS: &str = "id, name, tax_id, email, phone, address, created_at, updated_at";

pub struct SqlCompanyRepository {
    db: Database,
}

impl SqlCompanyRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn from_row(row: &SqlRow) -> Result<Company, RepositoryError> {
    Ok(Company {
        id: CompanyId::from_string(&row.text("id")?)?,
        name: row.text("name")?,
        tax_id: row.opt_text("tax_id")?,
        email: row.opt_text("email")?,
        phone: row.opt_text("phone")?,
        address: row.opt_text("address")?,
        created_at: parse_timestamp(&row.text("created_at")?)?,
        updated_at: parse_timestamp(&row.text("updated_at")?)?,
    })
}

#[async_trait]
impl CompanyRepository for SqlCompanyRepository {
    async fn insert(&self, company: &Company) -> Result<(), RepositoryError> {
        self.db
            .execute(
                Statement::new(format!("INSERT INTO companies ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"))
                    .bind(company.id.to_string())
                    .bind(company.name.as_str())
                    .bind(company.tax_id.clone())
                    .bind(company.email.clone())
                    .bind(company.phone.clone())
                    .bind(company.address.clone())
                    .bind(format_timestamp(&company.created_at))
                    .bind(format_timestamp(&company.updated_at)),
            )
            .await?;
        Ok(())
    }

    async fn update(&self, company: &Company) -> Result<(), RepositoryError> {
        let affected = self
            .db
            .execute(
                Statement::new(
                    "UPDATE companies SET name = ?, tax_id = ?, email = ?, phone = ?, address = ?, updated_at = ? \
                     WHERE id = ?",
                )
                .bind(company.name.as_str())
                .bind(company.tax_id.clone())
                .bind(company.email.clone())
                .bind(company.phone.clone())
                .bind(company.address.clone())
                .bind(format_timestamp(&company.updated_at))
                .bind(company.id.to_string()),
            )
            .await?;
        if affected == 0 {
            return Err(RepositoryError::NotFound(format!("company {}", company.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: CompanyId) -> Result<Option<Company>, RepositoryError> {
        self.db
            .query_one(Statement::new(format!("SELECT {COLUMNS} FROM companies WHERE id = ?")).bind(id.to_string()))
            .await?
            .as_ref()
            .map(from_row)
            .transpose()
    }

    async fn list_all(&self) -> Result<Vec<Company>, RepositoryError> {
        self.db
            .query(Statement::new(format!("SELECT {COLUMNS} FROM companies ORDER BY name COLLATE NOCASE, id")))
            .await?
            .iter()
            .map(from_row)
            .collect()
    }

    async fn delete(&self, id: CompanyId) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .execute(Statement::new("DELETE FROM companies WHERE id = ?").bind(id.to_string()))
            .await?;
        Ok(affected > 0)
    }
}
