// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;

use super::{format_timestamp, parse_timestamp};
use crate::domain::category::{Category, CategoryId};
use crate::domain::repository::{CategoryRepository, RepositoryError};
use crate::infrastructure::database::{Database, SqlRow, Statement};

const COLUMNS: &str = "id, name, description, created_at, updated_at";

pub struct SqlCategoryRepository {
    db: Database,
}

impl SqlCategoryRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn from_row(row: &SqlRow) -> Result<Category, RepositoryError> {
    Ok(Category {
        id: CategoryId::from_string(&row.text("id")?)?,
        name: row.text("name")?,
        description: row.opt_text("description")?,
        created_at: parse_timestamp(&row.text("created_at")?)?,
        updated_at: parse_timestamp(&row.text("updated_at")?)?,
    })
}

#[async_trait]
impl CategoryRepository for SqlCategoryRepository {
    async fn insert(&self, category: &Category) -> Result<(), RepositoryError> {
        self.db
            .execute(
                Statement::new(format!("INSERT INTO categories ({COLUMNS}) VALUES (?, ?, ?, ?, ?)"))
                    .bind(category.id.to_string())
                    .bind(category.name.as_str())
                    .bind(category.description.clone())
                    .bind(format_timestamp(&category.created_at))
                    .bind(format_timestamp(&category.updated_at)),
            )
            .await?;
        Ok(())
    }

    async fn update(&self, category: &Category) -> Result<(), RepositoryError> {
        let affected = self
            .db
            .execute(
                Statement::new("UPDATE categories SET name = ?, description = ?, updated_at = ? WHERE id = ?")
                    .bind(category.name.as_str())
                    .bind(category.description.clone())
                    .bind(format_timestamp(&category.updated_at))
                    .bind(category.id.to_string()),
            )
            .await?;
        if affected == 0 {
            return Err(RepositoryError::NotFound(format!("category {}", category.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        self.db
            .query_one(Statement::new(format!("SELECT {COLUMNS} FROM categories WHERE id = ?")).bind(id.to_string()))
            .await?
            .as_ref()
            .map(from_row)
            .transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        self.db
            .query_one(
                Statement::new(format!("SELECT {COLUMNS} FROM categories WHERE name = ? COLLATE NOCASE"))
                    .bind(name),
            )
            .await?
            .as_ref()
            .map(from_row)
            .transpose()
    }

    async fn list_all(&self) -> Result<Vec<Category>, RepositoryError> {
        self.db
            .query(Statement::new(format!("SELECT {COLUMNS} FROM categories ORDER BY name COLLATE NOCASE, id")))
            .await?
            .iter()
            .map(from_row)
            .collect()
    }

    async fn delete(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .execute(Statement::new("DELETE FROM categories WHERE id = ?").bind(id.to_string()))
            .await?;
        Ok(affected > 0)
    }
}
