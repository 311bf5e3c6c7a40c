// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::application::error::ServiceError;
use crate::domain::category::{Category, CategoryId, CategoryPatch, NewCategory};
use crate::domain::repository::{CategoryRepository, InvoiceRepository};

#[async_trait]
pub trait CategoryService: Send + Sync {
    async fn create_category(&self, input: NewCategory) -> Result<Category, ServiceError>;
    async fn get_category(&self, id: CategoryId) -> Result<Category, ServiceError>;
    async fn update_category(
        &self,
        id: CategoryId,
        patch: CategoryPatch,
    ) -> Result<Category, ServiceError>;
    async fn delete_category(&self, id: CategoryId) -> Result<(), ServiceError>;
    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError>;
}

pub struct StandardCategoryService {
    categories: Arc<dyn CategoryRepository>,
    invoices: Arc<dyn InvoiceRepository>,
}

impl StandardCategoryService {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        invoices: Arc<dyn InvoiceRepository>,
    ) -> Self {
        Self { categories, invoices }
    }

    async fn ensure_name_free(
        &self,
        name: &str,
        except: Option<CategoryId>,
    ) -> Result<(), ServiceError> {
        match self.categories.find_by_name(name).await? {
            Some(existing) if Some(existing.id) != except => Err(ServiceError::Conflict(format!(
                "a category named '{}' already exists",
                existing.name
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CategoryService for StandardCategoryService {
    async fn create_category(&self, input: NewCategory) -> Result<Category, ServiceError> {
        let category = Category::new(input)?;
        self.ensure_name_free(&category.name, None).await?;
        self.categories.insert(&category).await?;
        info!(category_id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Category, ServiceError> {
        self.categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("category {id}")))
    }

    async fn update_category(
        &self,
        id: CategoryId,
        patch: CategoryPatch,
    ) -> Result<Category, ServiceError> {
        let mut category = self.get_category(id).await?;
        category.apply(patch)?;
        self.ensure_name_free(&category.name, Some(id)).await?;
        self.categories.update(&category).await?;
        Ok(category)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), ServiceError> {
        if self.invoices.exists_for_category(id).await? {
            return Err(ServiceError::Conflict(format!(
                "category {id} is still referenced by invoices"
            )));
        }
        if !self.categories.delete(id).await? {
            return Err(ServiceError::NotFound(format!("category {id}")));
        }
        info!(category_id = %id, "Category deleted");
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        Ok(self.categories.list_all().await?)
    }
}
