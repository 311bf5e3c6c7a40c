// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root: one repository per aggregate,
//! interface defined in the domain layer, implemented once in
//! `crate::infrastructure::repositories` against the backend-agnostic
//! [`Database`](crate::infrastructure::database::Database) handle.
//!
//! | Trait | Aggregate | Implementation |
//! |-------|-----------|----------------|
//! | `CategoryRepository` | `Category` | `SqlCategoryRepository` |
//! | `CompanyRepository` | `Company` | `SqlCompanyRepository` |
//! | `InvoiceRepository` | `Invoice` | `SqlInvoiceRepository` |
//!
//! Which relational backend sits underneath (local SQLite file or remote libSQL)
//! is decided once at startup and invisible at this level.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::category::{Category, CategoryId};
use crate::domain::company::{Company, CompanyId};
use crate::domain::invoice::{Invoice, InvoiceFilter, InvoiceId};

/// Repository interface for Category aggregates
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn insert(&self, category: &Category) -> Result<(), RepositoryError>;

    async fn update(&self, category: &Category) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError>;

    /// Case-insensitive lookup
    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError>;

    /// All categories ordered by name
    async fn list_all(&self) -> Result<Vec<Category>, RepositoryError>;

    /// Returns `false` when no row matched
    async fn delete(&self, id: CategoryId) -> Result<bool, RepositoryError>;
}

/// Repository interface for Company aggregates
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn insert(&self, company: &Company) -> Result<(), RepositoryError>;

    async fn update(&self, company: &Company) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: CompanyId) -> Result<Option<Company>, RepositoryError>;

    /// All companies ordered by name
    async fn list_all(&self) -> Result<Vec<Company>, RepositoryError>;

    async fn delete(&self, id: CompanyId) -> Result<bool, RepositoryError>;
}

/// Repository interface for Invoice aggregates, line items included.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Persist a new invoice together with its items atomically
    async fn insert(&self, invoice: &Invoice) -> Result<(), RepositoryError>;

    /// Replace the stored invoice and its items atomically, provided the stored
    /// row still carries `expected_updated_at`. A row changed in between yields
    /// [`RepositoryError::Conflict`].
    async fn update(
        &self,
        invoice: &Invoice,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: InvoiceId) -> Result<Option<Invoice>, RepositoryError>;

    async fn find_by_number(&self, number: &str) -> Result<Option<Invoice>, RepositoryError>;

    /// Matching invoices ordered by issue date (newest first), then number
    async fn list(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, RepositoryError>;

    async fn delete(&self, id: InvoiceId) -> Result<bool, RepositoryError>;

    async fn exists_for_company(&self, id: CompanyId) -> Result<bool, RepositoryError>;

    async fn exists_for_category(&self, id: CategoryId) -> Result<bool, RepositoryError>;
}

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// A uniqueness or referential constraint rejected the write
    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<uuid::Error> for RepositoryError {
    fn from(err: uuid::Error) -> Self {
        RepositoryError::Serialization(format!("invalid stored identifier: {err}"))
    }
}

impl From<chrono::ParseError> for RepositoryError {
    fn from(err: chrono::ParseError) -> Self {
        RepositoryError::Serialization(format!("invalid stored date: {err}"))
    }
}
