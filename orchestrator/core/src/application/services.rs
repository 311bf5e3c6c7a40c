// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Service Bundle - Application Layer
//!
//! Builds the single set of domain services that both protocol surfaces share.
//! Repositories are created here from the opened [`Database`] handle so the domain
//! layer never sees the concrete backend.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Wiring of repositories into `Standard*Service` implementations

use std::sync::Arc;
use std::time::Duration;

use crate::application::category::{CategoryService, StandardCategoryService};
use crate::application::company::{CompanyService, StandardCompanyService};
use crate::application::invoice::{InvoiceService, StandardInvoiceService};
use crate::domain::repository::{CategoryRepository, CompanyRepository, InvoiceRepository};
use crate::domain::storage::ObjectStorageBackend;
use crate::infrastructure::database::Database;
use crate::infrastructure::repositories::{
    SqlCategoryRepository, SqlCompanyRepository, SqlInvoiceRepository,
};

/// Shared handles to every domain service. Cloning is cheap.
#[derive(Clone)]
pub struct DomainServices {
    pub categories: Arc<dyn CategoryService>,
    pub companies: Arc<dyn CompanyService>,
    pub invoices: Arc<dyn InvoiceService>,
}

impl DomainServices {
    pub fn new(
        database: &Database,
        object_storage: ObjectStorageBackend,
        presign_ttl: Duration,
    ) -> Self {
        let categories: Arc<dyn CategoryRepository> =
            Arc::new(SqlCategoryRepository::new(database.clone()));
        let companies: Arc<dyn CompanyRepository> =
            Arc::new(SqlCompanyRepository::new(database.clone()));
        let invoices: Arc<dyn InvoiceRepository> =
            Arc::new(SqlInvoiceRepository::new(database.clone()));

        Self {
            categories: Arc::new(StandardCategoryService::new(
                categories.clone(),
                invoices.clone(),
            )),
            companies: Arc::new(StandardCompanyService::new(companies.clone(), invoices.clone())),
            invoices: Arc::new(StandardInvoiceService::new(
                invoices,
                companies,
                categories,
                object_storage,
                presign_ttl,
            )),
        }
    }

    /// Assemble from already-built services (spies, fakes).
    pub fn from_parts(
        categories: Arc<dyn CategoryService>,
        companies: Arc<dyn CompanyService>,
        invoices: Arc<dyn InvoiceService>,
    ) -> Self {
        Self { categories, companies, invoices }
    }
}
