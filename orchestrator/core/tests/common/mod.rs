// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;

use invoicer_core::application::category::CategoryService;
use invoicer_core::application::company::CompanyService;
use invoicer_core::application::error::ServiceError;
use invoicer_core::application::invoice::{
    AttachmentLink, AttachmentUpload, InvoiceService, StandardInvoiceService,
};
use invoicer_core::application::services::DomainServices;
use invoicer_core::domain::category::{Category, CategoryId, CategoryPatch, NewCategory};
use invoicer_core::domain::company::{Company, CompanyId, CompanyPatch, NewCompany};
use invoicer_core::domain::invoice::{
    Invoice, InvoiceFilter, InvoiceId, InvoiceItem, InvoicePatch, InvoiceStatus, NewInvoice,
};
use invoicer_core::domain::repository::{InvoiceRepository, RepositoryError};
use invoicer_core::domain::storage::ObjectStorageBackend;
use invoicer_core::infrastructure::database::{BackendSelection, Database};
use invoicer_core::infrastructure::repositories::{
    SqlCategoryRepository, SqlCompanyRepository, SqlInvoiceRepository,
};

pub const PRESIGN_TTL: Duration = Duration::from_secs(900);

pub struct TestContext {
    pub dir: TempDir,
    pub database: Database,
    pub services: DomainServices,
}

/// Fresh SQLite database in a temporary directory.
pub async fn local_context(object_storage: ObjectStorageBackend) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let database = Database::open_selection(BackendSelection::Local { path: dir.path().join("test.db") })
        .await
        .unwrap();
    let services = DomainServices::new(&database, object_storage, PRESIGN_TTL);
    TestContext { dir, database, services }
}

/// Like [`local_context`], but the invoice repository rejects its `fail_on`-th update.
pub async fn flaky_context(object_storage: ObjectStorageBackend, fail_on: usize) -> TestContext {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let invoices: Arc<dyn InvoiceRepository> = Arc::new(FlakyInvoiceRepository {
        inner: SqlInvoiceRepository::new(ctx.database.clone()),
        updates: AtomicUsize::new(0),
        fail_on,
    });
    let services = DomainServices::from_parts(
        ctx.services.categories.clone(),
        ctx.services.companies.clone(),
        Arc::new(StandardInvoiceService::new(
            invoices,
            Arc::new(SqlCompanyRepository::new(ctx.database.clone())),
            Arc::new(SqlCategoryRepository::new(ctx.database.clone())),
            object_storage,
            PRESIGN_TTL,
        )),
    );
    TestContext { services, ..ctx }
}

/// Delegates to the SQL repository but fails one chosen `update` call.
pub struct FlakyInvoiceRepository {
    inner: SqlInvoiceRepository,
    updates: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl InvoiceRepository for FlakyInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<(), RepositoryError> {
        self.inner.insert(invoice).await
    }
    async fn update(
        &self,
        invoice: &Invoice,
        expected: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if self.updates.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(RepositoryError::Database("transient".to_string()));
        }
        self.inner.update(invoice, expected).await
    }
    async fn find_by_id(&self, id: InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        self.inner.find_by_id(id).await
    }
    async fn find_by_number(&self, number: &str) -> Result<Option<Invoice>, RepositoryError> {
        self.inner.find_by_number(number).await
    }
    async fn list(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, RepositoryError> {
        self.inner.list(filter).await
    }
    async fn delete(&self, id: InvoiceId) -> Result<bool, RepositoryError> {
        self.inner.delete(id).await
    }
    async fn exists_for_company(&self, id: CompanyId) -> Result<bool, RepositoryError> {
        self.inner.exists_for_company(id).await
    }
    async fn exists_for_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        self.inner.exists_for_category(id).await
    }
}

pub fn new_company(name: &str) -> NewCompany {
    NewCompany { name: name.to_string(), email: Some("billing@example.com".to_string()), ..Default::default() }
}

pub fn new_invoice(number: &str, company_id: CompanyId) -> NewInvoice {
    NewInvoice {
        number: number.to_string(),
        company_id,
        category_id: None,
        issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        due_date: NaiveDate::from_ymd_opt(2026, 3, 31),
        currency: "EUR".to_string(),
        items: vec![
            InvoiceItem { description: "Consulting".to_string(), quantity: 3, unit_price_cents: 12_000 },
            InvoiceItem { description: "Travel".to_string(), quantity: 1, unit_price_cents: 4_550 },
        ],
        notes: None,
    }
}

/// Counts every call that reaches the service layer, then delegates.
pub struct SpyServices {
    inner: DomainServices,
    calls: Arc<AtomicUsize>,
}

impl SpyServices {
    pub fn wrap(inner: DomainServices) -> (DomainServices, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let spy = Arc::new(SpyServices { inner, calls: calls.clone() });
        (DomainServices::from_parts(spy.clone(), spy.clone(), spy), calls)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CategoryService for SpyServices {
    async fn create_category(&self, input: NewCategory) -> Result<Category, ServiceError> {
        self.hit();
        self.inner.categories.create_category(input).await
    }
    async fn get_category(&self, id: CategoryId) -> Result<Category, ServiceError> {
        self.hit();
        self.inner.categories.get_category(id).await
    }
    async fn update_category(
        &self,
        id: CategoryId,
        patch: CategoryPatch,
    ) -> Result<Category, ServiceError> {
        self.hit();
        self.inner.categories.update_category(id, patch).await
    }
    async fn delete_category(&self, id: CategoryId) -> Result<(), ServiceError> {
        self.hit();
        self.inner.categories.delete_category(id).await
    }
    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        self.hit();
        self.inner.categories.list_categories().await
    }
}

#[async_trait]
impl CompanyService for SpyServices {
    async fn create_company(&self, input: NewCompany) -> Result<Company, ServiceError> {
        self.hit();
        self.inner.companies.create_company(input).await
    }
    async fn get_company(&self, id: CompanyId) -> Result<Company, ServiceError> {
        self.hit();
        self.inner.companies.get_company(id).await
    }
    async fn update_company(
        &self,
        id: CompanyId,
        patch: CompanyPatch,
    ) -> Result<Company, ServiceError> {
        self.hit();
        self.inner.companies.update_company(id, patch).await
    }
    async fn delete_company(&self, id: CompanyId) -> Result<(), ServiceError> {
        self.hit();
        self.inner.companies.delete_company(id).await
    }
    async fn list_companies(&self) -> Result<Vec<Company>, ServiceError> {
        self.hit();
        self.inner.companies.list_companies().await
    }
}

#[async_trait]
impl InvoiceService for SpyServices {
    async fn create_invoice(&self, input: NewInvoice) -> Result<Invoice, ServiceError> {
        self.hit();
        self.inner.invoices.create_invoice(input).await
    }
    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, ServiceError> {
        self.hit();
        self.inner.invoices.get_invoice(id).await
    }
    async fn update_invoice(
        &self,
        id: InvoiceId,
        patch: InvoicePatch,
    ) -> Result<Invoice, ServiceError> {
        self.hit();
        self.inner.invoices.update_invoice(id, patch).await
    }
    async fn delete_invoice(&self, id: InvoiceId) -> Result<(), ServiceError> {
        self.hit();
        self.inner.invoices.delete_invoice(id).await
    }
    async fn list_invoices(&self, filter: InvoiceFilter) -> Result<Vec<Invoice>, ServiceError> {
        self.hit();
        self.inner.invoices.list_invoices(filter).await
    }
    async fn change_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, ServiceError> {
        self.hit();
        self.inner.invoices.change_status(id, status).await
    }
    async fn upload_attachment(
        &self,
        id: InvoiceId,
        upload: AttachmentUpload,
    ) -> Result<Invoice, ServiceError> {
        self.hit();
        self.inner.invoices.upload_attachment(id, upload).await
    }
    async fn attachment_url(&self, id: InvoiceId) -> Result<AttachmentLink, ServiceError> {
        self.hit();
        self.inner.invoices.attachment_url(id).await
    }
    async fn delete_attachment(&self, id: InvoiceId) -> Result<Invoice, ServiceError> {
        self.hit();
        self.inner.invoices.delete_attachment(id).await
    }
}
