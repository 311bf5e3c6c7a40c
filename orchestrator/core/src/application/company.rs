// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::application::error::ServiceError;
use crate::domain::company::{Company, CompanyId, CompanyPatch, NewCompany};
use crate::domain::repository::{CompanyRepository, InvoiceRepository};

#[async_trait]
pub trait CompanyService: Send + Sync {
    async fn create_company(&self, input: NewCompany) -> Result<Company, ServiceError>;
    async fn get_company(&self, id: CompanyId) -> Result<Company, ServiceError>;
    async fn update_company(
        &self,
        id: CompanyId,
        patch: CompanyPatch,
    ) -> Result<Company, ServiceError>;
    async fn delete_company(&self, id: CompanyId) -> Result<(), ServiceError>;
    async fn list_companies(&self) -> Result<Vec<Company>, ServiceError>;
}

pub struct StandardCompanyService {
    companies: Arc<dyn CompanyRepository>,
    invoices: Arc<dyn InvoiceRepository>,
}

impl StandardCompanyService {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        invoices: Arc<dyn InvoiceRepository>,
    ) -> Self {
        Self { companies, invoices }
    }
}

#[async_trait]
impl CompanyService for StandardCompanyService {
    async fn create_company(&self, input: NewCompany) -> Result<Company, ServiceError> {
        let company = Company::new(input)?;
        self.companies.insert(&company).await?;
        info!(company_id = %company.id, name = %company.name, "Company created");
        Ok(company)
    }

    async fn get_company(&self, id: CompanyId) -> Result<Company, ServiceError> {
        self.companies
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("company {id}")))
    }

    async fn update_company(
        &self,
        id: CompanyId,
        patch: CompanyPatch,
    ) -> Result<Company, ServiceError> {
        let mut company = self.get_company(id).await?;
        company.apply(patch)?;
        self.companies.update(&company).await?;
        Ok(company)
    }

    async fn delete_company(&self, id: CompanyId) -> Result<(), ServiceError> {
        if self.invoices.exists_for_company(id).await? {
            return Err(ServiceError::Conflict(format!(
                "company {id} is still referenced by invoices"
            )));
        }
        if !self.companies.delete(id).await? {
            return Err(ServiceError::NotFound(format!("company {id}")));
        }
        info!(company_id = %id, "Company deleted");
        Ok(())
    }

    async fn list_companies(&self) -> Result<Vec<Company>, ServiceError> {
        Ok(self.companies.list_all().await?)
    }
}
