// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Invoice Service
//!
//! Owns invoice persistence, cross-aggregate reference checks and the attachment
//! workflow against the optional object store.
//!
//! Every write carries the `updated_at` the invoice was read with; a concurrent
//! change in between surfaces as [`ServiceError::Conflict`] instead of being
//! overwritten.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Invoice use cases shared by the REST and tool surfaces

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::domain::category::CategoryId;
use crate::domain::company::CompanyId;
use crate::domain::invoice::{
    attachment_key, Attachment, Invoice, InvoiceFilter, InvoiceId, InvoicePatch, InvoiceStatus,
    NewInvoice,
};
use crate::domain::repository::{CategoryRepository, CompanyRepository, InvoiceRepository};
use crate::domain::storage::ObjectStorageBackend;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Raw document to attach to an invoice
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Presigned download location for an invoice attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentLink {
    pub url: String,
    pub expires_in_secs: u64,
    pub attachment: Attachment,
}

#[async_trait]
pub trait InvoiceService: Send + Sync {
    async fn create_invoice(&self, input: NewInvoice) -> Result<Invoice, ServiceError>;
    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, ServiceError>;
    async fn update_invoice(
        &self,
        id: InvoiceId,
        patch: InvoicePatch,
    ) -> Result<Invoice, ServiceError>;
    async fn delete_invoice(&self, id: InvoiceId) -> Result<(), ServiceError>;
    async fn list_invoices(&self, filter: InvoiceFilter) -> Result<Vec<Invoice>, ServiceError>;
    async fn change_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, ServiceError>;
    async fn upload_attachment(
        &self,
        id: InvoiceId,
        upload: AttachmentUpload,
    ) -> Result<Invoice, ServiceError>;
    async fn attachment_url(&self, id: InvoiceId) -> Result<AttachmentLink, ServiceError>;
    async fn delete_attachment(&self, id: InvoiceId) -> Result<Invoice, ServiceError>;
}

pub struct StandardInvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    companies: Arc<dyn CompanyRepository>,
    categories: Arc<dyn CategoryRepository>,
    object_storage: ObjectStorageBackend,
    presign_ttl: Duration,
}

impl StandardInvoiceService {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        companies: Arc<dyn CompanyRepository>,
        categories: Arc<dyn CategoryRepository>,
        object_storage: ObjectStorageBackend,
        presign_ttl: Duration,
    ) -> Self {
        Self { invoices, companies, categories, object_storage, presign_ttl }
    }

    async fn check_references(
        &self,
        company_id: CompanyId,
        category_id: Option<CategoryId>,
    ) -> Result<(), ServiceError> {
        if self.companies.find_by_id(company_id).await?.is_none() {
            return Err(ServiceError::Validation(format!("company {company_id} does not exist")));
        }
        if let Some(category_id) = category_id {
            if self.categories.find_by_id(category_id).await?.is_none() {
                return Err(ServiceError::Validation(format!(
                    "category {category_id} does not exist"
                )));
            }
        }
        Ok(())
    }

    async fn ensure_number_free(
        &self,
        number: &str,
        except: Option<InvoiceId>,
    ) -> Result<(), ServiceError> {
        match self.invoices.find_by_number(number).await? {
            Some(existing) if Some(existing.id) != except => Err(ServiceError::Conflict(format!(
                "invoice number '{number}' is already in use"
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl InvoiceService for StandardInvoiceService {
    async fn create_invoice(&self, input: NewInvoice) -> Result<Invoice, ServiceError> {
        let invoice = Invoice::new(input)?;
        self.check_references(invoice.company_id, invoice.category_id).await?;
        self.ensure_number_free(&invoice.number, None).await?;
        self.invoices.insert(&invoice).await?;
        info!(
            invoice_id = %invoice.id,
            number = %invoice.number,
            total_cents = invoice.total_cents,
            "Invoice created"
        );
        Ok(invoice)
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, ServiceError> {
        self.invoices
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("invoice {id}")))
    }

    async fn update_invoice(
        &self,
        id: InvoiceId,
        patch: InvoicePatch,
    ) -> Result<Invoice, ServiceError> {
        let mut invoice = self.get_invoice(id).await?;
        let version = invoice.updated_at;
        let references_changed = patch.company_id.is_some() || patch.category_id.is_some();
        let number_changed = patch.number.is_some();

        invoice.apply(patch)?;
        if references_changed {
            self.check_references(invoice.company_id, invoice.category_id).await?;
        }
        if number_changed {
            self.ensure_number_free(&invoice.number, Some(id)).await?;
        }
        self.invoices.update(&invoice, version).await?;
        Ok(invoice)
    }

    async fn delete_invoice(&self, id: InvoiceId) -> Result<(), ServiceError> {
        let invoice = self.get_invoice(id).await?;
        if !self.invoices.delete(id).await? {
            return Err(ServiceError::NotFound(format!("invoice {id}")));
        }
        info!(invoice_id = %id, "Invoice deleted");

        if let Some(attachment) = invoice.attachment {
            match self.object_storage.require() {
                Ok(storage) => {
                    if let Err(e) = storage.delete(&attachment.key).await {
                        warn!(
                            invoice_id = %id,
                            key = %attachment.key,
                            error = %e,
                            "Failed to delete attachment object"
                        );
                    }
                }
                Err(_) => {
                    warn!(
                        invoice_id = %id,
                        key = %attachment.key,
                        "Object storage unavailable, attachment object left behind"
                    );
                }
            }
        }
        Ok(())
    }

    async fn list_invoices(&self, filter: InvoiceFilter) -> Result<Vec<Invoice>, ServiceError> {
        Ok(self.invoices.list(&filter).await?)
    }

    async fn change_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, ServiceError> {
        let mut invoice = self.get_invoice(id).await?;
        let previous = invoice.status;
        let version = invoice.updated_at;
        invoice.transition_to(status)?;
        if previous != status {
            self.invoices.update(&invoice, version).await?;
            info!(invoice_id = %id, from = %previous, to = %status, "Invoice status changed");
        }
        Ok(invoice)
    }

    async fn upload_attachment(
        &self,
        id: InvoiceId,
        upload: AttachmentUpload,
    ) -> Result<Invoice, ServiceError> {
        let storage = self.object_storage.require()?;
        let mut invoice = self.get_invoice(id).await?;
        let version = invoice.updated_at;

        if upload.data.is_empty() {
            return Err(ServiceError::Validation(
                "attachment content must not be empty".to_string(),
            ));
        }
        let key = attachment_key(id, Uuid::new_v4(), &upload.filename)?;
        let content_type = upload
            .content_type
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let size_bytes = upload.data.len() as u64;

        storage.put(&key, upload.data, &content_type).await?;

        let filename = key.rsplit('/').next().unwrap_or_default().to_string();
        let previous = invoice.attachment.clone();
        invoice.attach(Attachment {
            key: key.clone(),
            filename,
            content_type,
            size_bytes,
            uploaded_at: Utc::now(),
        });

        // Only the freshly written key is removed; the stored document stays intact.
        if let Err(e) = self.invoices.update(&invoice, version).await {
            if let Err(cleanup) = storage.delete(&key).await {
                warn!(
                    invoice_id = %id,
                    key = %key,
                    error = %cleanup,
                    "Failed to remove orphaned attachment object"
                );
            }
            return Err(e.into());
        }

        if let Some(previous) = previous {
            if let Err(e) = storage.delete(&previous.key).await {
                warn!(
                    invoice_id = %id,
                    key = %previous.key,
                    error = %e,
                    "Failed to delete replaced attachment object"
                );
            }
        }

        info!(invoice_id = %id, key = %key, size_bytes, "Invoice attachment uploaded");
        Ok(invoice)
    }

    async fn attachment_url(&self, id: InvoiceId) -> Result<AttachmentLink, ServiceError> {
        let storage = self.object_storage.require()?;
        let invoice = self.get_invoice(id).await?;
        let attachment = invoice
            .attachment
            .ok_or_else(|| ServiceError::NotFound(format!("attachment of invoice {id}")))?;
        let url = storage.presign_get(&attachment.key, self.presign_ttl).await?;
        Ok(AttachmentLink {
            url,
            expires_in_secs: self.presign_ttl.as_secs(),
            attachment,
        })
    }

    async fn delete_attachment(&self, id: InvoiceId) -> Result<Invoice, ServiceError> {
        let storage = self.object_storage.require()?;
        let mut invoice = self.get_invoice(id).await?;
        let version = invoice.updated_at;
        let attachment = invoice
            .detach()
            .ok_or_else(|| ServiceError::NotFound(format!("attachment of invoice {id}")))?;

        self.invoices.update(&invoice, version).await?;
        if let Err(e) = storage.delete(&attachment.key).await {
            warn!(
                invoice_id = %id,
                key = %attachment.key,
                error = %e,
                "Failed to delete detached attachment object"
            );
        }
        info!(invoice_id = %id, key = %attachment.key, "Invoice attachment deleted");
        Ok(invoice)
    }
}
