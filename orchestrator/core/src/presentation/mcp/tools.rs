// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tool bindings for every domain service operation.
//!
//! Each tool is a thin translation: arguments are deserialized into the
//! service's own input types and the service result is returned unchanged.

use std::time::Duration;

use base64::Engine;
use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::application::error::ServiceError;
use crate::application::invoice::{AttachmentLink, AttachmentUpload};
use crate::application::services::DomainServices;
use crate::domain::category::{Category, CategoryId, CategoryPatch, NewCategory};
use crate::domain::company::{Company, CompanyId, CompanyPatch, NewCompany};
use crate::domain::invoice::{
    Invoice, InvoiceFilter, InvoiceId, InvoicePatch, InvoiceStatus, NewInvoice,
};
use crate::presentation::mcp::protocol::ToolError;
use crate::presentation::mcp::registry::ToolRegistry;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoArguments {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CategoryIdInput {
    pub id: CategoryId,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateCategoryInput {
    pub id: CategoryId,
    #[serde(flatten)]
    pub patch: CategoryPatch,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompanyIdInput {
    pub id: CompanyId,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateCompanyInput {
    pub id: CompanyId,
    #[serde(flatten)]
    pub patch: CompanyPatch,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InvoiceIdInput {
    pub id: InvoiceId,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateInvoiceInput {
    pub id: InvoiceId,
    #[serde(flatten)]
    pub patch: InvoicePatch,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChangeInvoiceStatusInput {
    pub id: InvoiceId,
    pub status: InvoiceStatus,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UploadInvoiceAttachmentInput {
    pub id: InvoiceId,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Document bytes, standard base64
    pub content_base64: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct CategoryList {
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct CompanyList {
    pub companies: Vec<Company>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct InvoiceList {
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct Deleted {
    pub id: String,
    pub deleted: bool,
}

impl Deleted {
    fn of(id: impl ToString) -> Self {
        Self { id: id.to_string(), deleted: true }
    }
}

fn decode_content(encoded: &str) -> Result<Bytes, ServiceError> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map(Bytes::from)
        .map_err(|e| ServiceError::Validation(format!("content_base64 is not valid base64: {e}")))
}

impl ToolRegistry {
    /// Registry exposing the full category, company and invoice surface.
    pub fn standard(
        services: DomainServices,
        call_timeout: Duration,
    ) -> Result<ToolRegistry, ToolError> {
        ToolRegistry::builder(services)
            .call_timeout(call_timeout)
            // Categories
            .register(
                "create_category",
                "Create an invoice category",
                |s, input: NewCategory| async move { s.categories.create_category(input).await },
            )
            .register(
                "get_category",
                "Fetch a category by id",
                |s, input: CategoryIdInput| async move {
                    s.categories.get_category(input.id).await
                },
            )
            .register(
                "update_category",
                "Update a category; omitted fields are unchanged",
                |s, input: UpdateCategoryInput| async move {
                    s.categories.update_category(input.id, input.patch).await
                },
            )
            .register(
                "delete_category",
                "Delete a category that no invoice references",
                |s, input: CategoryIdInput| async move {
                    s.categories.delete_category(input.id).await?;
                    Ok::<_, ServiceError>(Deleted::of(input.id))
                },
            )
            .register(
                "list_categories",
                "List all categories by name",
                |s, _: NoArguments| async move {
                    let categories = s.categories.list_categories().await?;
                    Ok::<_, ServiceError>(CategoryList { categories })
                },
            )
            // Companies
            .register(
                "create_company",
                "Create a billed company",
                |s, input: NewCompany| async move { s.companies.create_company(input).await },
            )
            .register(
                "get_company",
                "Fetch a company by id",
                |s, input: CompanyIdInput| async move { s.companies.get_company(input.id).await },
            )
            .register(
                "update_company",
                "Update a company; omitted fields are unchanged",
                |s, input: UpdateCompanyInput| async move {
                    s.companies.update_company(input.id, input.patch).await
                },
            )
            .register(
                "delete_company",
                "Delete a company that no invoice references",
                |s, input: CompanyIdInput| async move {
                    s.companies.delete_company(input.id).await?;
                    Ok::<_, ServiceError>(Deleted::of(input.id))
                },
            )
            .register(
                "list_companies",
                "List all companies by name",
                |s, _: NoArguments| async move {
                    let companies = s.companies.list_companies().await?;
                    Ok::<_, ServiceError>(CompanyList { companies })
                },
            )
            // Invoices
            .register(
                "create_invoice",
                "Create a draft invoice with line items",
                |s, input: NewInvoice| async move { s.invoices.create_invoice(input).await },
            )
            .register(
                "get_invoice",
                "Fetch an invoice by id",
                |s, input: InvoiceIdInput| async move { s.invoices.get_invoice(input.id).await },
            )
            .register(
                "update_invoice",
                "Update a draft or sent invoice; omitted fields are unchanged",
                |s, input: UpdateInvoiceInput| async move {
                    s.invoices.update_invoice(input.id, input.patch).await
                },
            )
            .register(
                "delete_invoice",
                "Delete an invoice and its attachment",
                |s, input: InvoiceIdInput| async move {
                    s.invoices.delete_invoice(input.id).await?;
                    Ok::<_, ServiceError>(Deleted::of(input.id))
                },
            )
            .register(
                "list_invoices",
                "List invoices, optionally filtered by company, category or status",
                |s, filter: InvoiceFilter| async move {
                    let invoices = s.invoices.list_invoices(filter).await?;
                    Ok::<_, ServiceError>(InvoiceList { invoices })
                },
            )
            .register(
                "change_invoice_status",
                "Move an invoice through draft, sent, paid or cancelled",
                |s, input: ChangeInvoiceStatusInput| async move {
                    s.invoices.change_status(input.id, input.status).await
                },
            )
            .register(
                "upload_invoice_attachment",
                "Attach a document to an invoice, replacing any previous one",
                |s, input: UploadInvoiceAttachmentInput| async move {
                    let data = decode_content(&input.content_base64)?;
                    let upload = AttachmentUpload {
                        filename: input.filename,
                        content_type: input.content_type,
                        data,
                    };
                    s.invoices.upload_attachment(input.id, upload).await
                },
            )
            .register(
                "get_invoice_attachment_url",
                "Get a time-limited download URL for an invoice attachment",
                |s, input: InvoiceIdInput| async move {
                    let link: AttachmentLink = s.invoices.attachment_url(input.id).await?;
                    Ok::<_, ServiceError>(link)
                },
            )
            .register(
                "delete_invoice_attachment",
                "Remove the attachment from an invoice",
                |s, input: InvoiceIdInput| async move {
                    s.invoices.delete_attachment(input.id).await
                },
            )
            .build()
    }
}
