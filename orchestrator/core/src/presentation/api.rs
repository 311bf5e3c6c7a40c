// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! REST route handlers. Each handler parses its inputs, calls exactly one
//! domain service operation and renders the result.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::application::invoice::AttachmentUpload;
use crate::application::services::DomainServices;
use crate::domain::category::{CategoryId, CategoryPatch, NewCategory};
use crate::domain::company::{CompanyId, CompanyPatch, NewCompany};
use crate::domain::invoice::{InvoiceFilter, InvoiceId, InvoicePatch, InvoiceStatus, NewInvoice};
use crate::infrastructure::database::Database;
use crate::presentation::error::ApiError;

/// What `/readyz` reports on besides the relational store.
#[derive(Clone, Default)]
pub struct Readiness {
    pub database: Option<Database>,
    pub object_storage: bool,
    pub authentication: bool,
}

#[derive(Clone)]
pub struct ApiState {
    pub services: DomainServices,
    pub readiness: Readiness,
    pub started_at: Instant,
}

/// Liveness route. Mounted outside the authentication gate.
pub fn health_routes(started_at: Instant) -> Router {
    Router::new().route("/health", get(move || health(started_at)))
}

/// Readiness and CRUD routes.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/readyz", get(readyz))
        .route("/api/categories", get(list_categories).post(create_category))
        .route(
            "/api/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/api/companies", get(list_companies).post(create_company))
        .route(
            "/api/companies/{id}",
            get(get_company).put(update_company).delete(delete_company),
        )
        .route("/api/invoices", get(list_invoices).post(create_invoice))
        .route(
            "/api/invoices/{id}",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/api/invoices/{id}/status", post(change_invoice_status))
        .route(
            "/api/invoices/{id}/attachment",
            put(upload_attachment).get(attachment_url).delete(delete_attachment),
        )
        .with_state(state)
}

async fn health(started_at: Instant) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": started_at.elapsed().as_secs(),
    }))
}

async fn readyz(State(state): State<ApiState>) -> impl IntoResponse {
    let readiness = &state.readiness;
    let storage = match &readiness.database {
        Some(database) => match database.ping().await {
            Ok(()) => Some(database.kind()),
            Err(e) => {
                warn!(error = %e, "Readiness check failed to reach storage");
                None
            }
        },
        None => None,
    };

    let status = if storage.is_some() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = json!({
        "status": if storage.is_some() { "ready" } else { "unavailable" },
        "storage": storage,
        "object_storage": if readiness.object_storage { "present" } else { "absent" },
        "authentication": if readiness.authentication { "enabled" } else { "disabled" },
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });
    (status, Json(body))
}

fn parse_id<T>(
    raw: &str,
    what: &str,
    parse: fn(&str) -> Result<T, uuid::Error>,
) -> Result<T, ApiError> {
    parse(raw).map_err(|_| ApiError::BadRequest(format!("invalid {what} id '{raw}'")))
}

fn category_id(raw: &str) -> Result<CategoryId, ApiError> {
    parse_id(raw, "category", CategoryId::from_string)
}

fn company_id(raw: &str) -> Result<CompanyId, ApiError> {
    parse_id(raw, "company", CompanyId::from_string)
}

fn invoice_id(raw: &str) -> Result<InvoiceId, ApiError> {
    parse_id(raw, "invoice", InvoiceId::from_string)
}

// Categories

async fn list_categories(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.services.categories.list_categories().await?))
}

async fn create_category(
    State(state): State<ApiState>,
    payload: Result<Json<NewCategory>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = payload?;
    let category = state.services.categories.create_category(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn get_category(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.services.categories.get_category(category_id(&id)?).await?))
}

async fn update_category(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<CategoryPatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = category_id(&id)?;
    let Json(patch) = payload?;
    Ok(Json(state.services.categories.update_category(id, patch).await?))
}

async fn delete_category(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.services.categories.delete_category(category_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Companies

async fn list_companies(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.services.companies.list_companies().await?))
}

async fn create_company(
    State(state): State<ApiState>,
    payload: Result<Json<NewCompany>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = payload?;
    let company = state.services.companies.create_company(input).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

async fn get_company(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.services.companies.get_company(company_id(&id)?).await?))
}

async fn update_company(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<CompanyPatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = company_id(&id)?;
    let Json(patch) = payload?;
    Ok(Json(state.services.companies.update_company(id, patch).await?))
}

async fn delete_company(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.services.companies.delete_company(company_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Invoices

#[derive(Debug, Default, Deserialize)]
struct InvoiceListQuery {
    company_id: Option<String>,
    category_id: Option<String>,
    status: Option<String>,
}

impl InvoiceListQuery {
    fn into_filter(self) -> Result<InvoiceFilter, ApiError> {
        Ok(InvoiceFilter {
            company_id: self.company_id.as_deref().map(company_id).transpose()?,
            category_id: self.category_id.as_deref().map(category_id).transpose()?,
            status: self
                .status
                .as_deref()
                .map(|s| s.parse::<InvoiceStatus>().map_err(|e| ApiError::BadRequest(e.0)))
                .transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    status: InvoiceStatus,
}

#[derive(Debug, Deserialize)]
struct AttachmentQuery {
    filename: Option<String>,
}

async fn list_invoices(
    State(state): State<ApiState>,
    query: Result<Query<InvoiceListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.services.invoices.list_invoices(query.into_filter()?).await?))
}

async fn create_invoice(
    State(state): State<ApiState>,
    payload: Result<Json<NewInvoice>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = payload?;
    let invoice = state.services.invoices.create_invoice(input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

async fn get_invoice(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.services.invoices.get_invoice(invoice_id(&id)?).await?))
}

async fn update_invoice(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<InvoicePatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = invoice_id(&id)?;
    let Json(patch) = payload?;
    Ok(Json(state.services.invoices.update_invoice(id, patch).await?))
}

async fn delete_invoice(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.services.invoices.delete_invoice(invoice_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_invoice_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<StatusChange>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = invoice_id(&id)?;
    let Json(change) = payload?;
    Ok(Json(state.services.invoices.change_status(id, change.status).await?))
}

async fn upload_attachment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    query: Result<Query<AttachmentQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = invoice_id(&id)?;
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let filename = query
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("query parameter 'filename' is required".to_string()))?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let upload = AttachmentUpload { filename, content_type, data: body };
    Ok(Json(state.services.invoices.upload_attachment(id, upload).await?))
}

async fn attachment_url(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.services.invoices.attachment_url(invoice_id(&id)?).await?))
}

async fn delete_attachment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.services.invoices.delete_attachment(invoice_id(&id)?).await?))
}
