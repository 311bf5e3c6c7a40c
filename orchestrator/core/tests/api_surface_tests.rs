// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! REST surface exercised through the composed router.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use invoicer_core::application::services::DomainServices;
use invoicer_core::domain::config::ServerSettings;
use invoicer_core::domain::storage::ObjectStorageBackend;
use invoicer_core::infrastructure::MockObjectStorage;
use invoicer_core::presentation::mcp::ToolRegistry;
use invoicer_core::presentation::server::MAX_BODY_BYTES;
use invoicer_core::presentation::ApiServer;

use common::{local_context, TestContext};

fn router_for(ctx: &TestContext, object_storage: bool) -> Router {
    let tools = Arc::new(ToolRegistry::standard(ctx.services.clone(), Duration::from_secs(5)).unwrap());
    let mut server = ApiServer::new(ctx.services.clone(), tools, ServerSettings::default())
        .with_readiness(ctx.database.clone(), object_storage);
    server.setup_routes();
    server.router().unwrap()
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>) -> (StatusCode, Value,
) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn create_company(router: &Router, name: &str) -> String {
    let (status, body) = send(router, Method::POST, "/api/companies", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

fn invoice_body(number: &str, company_id: &str) -> Value {
    json!({
        "number": number,
        "company_id": company_id,
        "issue_date": "2026-04-01",
        "currency": "usd",
        "items": [{ "description": "Support", "quantity": 2, "unit_price_cents": 2_500 }]
    })
}

#[tokio::test]
async fn test_health_and_readiness() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = router_for(&ctx, false);

    let (status, body) = send(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&router, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["storage"], "local");
    assert_eq!(body["object_storage"], "absent");
    assert_eq!(body["authentication"], "disabled");
}

#[tokio::test]
async fn test_readiness_fails_once_storage_is_closed() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = router_for(&ctx, false);
    ctx.database.close().await;

    let (status, body) = send(&router, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn test_category_crud_round_trip() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = router_for(&ctx, false);

    let (status, created) = send(
        &router,
        Method::POST,
        "/api/categories",
        Some(json!({ "name": "Software", "description": "Licenses" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&router, Method::GET, &format!("/api/categories/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = send(
        &router,
        Method::PUT,
        &format!("/api/categories/{id}"),
        Some(json!({ "name": "SaaS" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "SaaS");
    assert_eq!(updated["description"], "Licenses");

    let (status, listed) = send(&router, Method::GET, "/api/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = send(&router, Method::DELETE, &format!("/api/categories/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&router, Method::GET, &format!("/api/categories/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn test_error_statuses() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = router_for(&ctx, false);

    let (status, body) = send(&router, Method::GET, "/api/companies/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "bad_request");

    let (status, body) = send(&router, Method::POST, "/api/companies", Some(json!({ "name": "" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "validation_error");

    let (status, _) = send(&router, Method::POST, "/api/companies", Some(json!({ "nom": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    create_company(&router, "Acme").await;
    let company_id = create_company(&router, "Beta").await;
    let (status, _) = send(&router, Method::POST, "/api/invoices", Some(invoice_body("X-1", &company_id))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&router, Method::POST, "/api/invoices", Some(invoice_body("X-1", &company_id))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "conflict");

    let (status, _) = send(&router, Method::GET, "/api/invoices?status=lost", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invoice_routes() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = router_for(&ctx, false);
    let company_id = create_company(&router, "Acme").await;

    let (status, invoice) = send(&router, Method::POST, "/api/invoices", Some(invoice_body("INV-7", &company_id))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(invoice["currency"], "USD");
    assert_eq!(invoice["total_cents"], 5_000);
    assert_eq!(invoice["status"], "draft");
    let id = invoice["id"].as_str().unwrap().to_string();

    let (status, sent) = send(
        &router,
        Method::POST,
        &format!("/api/invoices/{id}/status"),
        Some(json!({ "status": "sent" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["status"], "sent");

    let (status, listed) = send(&router, Method::GET, &format!("/api/invoices?company_id={company_id}&status=sent"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, listed) = send(&router, Method::GET, "/api/invoices?status=paid", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed.as_array().unwrap().is_empty());

    let (status, _) = send(&router, Method::DELETE, &format!("/api/companies/{company_id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&router, Method::DELETE, &format!("/api/invoices/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&router, Method::DELETE, &format!("/api/companies/{company_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_attachment_upload_without_object_storage_is_503() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = router_for(&ctx, false);
    let company_id = create_company(&router, "Acme").await;
    let (_, invoice) = send(&router, Method::POST, "/api/invoices", Some(invoice_body("INV-1", &company_id))).await;
    let id = invoice["id"].as_str().unwrap();

    let request = Request::builder()
        .method(Method::PUT)
        .uri(format!("/api/invoices/{id}/attachment?filename=scan.pdf"))
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Body::from("%PDF-1.7"))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_slice(&response.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["error"]["kind"], "storage_unavailable");
}

#[tokio::test]
async fn test_attachment_routes_with_object_storage() {
    let storage = Arc::new(MockObjectStorage::new());
    let ctx = local_context(ObjectStorageBackend::Present(storage.clone())).await;
    let router = router_for(&ctx, true);
    let company_id = create_company(&router, "Acme").await;
    let (_, invoice) = send(&router, Method::POST, "/api/invoices", Some(invoice_body("INV-1", &company_id))).await;
    let id = invoice["id"].as_str().unwrap().to_string();

    let missing_name = Request::builder()
        .method(Method::PUT)
        .uri(format!("/api/invoices/{id}/attachment"))
        .body(Body::from("data"))
        .unwrap();
    assert_eq!(router.clone().oneshot(missing_name).await.unwrap().status(), StatusCode::BAD_REQUEST);

    let upload = Request::builder()
        .method(Method::PUT)
        .uri(format!("/api/invoices/{id}/attachment?filename=receipt.png"))
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(vec![0x89u8, b'P', b'N', b'G']))
        .unwrap();
    let response = router.clone().oneshot(upload).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&response.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["attachment"]["content_type"], "image/png");
    assert_eq!(body["attachment"]["size_bytes"], 4);

    let (status, link) = send(&router, Method::GET, &format!("/api/invoices/{id}/attachment"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(link["url"].as_str().unwrap().contains("receipt.png"));

    let (status, detached) = send(&router, Method::DELETE, &format!("/api/invoices/{id}/attachment"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(detached.get("attachment").is_none());
    assert!(storage.keys().is_empty());

    let (_, ready) = send(&router, Method::GET, "/readyz", None).await;
    assert_eq!(ready["object_storage"], "present");
}

#[tokio::test]
async fn test_router_requires_setup_routes() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let services: DomainServices = ctx.services.clone();
    let tools = Arc::new(ToolRegistry::standard(services.clone(), Duration::from_secs(5)).unwrap());
    let server = ApiServer::new(services, tools, ServerSettings::default());
    assert!(server.router().is_err());
}

#[tokio::test]
async fn test_oversized_upload_is_413_with_envelope() {
    let storage = Arc::new(MockObjectStorage::new());
    let ctx = local_context(ObjectStorageBackend::Present(storage.clone())).await;
    let router = router_for(&ctx, true);
    let company_id = create_company(&router, "Acme").await;
    let (_, invoice) = send(&router, Method::POST, "/api/invoices", Some(invoice_body("INV-1", &company_id))).await;
    let id = invoice["id"].as_str().unwrap();

    let oversized = vec![0u8; MAX_BODY_BYTES + 1];
    let request = Request::builder()
        .method(Method::PUT)
        .uri(format!("/api/invoices/{id}/attachment?filename=huge.bin"))
        .header(header::CONTENT_LENGTH, oversized.len())
        .body(Body::from(oversized))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = serde_json::from_slice(&response.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["error"]["kind"], "payload_too_large");
    assert!(storage.keys().is_empty());
}
