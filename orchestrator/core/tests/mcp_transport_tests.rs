// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tool protocol over the streamable HTTP mount.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use invoicer_core::application::services::DomainServices;
use invoicer_core::domain::category::NewCategory;
use invoicer_core::domain::config::ServerSettings;
use invoicer_core::domain::storage::ObjectStorageBackend;
use invoicer_core::presentation::mcp::{transport, SessionStore, ToolRegistry};
use invoicer_core::presentation::ApiServer;

use common::{local_context, new_company, SpyServices};

fn mcp_router(services: DomainServices) -> Router {
    let tools = Arc::new(ToolRegistry::standard(services.clone(), Duration::from_secs(5)).unwrap());
    let mut server = ApiServer::new(services, tools, ServerSettings::default());
    server.setup_routes();
    server.enable_streamable_http();
    server.router().unwrap()
}

async fn post_raw(
    router: &Router,
    body: &str,
    headers: &[(&str, &str)]) -> (StatusCode, HeaderMap, String,
) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = router.clone().oneshot(builder.body(Body::from(body.to_string())).unwrap()).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn rpc(router: &Router, message: Value) -> Value {
    let (status, _, body) = post_raw(router, &message.to_string(), &[]).await;
    assert_eq!(status, StatusCode::OK, "unexpected status for {message}: {body}");
    serde_json::from_str(&body).unwrap()
}

fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": "tools/call", "params": { "name": name, "arguments": arguments } })
}

fn sse_messages(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

#[tokio::test]
async fn test_initialize_allocates_session() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = mcp_router(ctx.services.clone());

    let init = json!({
        "jsonrpc": "2.0", "id": 0, "method": "initialize",
        "params": { "protocolVersion": "2025-03-26", "capabilities": {}, "clientInfo": { "name": "test", "version": "1" } }
    });
    let (status, headers, body) = post_raw(&router, &init.to_string(), &[]).await;
    assert_eq!(status, StatusCode::OK);
    let session = headers.get("mcp-session-id").unwrap().to_str().unwrap().to_string();
    let reply: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(reply["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(reply["result"]["serverInfo"]["name"], "invoicer");

    let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let (status, _, _) = post_raw(&router, &initialized.to_string(), &[("mcp-session-id", session.as_str())]).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let ping = json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" });
    let (status, _, _) = post_raw(&router, &ping.to_string(), &[("mcp-session-id", session.as_str())]).await;
    assert_eq!(status, StatusCode::OK);

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri("/mcp")
        .header("mcp-session-id", session.as_str())
        .body(Body::empty())
        .unwrap();
    assert_eq!(router.clone().oneshot(delete).await.unwrap().status(), StatusCode::NO_CONTENT);

    let (status, _, _) = post_raw(&router, &ping.to_string(), &[("mcp-session-id", session.as_str())]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tools_list_advertises_every_operation() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = mcp_router(ctx.services.clone());

    let reply = rpc(&router, json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" })).await;
    let tools = reply["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 19);

    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    for expected in [
        "create_category",
        "list_companies",
        "change_invoice_status",
        "upload_invoice_attachment",
        "get_invoice_attachment_url",
        "delete_invoice_attachment",
    ] {
        assert!(names.contains(&expected), "missing tool {expected}");
    }
    let create_invoice = tools.iter().find(|t| t["name"] == "create_invoice").unwrap();
    assert_eq!(create_invoice["inputSchema"]["type"], "object");
    assert!(create_invoice["outputSchema"].is_object());
}

#[tokio::test]
async fn test_dispatch_matches_direct_service_call() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = mcp_router(ctx.services.clone());
    let category = ctx
        .services
        .categories
        .create_category(NewCategory { name: "Hardware".to_string(), description: None })
        .await
        .unwrap();

    let reply = rpc(&router, tool_call(1, "get_category", json!({ "id": category.id }))).await;
    let direct = ctx.services.categories.get_category(category.id).await.unwrap();
    assert_eq!(reply["result"]["isError"], false);
    assert_eq!(reply["result"]["structuredContent"], serde_json::to_value(&direct).unwrap());

    let text = reply["result"]["content"][0]["text"].as_str().unwrap();
    assert_eq!(serde_json::from_str::<Value>(text).unwrap(), serde_json::to_value(&direct).unwrap());

    let listed = rpc(&router, tool_call(2, "list_categories", json!({}))).await;
    let direct_list = ctx.services.categories.list_categories().await.unwrap();
    assert_eq!(
        listed["result"]["structuredContent"]["categories"],
        serde_json::to_value(&direct_list).unwrap()
    );
}

#[tokio::test]
async fn test_invoice_tools_round_trip() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = mcp_router(ctx.services.clone());
    let company = ctx.services.companies.create_company(new_company("Acme")).await.unwrap();

    let created = rpc(
        &router,
        tool_call(
            1,
            "create_invoice",
            json!({
                "number": "MCP-1",
                "company_id": company.id,
                "issue_date": "2026-05-02",
                "currency": "EUR",
                "items": [{ "description": "Design", "quantity": 4, "unit_price_cents": 7_500 }]
            }),
        ),
    )
    .await;
    let invoice = &created["result"]["structuredContent"];
    assert_eq!(invoice["total_cents"], 30_000);
    let id = invoice["id"].as_str().unwrap().to_string();

    let sent = rpc(&router, tool_call(2, "change_invoice_status", json!({ "id": id, "status": "sent" }))).await;
    assert_eq!(sent["result"]["structuredContent"]["status"], "sent");

    let upload = rpc(
        &router,
        tool_call(3, "upload_invoice_attachment", json!({ "id": id, "filename": "a.pdf", "content_base64": "JVBERg==" })),
    )
    .await;
    assert_eq!(upload["result"]["isError"], true);
    assert!(upload["result"]["content"][0]["text"].as_str().unwrap().starts_with("storage_unavailable"));

    let deleted = rpc(&router, tool_call(4, "delete_invoice", json!({ "id": id }))).await;
    assert_eq!(deleted["result"]["structuredContent"]["deleted"], true);

    let missing = rpc(&router, tool_call(5, "get_invoice", json!({ "id": id }))).await;
    assert_eq!(missing["result"]["isError"], true);
    assert!(missing["result"]["content"][0]["text"].as_str().unwrap().starts_with("not_found"));
}

#[tokio::test]
async fn test_rejected_calls_never_reach_services() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let (services, calls) = SpyServices::wrap(ctx.services.clone());
    let router = mcp_router(services);

    let unknown = rpc(&router, tool_call(1, "drop_all_tables", json!({}))).await;
    assert_eq!(unknown["error"]["code"], -32602);

    let malformed = rpc(&router, tool_call(2, "get_category", json!({ "id": 42 }))).await;
    assert_eq!(malformed["error"]["code"], -32602);

    let missing_field = rpc(&router, tool_call(3, "create_company", json!({ "email": "a@b.c" }))).await;
    assert_eq!(missing_field["error"]["code"], -32602);

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let accepted = rpc(&router, tool_call(4, "list_companies", json!({}))).await;
    assert_eq!(accepted["result"]["isError"], false);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_protocol_errors() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = mcp_router(ctx.services.clone());

    let (status, _, body) = post_raw(&router, "{not json", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["error"]["code"], -32700);

    let reply = rpc(&router, json!({ "jsonrpc": "2.0", "id": 1, "method": "resources/list" })).await;
    assert_eq!(reply["error"]["code"], -32601);

    let reply = rpc(&router, json!({ "jsonrpc": "1.0", "id": 2, "method": "ping" })).await;
    assert_eq!(reply["error"]["code"], -32600);

    let (status, _, _) = post_raw(&router, "{}", &[("mcp-session-id", "never-issued")]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let get = Request::builder().method(Method::GET).uri("/mcp").body(Body::empty()).unwrap();
    assert_eq!(router.clone().oneshot(get).await.unwrap().status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_batch_replies_in_order() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = mcp_router(ctx.services.clone());

    let batch = json!([
        { "jsonrpc": "2.0", "id": 1, "method": "ping" },
        { "jsonrpc": "2.0", "method": "notifications/initialized" },
        { "jsonrpc": "2.0", "id": 2, "method": "tools/list" }
    ]);
    let (status, _, body) = post_raw(&router, &batch.to_string(), &[]).await;
    assert_eq!(status, StatusCode::OK);
    let replies: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["id"], 1);
    assert_eq!(replies[1]["id"], 2);
}

#[tokio::test]
async fn test_event_stream_carries_progress_then_result() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let router = mcp_router(ctx.services.clone());

    let mut call = tool_call(9, "list_categories", json!({}));
    call["params"]["_meta"] = json!({ "progressToken": "tok-1" });
    let (status, headers, body) = post_raw(
        &router,
        &call.to_string(),
        &[("accept", "application/json, text/event-stream")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let messages = sse_messages(&body);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["method"], "notifications/progress");
    assert_eq!(messages[0]["params"]["progressToken"], "tok-1");
    assert_eq!(messages[1]["id"], 9);
    assert_eq!(messages[1]["result"]["structuredContent"]["categories"], json!([]));
}

#[tokio::test]
async fn test_idle_session_is_rejected_and_forgotten() {
    let ctx = local_context(ObjectStorageBackend::Absent).await;
    let tools = Arc::new(ToolRegistry::standard(ctx.services.clone(), Duration::from_secs(5)).unwrap());
    let sessions = Arc::new(SessionStore::new(Duration::from_millis(100), 16));
    let router = transport::routes_with_sessions(tools, sessions.clone());

    let init = json!({ "jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {} });
    let (status, headers, _) = post_raw(&router, &init.to_string(), &[]).await;
    assert_eq!(status, StatusCode::OK);
    let session = headers.get("mcp-session-id").unwrap().to_str().unwrap().to_string();
    assert_eq!(sessions.len().await, 1);

    let ping = json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }).to_string();
    let (status, _, _) = post_raw(&router, &ping, &[("mcp-session-id", &session)]).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(250)).await;
    let (status, _, _) = post_raw(&router, &ping, &[("mcp-session-id", &session)]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(sessions.is_empty().await);
}
