// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Streamable HTTP transport
//!
//! Serves the tool protocol at `/mcp`:
//! - `POST` carries one JSON-RPC message or a batch. Clients that accept
//!   `text/event-stream` get an SSE stream fed by a task spawned for that
//!   request; everyone else gets a single JSON body.
//! - `GET` is refused with 405 since the server never initiates streams.
//! - `DELETE` ends the session named by `Mcp-Session-Id`.
//!
//! `initialize` allocates a session id. Requests that present an id the server
//! does not know are answered with 404 so the client re-initializes; requests
//! without one are served statelessly.
//!
//! Sessions expire after [`SESSION_IDLE_TTL`] without traffic and at most
//! [`MAX_SESSIONS`] are kept; the least recently used one is dropped first.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::presentation::mcp::protocol::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS,
    INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
    SESSION_HEADER,
};
use crate::presentation::mcp::registry::{ToolOutcome, ToolRegistry};

const STREAM_BUFFER: usize = 16;

pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
pub const MAX_SESSIONS: usize = 1024;

/// Live session ids with the instant each was last used.
pub struct SessionStore {
    idle_ttl: Duration,
    capacity: usize,
    last_seen: Mutex<HashMap<String, Instant>>,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, capacity: usize) -> Self {
        Self { idle_ttl, capacity: capacity.max(1), last_seen: Mutex::new(HashMap::new()) }
    }

    /// Allocate a fresh id, sweeping expired sessions and evicting the least
    /// recently used one when full.
    pub async fn open(&self) -> String {
        let now = Instant::now();
        let mut sessions = self.last_seen.lock().await;
        let before = sessions.len();
        sessions.retain(|_, seen| now.duration_since(*seen) < self.idle_ttl);
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "Expired idle MCP sessions");
        }
        while sessions.len() >= self.capacity {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, seen)| **seen)
                .map(|(id, _)| id.clone());
            let Some(oldest) = oldest else {
                break;
            };
            sessions.remove(&oldest);
            debug!(session = %oldest, "Evicted least recently used MCP session");
        }

        let id = Uuid::new_v4().to_string();
        sessions.insert(id.clone(), now);
        id
    }

    /// Refresh a live session. Expired ids are removed and reported as unknown.
    pub async fn touch(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut sessions = self.last_seen.lock().await;
        match sessions.get_mut(id) {
            Some(seen) if now.duration_since(*seen) < self.idle_ttl => {
                *seen = now;
                true
            }
            Some(_) => {
                sessions.remove(id);
                debug!(session = %id, "MCP session expired");
                false
            }
            None => false,
        }
    }

    pub async fn close(&self, id: &str) -> bool {
        self.last_seen.lock().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.last_seen.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_IDLE_TTL, MAX_SESSIONS)
    }
}

#[derive(Clone)]
struct TransportState {
    registry: Arc<ToolRegistry>,
    sessions: Arc<SessionStore>,
}

/// Routes for the `/mcp` mount, with their state already applied.
pub fn routes(registry: Arc<ToolRegistry>) -> Router {
    routes_with_sessions(registry, Arc::new(SessionStore::default()))
}

/// Same as [`routes`], tracking sessions in the given store.
pub fn routes_with_sessions(registry: Arc<ToolRegistry>, sessions: Arc<SessionStore>) -> Router {
    let state = TransportState { registry, sessions };
    Router::new()
        .route("/mcp", post(handle_post).get(handle_get).delete(handle_delete))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

enum Incoming {
    Request(JsonRpcRequest),
    /// Structurally invalid message that still deserves an error reply
    Invalid(Value, JsonRpcError),
    /// Client responses and other messages that need no reply
    Ignored,
}

fn classify(raw: Value) -> Incoming {
    let id = raw.get("id").cloned();
    if raw.get("method").is_none() && (raw.get("result").is_some() || raw.get("error").is_some()) {
        return Incoming::Ignored;
    }
    match serde_json::from_value::<JsonRpcRequest>(raw) {
        Ok(request) if request.jsonrpc != JSONRPC_VERSION => match request.id {
            Some(id) => Incoming::Invalid(
                id,
                JsonRpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            ),
            None => Incoming::Ignored,
        },
        Ok(request) => Incoming::Request(request),
        Err(e) => Incoming::Invalid(
            id.unwrap_or(Value::Null),
            JsonRpcError::new(INVALID_REQUEST, format!("invalid request: {e}")),
        ),
    }
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}

fn rpc_error_response(status: StatusCode, error: JsonRpcError) -> Response {
    (status, Json(JsonRpcResponse::failure(Value::Null, error))).into_response()
}

async fn handle_post(
    State(state): State<TransportState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return rpc_error_response(
                StatusCode::BAD_REQUEST,
                JsonRpcError::new(PARSE_ERROR, e.to_string()),
            );
        }
    };

    if let Some(id) = session_id(&headers) {
        if !state.sessions.touch(&id).await {
            debug!(session = %id, "Unknown MCP session");
            return rpc_error_response(
                StatusCode::NOT_FOUND,
                JsonRpcError::new(INVALID_REQUEST, "unknown session"),
            );
        }
    }

    let (batch, messages) = match payload {
        Value::Array(items) if items.is_empty() => {
            return rpc_error_response(
                StatusCode::BAD_REQUEST,
                JsonRpcError::new(INVALID_REQUEST, "empty batch"),
            );
        }
        Value::Array(items) => (true, items),
        single => (false, vec![single]),
    };

    let mut requests = Vec::new();
    let mut immediate = Vec::new();
    for message in messages {
        match classify(message) {
            Incoming::Request(request) => requests.push(request),
            Incoming::Invalid(id, error) => immediate.push(JsonRpcResponse::failure(id, error)),
            Incoming::Ignored => {}
        }
    }

    let expects_reply = !immediate.is_empty() || requests.iter().any(|r| !r.is_notification());
    let initializes = requests.iter().any(|r| r.method == "initialize" && !r.is_notification());
    let new_session = if initializes {
        let id = state.sessions.open().await;
        info!(session = %id, "MCP session initialized");
        Some(id)
    } else {
        None
    };

    let mut response = if !expects_reply {
        for request in requests {
            dispatch(&state.registry, request).await;
        }
        StatusCode::ACCEPTED.into_response()
    } else if accepts_event_stream(&headers) {
        stream_responses(state.registry.clone(), requests, immediate)
    } else {
        let mut replies = immediate;
        for request in requests {
            if let Some(reply) = dispatch(&state.registry, request).await {
                replies.push(reply);
            }
        }
        if batch {
            Json(replies).into_response()
        } else {
            match replies.into_iter().next() {
                Some(reply) => Json(reply).into_response(),
                None => StatusCode::ACCEPTED.into_response(),
            }
        }
    };

    if let Some(id) = new_session {
        if let Ok(value) = HeaderValue::from_str(&id) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

/// Answer over SSE from a task owned by this request alone.
fn stream_responses(
    registry: Arc<ToolRegistry>,
    requests: Vec<JsonRpcRequest>,
    immediate: Vec<JsonRpcResponse>,
) -> Response {
    let (tx, rx) = mpsc::channel::<Event>(STREAM_BUFFER);

    tokio::spawn(async move {
        for reply in immediate {
            if send_json(&tx, &reply).await.is_err() {
                return;
            }
        }
        for request in requests {
            if request.method == "tools/call" {
                if let Some(token) = request.progress_token() {
                    if send_json(&tx, &JsonRpcNotification::progress(token, 0, 1)).await.is_err() {
                        return;
                    }
                }
            }
            if let Some(reply) = dispatch(&registry, request).await {
                if send_json(&tx, &reply).await.is_err() {
                    debug!("MCP stream consumer went away");
                    return;
                }
            }
        }
    });

    Sse::new(ReceiverStream::new(rx).map(Ok::<_, Infallible>)).into_response()
}

async fn send_json<T: serde::Serialize>(tx: &mpsc::Sender<Event>, message: &T) -> Result<(), ()> {
    let data = serde_json::to_string(message)
        .map_err(|e| warn!(error = %e, "Cannot encode MCP message"))?;
    tx.send(Event::default().event("message").data(data)).await.map_err(|_| ())
}

async fn dispatch(registry: &ToolRegistry, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    let Some(id) = request.id.clone() else {
        debug!(method = %request.method, "MCP notification");
        return None;
    };

    let reply = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": { "name": "invoicer", "version": env!("CARGO_PKG_VERSION") },
            }),
        ),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(id, json!({ "tools": registry.list() })),
        "tools/call" => {
            let params = request.params.unwrap_or(Value::Null);
            match serde_json::from_value::<CallParams>(params) {
                Ok(call) => call_tool(registry, id, call).await,
                Err(e) => {
                    JsonRpcResponse::failure(id, JsonRpcError::new(INVALID_PARAMS, e.to_string()))
                }
            }
        }
        other => JsonRpcResponse::failure(
            id,
            JsonRpcError::new(METHOD_NOT_FOUND, format!("method not found: {other}")),
        ),
    };
    Some(reply)
}

async fn call_tool(registry: &ToolRegistry, id: Value, call: CallParams) -> JsonRpcResponse {
    match registry.call(&call.name, call.arguments).await {
        Ok(ToolOutcome::Success(output)) => JsonRpcResponse::success(
            id,
            json!({
                "content": [{ "type": "text", "text": output.to_string() }],
                "structuredContent": output,
                "isError": false,
            }),
        ),
        Ok(ToolOutcome::Failed { kind, message }) => JsonRpcResponse::success(
            id,
            json!({
                "content": [{ "type": "text", "text": format!("{kind}: {message}") }],
                "isError": true,
            }),
        ),
        Err(e) => {
            debug!(tool = %call.name, error = %e, "Tool call rejected");
            JsonRpcResponse::failure(id, e.to_rpc_error())
        }
    }
}

async fn handle_get() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "POST, DELETE")]).into_response()
}

async fn handle_delete(State(state): State<TransportState>, headers: HeaderMap) -> StatusCode {
    let Some(id) = session_id(&headers) else {
        return StatusCode::BAD_REQUEST;
    };
    if state.sessions.close(&id).await {
        info!(session = %id, "MCP session closed");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
