// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! JSON-RPC 2.0 message types for the Model Context Protocol surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2025-03-26";
pub const SESSION_HEADER: &str = "mcp-session-id";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Requests without an id are notifications and never get a response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// `params._meta.progressToken`, if the client asked for progress.
    pub fn progress_token(&self) -> Option<Value> {
        self.params
            .as_ref()?
            .get("_meta")?
            .get("progressToken")
            .cloned()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION, id, result: Some(result), error: None }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self { jsonrpc: JSONRPC_VERSION, id, result: None, error: Some(error) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }
}

/// Server-to-client notification (no id).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl JsonRpcNotification {
    pub fn progress(token: Value, progress: u64, total: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: "notifications/progress",
            params: serde_json::json!({
                "progressToken": token,
                "progress": progress,
                "total": total,
            }),
        }
    }
}

/// Failures rejected at the tool boundary before any service is invoked.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    SchemaValidation { tool: String, message: String },

    #[error("tool registered twice: {0}")]
    DuplicateTool(String),

    #[error("invalid schema for {tool}: {message}")]
    InvalidSchema { tool: String, message: String },
}

impl ToolError {
    pub fn to_rpc_error(&self) -> JsonRpcError {
        match self {
            ToolError::UnknownTool(_) | ToolError::SchemaValidation { .. } => {
                JsonRpcError::new(INVALID_PARAMS, self.to_string())
            }
            ToolError::DuplicateTool(_) | ToolError::InvalidSchema { .. } => {
                JsonRpcError::new(INTERNAL_ERROR, self.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_has_no_id() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).unwrap();
        assert!(request.is_notification());
    }

    #[test]
    fn test_progress_token_lookup() {
        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "list_categories", "_meta": {"progressToken": "p-1"}}
        }))
        .unwrap();
        assert_eq!(request.progress_token(), Some(json!("p-1")));
    }

    #[test]
    fn test_response_omits_absent_fields() {
        let value = serde_json::to_value(JsonRpcResponse::success(json!(1), json!({}))).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["jsonrpc"], "2.0");
    }

    #[test]
    fn test_unknown_tool_is_invalid_params() {
        assert_eq!(ToolError::UnknownTool("x".into()).to_rpc_error().code, INVALID_PARAMS);
    }
}
