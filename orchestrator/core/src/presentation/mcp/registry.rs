// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tool Registry
//!
//! Static table of every tool the protocol server can dispatch. Each entry
//! carries JSON Schemas derived from its Rust input/output types, a compiled
//! input validator and a handler bound to the shared [`DomainServices`].
//!
//! Registration is total: the registry is assembled once through
//! [`ToolRegistryBuilder`] and is immutable afterwards. Dispatch validates the
//! arguments against the input schema before the handler runs, so a rejected
//! call never reaches a domain service.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::application::error::ServiceError;
use crate::application::services::DomainServices;
use crate::presentation::mcp::protocol::ToolError;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

type ToolFuture = Pin<Box<dyn Future<Output = Result<Value, ServiceError>> + Send>>;
type ToolHandler =
    Arc<dyn Fn(DomainServices, Value) -> Result<ToolFuture, serde_json::Error> + Send + Sync>;

/// Public view of a registered tool, as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    validator: jsonschema::Validator,
    handler: ToolHandler,
}

/// Result of a dispatched call that passed the boundary checks.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    /// The service rejected the call; reported inside the protocol stream.
    Failed { kind: &'static str, message: String },
}

impl ToolOutcome {
    fn label(&self) -> &'static str {
        match self {
            ToolOutcome::Success(_) => "success",
            ToolOutcome::Failed { .. } => "error",
        }
    }
}

pub struct ToolRegistryBuilder {
    services: DomainServices,
    call_timeout: Duration,
    order: Vec<String>,
    tools: HashMap<String, RegisteredTool>,
    error: Option<ToolError>,
}

impl ToolRegistryBuilder {
    /// Upper bound for a single handler invocation.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn register<I, O, F, Fut>(mut self, name: &str, description: &str, handler: F) -> Self
    where
        I: DeserializeOwned + JsonSchema + Send + 'static,
        O: Serialize + JsonSchema + 'static,
        F: Fn(DomainServices, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ServiceError>> + Send + 'static,
    {
        if self.error.is_some() {
            return self;
        }
        if self.tools.contains_key(name) {
            self.error = Some(ToolError::DuplicateTool(name.to_string()));
            return self;
        }

        let input_schema = match serde_json::to_value(schemars::schema_for!(I)) {
            Ok(schema) => schema,
            Err(e) => {
                self.error = Some(ToolError::InvalidSchema {
                    tool: name.to_string(),
                    message: e.to_string(),
                });
                return self;
            }
        };
        let output_schema = match serde_json::to_value(schemars::schema_for!(O)) {
            Ok(schema) => schema,
            Err(e) => {
                self.error = Some(ToolError::InvalidSchema {
                    tool: name.to_string(),
                    message: e.to_string(),
                });
                return self;
            }
        };
        let validator = match jsonschema::validator_for(&input_schema) {
            Ok(validator) => validator,
            Err(e) => {
                self.error = Some(ToolError::InvalidSchema {
                    tool: name.to_string(),
                    message: e.to_string(),
                });
                return self;
            }
        };

        let handler = Arc::new(handler);
        let bound: ToolHandler = Arc::new(
            move |services: DomainServices, args: Value| -> Result<ToolFuture, serde_json::Error> {
                let input: I = serde_json::from_value(args)?;
                let handler = handler.clone();
                let future: ToolFuture = Box::pin(async move {
                    let output = handler(services, input).await?;
                    serde_json::to_value(output).map_err(|e| ServiceError::Storage(e.to_string()))
                });
                Ok(future)
            },
        );

        self.order.push(name.to_string());
        self.tools.insert(
            name.to_string(),
            RegisteredTool {
                descriptor: ToolDescriptor {
                    name: name.to_string(),
                    description: description.to_string(),
                    input_schema,
                    output_schema,
                },
                validator,
                handler: bound,
            },
        );
        self
    }

    pub fn build(self) -> Result<ToolRegistry, ToolError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(ToolRegistry {
            services: self.services,
            call_timeout: self.call_timeout,
            order: self.order,
            tools: self.tools,
        })
    }
}

pub struct ToolRegistry {
    services: DomainServices,
    call_timeout: Duration,
    order: Vec<String>,
    tools: HashMap<String, RegisteredTool>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl ToolRegistry {
    pub fn builder(services: DomainServices) -> ToolRegistryBuilder {
        ToolRegistryBuilder {
            services,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            order: Vec::new(),
            tools: HashMap::new(),
            error: None,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name).map(|tool| &tool.descriptor)
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> Vec<&ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|tool| &tool.descriptor))
            .collect()
    }

    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutcome, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| {
            metrics::counter!("invoicer_tool_calls_total", "tool" => "unknown", "outcome" => "rejected").increment(1);
            ToolError::UnknownTool(name.to_string())
        })?;

        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        let rejected = |message: String| {
            metrics::counter!("invoicer_tool_calls_total", "tool" => name.to_string(), "outcome" => "rejected")
                .increment(1);
            ToolError::SchemaValidation { tool: name.to_string(), message }
        };

        if let Some(first) = tool.validator.iter_errors(&arguments).next() {
            return Err(rejected(first.to_string()));
        }
        let future = (tool.handler)(self.services.clone(), arguments)
            .map_err(|e| rejected(e.to_string()))?;

        debug!(tool = %name, "Dispatching tool call");
        let outcome = match tokio::time::timeout(self.call_timeout, future).await {
            Ok(Ok(value)) => ToolOutcome::Success(value),
            Ok(Err(e)) => ToolOutcome::Failed { kind: e.kind(), message: e.to_string() },
            Err(_) => {
                warn!(tool = %name, timeout_secs = self.call_timeout.as_secs(), "Tool call timed out");
                ToolOutcome::Failed {
                    kind: "timeout",
                    message: format!("tool call exceeded {}s", self.call_timeout.as_secs()),
                }
            }
        };

        metrics::counter!("invoicer_tool_calls_total", "tool" => name.to_string(), "outcome" => outcome.label())
            .increment(1);
        Ok(outcome)
    }
}
