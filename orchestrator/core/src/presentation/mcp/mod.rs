// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Protocol Server
//!
//! Model Context Protocol surface over the same [`DomainServices`] the REST
//! routes use. The adapter does no persistence or validation of its own
//! beyond structural schema checks.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | JSON-RPC 2.0 envelopes and error codes |
//! | [`registry`] | Immutable tool table with schema-checked dispatch |
//! | [`tools`] | The category, company and invoice tool bindings |
//! | [`transport`] | Streamable HTTP handler mounted at `/mcp` |
//!
//! [`DomainServices`]: crate::application::services::DomainServices

pub mod protocol;
pub mod registry;
pub mod tools;
pub mod transport;

pub use protocol::ToolError;
pub use registry::{ToolDescriptor, ToolOutcome, ToolRegistry, ToolRegistryBuilder};
pub use transport::SessionStore;
