// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`invoicer-core`)
//!
//! HTTP surface that translates external requests into application service
//! calls. **No business logic lives here**: all real work is delegated to
//! [`DomainServices`](crate::application::services::DomainServices).
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | REST CRUD endpoints, liveness and readiness |
//! | [`mcp`] | HTTP/SSE (Axum) | Model Context Protocol tool server at `/mcp` |
//! | [`auth`] | middleware | Bearer-token gate backed by the authentication bridge |
//! | [`server`] | TCP | Router composition, serving and graceful shutdown |

pub mod api;
pub mod auth;
pub mod error;
pub mod mcp;
pub mod server;

pub use error::ApiError;
pub use server::{ApiServer, ServerError};
