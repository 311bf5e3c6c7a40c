// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Invoicer Core
//!
//! Category, company and invoice management served over two protocol
//! surfaces that share one set of domain services.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, services, storage backends and the HTTP/MCP
//!   presentation, wired together by the `invoicer` binary

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
