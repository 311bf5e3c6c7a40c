// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Aggregates (categories, companies, invoices), their repository contracts and the
//! narrow interfaces to optional external collaborators (object storage, token authority).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Business rules with no knowledge of transports or storage engines

pub mod auth;
pub mod category;
pub mod company;
pub mod config;
pub mod invoice;
pub mod repository;
pub mod storage;
pub mod validation;
