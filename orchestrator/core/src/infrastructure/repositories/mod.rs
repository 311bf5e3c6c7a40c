// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository abstractions defined in the
//! domain layer. Each repository is written once against the engine-neutral
//! [`Database`](crate::infrastructure::database::Database) handle and therefore
//! works unchanged on the local SQLite file and on remote libSQL.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **SqlCategoryRepository** - categories, case-insensitive unique names
//! - **SqlCompanyRepository** - companies
//! - **SqlInvoiceRepository** - invoices with line items and attachment metadata
//!
//! Timestamps are stored as RFC 3339 text and calendar dates as `YYYY-MM-DD`,
//! which keeps lexical and chronological order identical.

pub mod category;
pub mod company;
pub mod invoice;

pub use category::SqlCategoryRepository;
pub use company::SqlCompanyRepository;
pub use invoice::SqlInvoiceRepository;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::domain::repository::RepositoryError;

pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

pub(crate) fn format_date(value: &NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, RepositoryError> {
    Ok(NaiveDate::parse_from_str(value, "%Y-%m-%d")?)
}
