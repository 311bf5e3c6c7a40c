// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod category;
pub mod company;
pub mod error;
pub mod invoice;
pub mod services;

// Re-export service contracts for convenience
pub use category::{CategoryService, StandardCategoryService};
pub use company::{CompanyService, StandardCompanyService};
pub use error::ServiceError;
pub use invoice::{AttachmentLink, AttachmentUpload, InvoiceService, StandardInvoiceService};
pub use services::DomainServices;
