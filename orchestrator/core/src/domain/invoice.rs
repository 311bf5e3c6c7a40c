// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Invoice Aggregate
//!
//! An invoice is issued against one [`Company`](crate::domain::company::Company), may be filed
//! under one [`Category`](crate::domain::category::Category), carries at least one line item and
//! optionally a single attached document kept in object storage.
//!
//! # Lifecycle
//!
//! ```text
//! draft ──► sent ──► paid
//!   │         │
//!   └────┬────┘
//!        ▼
//!    cancelled
//! ```
//!
//! `paid` and `cancelled` are terminal; terminal invoices can no longer be edited.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Owns invoice invariants (totals, dates, currency, status transitions)

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::category::CategoryId;
use crate::domain::company::CompanyId;
use crate::domain::validation::{optional_text, required_text, ValidationError};

pub const MAX_NUMBER_LEN: usize = 64;
pub const MAX_NOTES_LEN: usize = 2000;
pub const MAX_ITEM_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct InvoiceId(pub Uuid);

impl InvoiceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for InvoiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    /// Staying in the same status is always allowed.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        *self == next
            || matches!(
                (self, next),
                (Draft, Sent) | (Draft, Cancelled) | (Sent, Paid) | (Sent, Cancelled)
            )
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(ValidationError::new(format!("unknown invoice status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InvoiceItem {
    pub description: String,
    /// Number of units, at least 1
    pub quantity: u32,
    /// Price of one unit in minor currency units (cents)
    pub unit_price_cents: i64,
}

/// Metadata of the document stored in object storage for an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Attachment {
    pub key: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: String,
    pub company_id: CompanyId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    pub issue_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// ISO 4217 code, upper case
    pub currency: String,
    pub status: InvoiceStatus,
    pub items: Vec<InvoiceItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    /// Sum of quantity × unit price over all items, in minor units
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NewInvoice {
    /// Invoice number, unique across all invoices
    pub number: String,
    pub company_id: CompanyId,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Three-letter currency code such as EUR or USD
    pub currency: String,
    pub items: Vec<InvoiceItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update. Absent fields are left untouched; status changes go through
/// [`Invoice::transition_to`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvoicePatch {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<InvoiceItem>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Optional narrowing of invoice listings. All present criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvoiceFilter {
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
}

impl Invoice {
    pub fn new(input: NewInvoice) -> Result<Self, ValidationError> {
        let now = Utc::now();
        Self {
            id: InvoiceId::new(),
            number: input.number,
            company_id: input.company_id,
            category_id: input.category_id,
            issue_date: input.issue_date,
            due_date: input.due_date,
            currency: input.currency,
            status: InvoiceStatus::Draft,
            items: input.items,
            notes: input.notes,
            attachment: None,
            total_cents: 0,
            created_at: now,
            updated_at: now,
        }
        .normalized()
    }

    pub fn apply(&mut self, patch: InvoicePatch) -> Result<(), ValidationError> {
        if self.status.is_terminal() {
            return Err(ValidationError::new(format!(
                "invoice {} is {} and can no longer be edited",
                self.number, self.status
            )));
        }

        let mut next = self.clone();
        if let Some(number) = patch.number {
            next.number = number;
        }
        if let Some(company_id) = patch.company_id {
            next.company_id = company_id;
        }
        if let Some(category_id) = patch.category_id {
            next.category_id = Some(category_id);
        }
        if let Some(issue_date) = patch.issue_date {
            next.issue_date = issue_date;
        }
        if let Some(due_date) = patch.due_date {
            next.due_date = Some(due_date);
        }
        if let Some(currency) = patch.currency {
            next.currency = currency;
        }
        if let Some(items) = patch.items {
            next.items = items;
        }
        if let Some(notes) = patch.notes {
            next.notes = Some(notes);
        }

        let mut next = next.normalized()?;
        next.touch();
        *self = next;
        Ok(())
    }

    pub fn transition_to(&mut self, next: InvoiceStatus) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::new(format!(
                "invoice {} cannot move from {} to {}",
                self.number, self.status, next
            )));
        }
        if self.status != next {
            self.status = next;
            self.touch();
        }
        Ok(())
    }

    pub fn attach(&mut self, attachment: Attachment) {
        self.attachment = Some(attachment);
        self.touch();
    }

    pub fn detach(&mut self) -> Option<Attachment> {
        let previous = self.attachment.take();
        if previous.is_some() {
            self.touch();
        }
        previous
    }

    /// Advance `updated_at` strictly past its previous value; it doubles as the write version.
    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + chrono::Duration::microseconds(1)
        };
    }

    fn normalized(mut self) -> Result<Self, ValidationError> {
        self.number = required_text("number", &self.number, MAX_NUMBER_LEN)?;
        self.currency = normalize_currency(&self.currency)?;
        self.notes = optional_text("notes", self.notes.as_deref(), MAX_NOTES_LEN)?;

        if let Some(due) = self.due_date {
            if due < self.issue_date {
                return Err(ValidationError::new(format!(
                    "due_date {due} is before issue_date {}",
                    self.issue_date
                )));
            }
        }

        if self.items.is_empty() {
            return Err(ValidationError::new("an invoice needs at least one item"));
        }
        for (index, item) in self.items.iter_mut().enumerate() {
            item.description = required_text(
                &format!("items[{index}].description"),
                &item.description,
                MAX_ITEM_DESCRIPTION_LEN,
            )?;
            if item.quantity == 0 {
                return Err(ValidationError::new(format!("items[{index}].quantity must be at least 1")));
            }
            if item.unit_price_cents < 0 {
                return Err(ValidationError::new(format!(
                    "items[{index}].unit_price_cents must not be negative"
                )));
            }
        }
        self.total_cents = total_cents(&self.items)?;
        Ok(self)
    }
}

/// Sum of all line totals with overflow detection.
pub fn total_cents(items: &[InvoiceItem]) -> Result<i64, ValidationError> {
    items.iter().try_fold(0i64, |acc, item| {
        item.unit_price_cents
            .checked_mul(i64::from(item.quantity))
            .and_then(|line| acc.checked_add(line))
            .ok_or_else(|| ValidationError::new("invoice total is too large"))
    })
}

fn normalize_currency(code: &str) -> Result<String, ValidationError> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::new(format!(
            "currency '{code}' must be a three-letter code"
        )));
    }
    Ok(code.to_ascii_uppercase())
}

/// Object storage key for an invoice document:
/// `invoices/<invoice_id>/<upload_id>/<safe filename>`.
/// Each upload gets its own `upload_id`.
pub fn attachment_key(
    invoice_id: InvoiceId,
    upload_id: Uuid,
    filename: &str,
) -> Result<String, ValidationError> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let safe: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        return Err(ValidationError::new("attachment filename must not be empty"));
    }
    Ok(format!("invoices/{invoice_id}/{}/{safe}", upload_id.simple()))
}
