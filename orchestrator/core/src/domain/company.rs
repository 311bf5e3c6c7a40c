// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::validation::{self, optional_text, required_text, ValidationError};

pub const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CompanyId(pub Uuid);

impl CompanyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for CompanyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CompanyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counterparty an invoice is issued to or received from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    /// VAT number or other tax registration identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NewCompany {
    pub name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Partial update. Absent fields are left untouched; empty strings clear optional fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompanyPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Company {
    pub fn new(input: NewCompany) -> Result<Self, ValidationError> {
        let now = Utc::now();
        Ok(Self {
            id: CompanyId::new(),
            name: required_text("name", &input.name, MAX_NAME_LEN)?,
            tax_id: optional_text("tax_id", input.tax_id.as_deref(), 64)?,
            email: validation::email(input.email.as_deref())?,
            phone: optional_text("phone", input.phone.as_deref(), 64)?,
            address: optional_text("address", input.address.as_deref(), 500)?,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, patch: CompanyPatch) -> Result<(), ValidationError> {
        // Validate everything before mutating so a bad field leaves the aggregate intact.
        let name = patch
            .name
            .map(|n| required_text("name", &n, MAX_NAME_LEN))
            .transpose()?;
        let tax_id = patch
            .tax_id
            .map(|v| optional_text("tax_id", Some(&v), 64))
            .transpose()?;
        let email = patch.email.map(|v| validation::email(Some(&v))).transpose()?;
        let phone = patch
            .phone
            .map(|v| optional_text("phone", Some(&v), 64))
            .transpose()?;
        let address = patch
            .address
            .map(|v| optional_text("address", Some(&v), 500))
            .transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(tax_id) = tax_id {
            self.tax_id = tax_id;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(phone) = phone {
            self.phone = phone;
        }
        if let Some(address) = address {
            self.address = address;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
