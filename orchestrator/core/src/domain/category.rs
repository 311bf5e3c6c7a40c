// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::validation::{optional_text, required_text, ValidationError};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CategoryId(pub Uuid);

impl CategoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for CategoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Expense/income bucket an invoice can be filed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NewCategory {
    /// Display name, unique ignoring case
    pub name: String,
    /// Optional free-form description
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update. Absent fields are left untouched; an empty description clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Category {
    pub fn new(input: NewCategory) -> Result<Self, ValidationError> {
        let now = Utc::now();
        Ok(Self {
            id: CategoryId::new(),
            name: required_text("name", &input.name, MAX_NAME_LEN)?,
            description: optional_text(
                "description",
                input.description.as_deref(),
                MAX_DESCRIPTION_LEN,
            )?,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, patch: CategoryPatch) -> Result<(), ValidationError> {
        let name = patch
            .name
            .map(|n| required_text("name", &n, MAX_NAME_LEN))
            .transpose()?;
        let description = patch
            .description
            .map(|d| optional_text("description", Some(&d), MAX_DESCRIPTION_LEN))
            .transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = description {
            self.description = description;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
