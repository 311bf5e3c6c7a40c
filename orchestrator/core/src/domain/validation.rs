// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Field-level validation shared by the Category, Company and Invoice aggregates.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Normalizes and checks raw user input before it reaches an aggregate

use thiserror::Error;

/// A domain rule was violated by caller-supplied data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Trim a required text field and enforce a length bound.
pub fn required_text(field: &str, value: &str, max_len: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(ValidationError::new(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field. Blank values collapse to `None`.
pub fn optional_text(
    field: &str,
    value: Option<&str>,
    max_len: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) if trimmed.chars().count() > max_len => Err(ValidationError::new(format!(
            "{field} must be at most {max_len} characters"
        ))),
        Some(trimmed) => Ok(Some(trimmed.to_string())),
    }
}

/// Minimal structural e-mail check: one `@` with non-empty local and domain parts.
pub fn email(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(address) = optional_text("email", value, 254)? else {
        return Ok(None);
    };
    let mut parts = address.split('@');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty()
    );
    if !valid {
        return Err(ValidationError::new(format!("email '{address}' is not a valid address")));
    }
    Ok(Some(address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims() {
        assert_eq!(required_text("name", "  Travel ", 10).unwrap(), "Travel");
    }

    #[test]
    fn test_required_text_rejects_blank_and_long() {
        assert!(required_text("name", "   ", 10).is_err());
        assert!(required_text("name", "abcdefghijk", 10).is_err());
    }

    #[test]
    fn test_optional_text_blank_is_none() {
        assert_eq!(optional_text("notes", Some("  "), 10).unwrap(), None);
        assert_eq!(optional_text("notes", None, 10).unwrap(), None);
    }

    #[test]
    fn test_email_shapes() {
        assert_eq!(email(Some("billing@acme.io")).unwrap().as_deref(), Some("billing@acme.io"));
        assert!(email(Some("billing")).is_err());
        assert!(email(Some("a@b@c")).is_err());
        assert!(email(Some("@acme.io")).is_err());
        assert_eq!(email(Some("")).unwrap(), None);
    }
}
