// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Delegated bearer-token authentication
//!
//! Token validation is delegated to an external authority behind the narrow
//! [`TokenValidator`] interface; no token format is assumed locally. The
//! [`AuthenticationBridge`] has two states and moves from `Disabled` to
//! `Enabled` at most once, during server setup.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Per-request authentication outcome and the validator contract

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller identity as reported by the external authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed or rejected bearer token
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The authority could not give an answer (unreachable, timeout, unexpected reply)
    #[error("authentication service unavailable: {0}")]
    AuthUnavailable(String),

    #[error("authentication bridge misconfigured: {0}")]
    Config(String),
}

#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Request-scoped authentication outcome, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthContext {
    /// The bridge is disabled; the request was let through without validation
    Anonymous,
    Authenticated(Identity),
}

impl AuthContext {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthContext::Anonymous => None,
            AuthContext::Authenticated(identity) => Some(identity),
        }
    }
}

#[derive(Clone, Default)]
pub enum AuthenticationBridge {
    #[default]
    Disabled,
    Enabled(Arc<dyn TokenValidator>),
}

impl AuthenticationBridge {
    pub fn is_enabled(&self) -> bool {
        matches!(self, AuthenticationBridge::Enabled(_))
    }

    /// Resolve the authentication context for an optional `Authorization` header value.
    ///
    /// Disabled bridges accept everything as [`AuthContext::Anonymous`]. Enabled bridges
    /// require a well-formed `Bearer` credential and fail closed on authority errors.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        let validator = match self {
            AuthenticationBridge::Disabled => return Ok(AuthContext::Anonymous),
            AuthenticationBridge::Enabled(validator) => validator,
        };

        let header = authorization
            .ok_or_else(|| AuthError::Unauthorized("missing bearer token".to_string()))?;
        let token = bearer_token(header)
            .ok_or_else(|| AuthError::Unauthorized("malformed authorization header".to_string()))?;

        validator.validate(token).await.map(AuthContext::Authenticated)
    }
}

impl std::fmt::Debug for AuthenticationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthenticationBridge::Disabled => f.write_str("AuthenticationBridge::Disabled"),
            AuthenticationBridge::Enabled(_) => f.write_str("AuthenticationBridge::Enabled(..)"),
        }
    }
}

/// Extract the credential from `Bearer <token>`; scheme is case-insensitive.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return None;
    }
    Some(token)
}
