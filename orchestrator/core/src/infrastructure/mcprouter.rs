// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! MCP Router Token Validator
//!
//! Delegates bearer-token validation to an external MCP router acting as an
//! opaque validation oracle. No token format is interpreted locally.
//!
//! # API Endpoints
//!
//! - `GET /v1/auth/verify` with `Authorization: Bearer <token>`
//!   - `2xx` + `{ "user_id" | "sub", "name"?, "scopes"? }` - token accepted
//!   - `401` / `403` - token rejected
//!   - anything else, transport error or timeout - authority unavailable (fail closed)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::auth::{AuthError, Identity, TokenValidator};
use crate::domain::config::AuthSettings;

pub struct McpRouterValidator {
    client: Client,
    verify_url: Url,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
}

impl McpRouterValidator {
    pub fn new(settings: &AuthSettings) -> Result<Self, AuthError> {
        Self::with_timeout(&settings.server_url, settings.timeout)
    }

    pub fn with_timeout(server_url: &str, timeout: Duration) -> Result<Self, AuthError> {
        let server_url = server_url.trim();
        if server_url.is_empty() {
            return Err(AuthError::Config("MCPROUTER_SERVER_URL is empty".to_string()));
        }
        let base = Url::parse(server_url)
            .map_err(|e| AuthError::Config(format!("invalid MCPROUTER_SERVER_URL '{server_url}': {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AuthError::Config(format!(
                "MCPROUTER_SERVER_URL must be http(s), got '{}'",
                base.scheme()
            )));
        }
        let verify_url = Url::parse(&format!("{}/v1/auth/verify", base.as_str().trim_end_matches('/')))
            .map_err(|e| AuthError::Config(e.to_string()))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { client, verify_url })
    }
}

#[async_trait]
impl TokenValidator for McpRouterValidator {
    async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let response = self
            .client
            .get(self.verify_url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Authentication authority unreachable");
                AuthError::AuthUnavailable(if e.is_timeout() {
                    "authority timed out".to_string()
                } else {
                    "authority unreachable".to_string()
                })
            })?;

        match response.status() {
            status if status.is_success() => {
                let body: VerifyResponse = response
                    .json()
                    .await
                    .map_err(|e| AuthError::AuthUnavailable(format!("invalid authority response: {e}")))?;
                let subject = body
                    .user_id
                    .or(body.sub)
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| AuthError::AuthUnavailable("authority response lacks a subject".to_string()))?;
                debug!(subject = %subject, "Bearer token accepted");
                Ok(Identity { subject, name: body.name, scopes: body.scopes })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthError::Unauthorized("token rejected by authority".to_string()))
            }
            status => {
                warn!(status = status.as_u16(), "Authentication authority returned unexpected status");
                Err(AuthError::AuthUnavailable(format!("authority returned HTTP {}", status.as_u16())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(url: &str) -> McpRouterValidator {
        McpRouterValidator::with_timeout(url, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_empty_or_invalid_url_is_config_error() {
        assert!(matches!(McpRouterValidator::with_timeout("", Duration::from_secs(1)), Err(AuthError::Config(_))));
        assert!(matches!(
            McpRouterValidator::with_timeout("not a url", Duration::from_secs(1)),
            Err(AuthError::Config(_))
        ));
        assert!(matches!(
            McpRouterValidator::with_timeout("ftp://router", Duration::from_secs(1)),
            Err(AuthError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_accepted_token_yields_identity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/auth/verify")
            .match_header("authorization", "Bearer good-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"user_id":"u-42","name":"Ada","scopes":["invoices:write"]}"#)
            .create_async()
            .await;

        let identity = validator(&server.url()).validate("good-token").await.unwrap();
        assert_eq!(identity.subject, "u-42");
        assert_eq!(identity.name.as_deref(), Some("Ada"));
        assert_eq!(identity.scopes, vec!["invoices:write".to_string()]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sub_claim_is_accepted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/auth/verify")
            .with_status(200)
            .with_body(r#"{"sub":"agent-7"}"#)
            .create_async()
            .await;

        let identity = validator(&format!("{}/", server.url())).validate("t").await.unwrap();
        assert_eq!(identity.subject, "agent-7");
    }

    #[tokio::test]
    async fn test_rejected_token_is_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/v1/auth/verify").with_status(401).create_async().await;

        let result = validator(&server.url()).validate("bad").await;
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_server_error_fails_closed() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/v1/auth/verify").with_status(502).create_async().await;

        let result = validator(&server.url()).validate("t").await;
        assert!(matches!(result, Err(AuthError::AuthUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unreachable_authority_fails_closed() {
        let result = validator("http://127.0.0.1:1").validate("t").await;
        assert!(matches!(result, Err(AuthError::AuthUnavailable(_))));
    }
}
