// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! REST error envelope
//!
//! Every failure leaves the HTTP surface as `{ "error": { "kind", "message" } }`
//! with a status derived from the error kind.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::application::error::ServiceError;
use crate::domain::auth::AuthError;

#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    /// Malformed identifier, query parameter or body
    BadRequest(String),
    Auth(AuthError),
    PayloadTooLarge(String),
    Timeout(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Service(ServiceError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Service(ServiceError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Service(ServiceError::StorageUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Service(ServiceError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
            ApiError::Auth(AuthError::AuthUnavailable(_) | AuthError::Config(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Service(e) => e.kind(),
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Auth(AuthError::Unauthorized(_)) => "unauthorized",
            ApiError::Auth(_) => "auth_unavailable",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::Timeout(_) => "timeout",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Service(ServiceError::Storage(detail)) => {
                // Backend details stay in the log.
                error!(error = %detail, "Storage failure while handling request");
                "internal storage error".to_string()
            }
            ApiError::Service(e) => e.to_string(),
            ApiError::BadRequest(msg) | ApiError::PayloadTooLarge(msg) | ApiError::Timeout(msg) => {
                msg.clone()
            }
            ApiError::Auth(e) => e.to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

/// Rewrite the bare 408 and 413 responses produced by the timeout and body
/// limit layers into the error envelope. Responses that already carry JSON
/// pass through untouched.
pub async fn envelope_bare_errors(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if is_json {
        return response;
    }
    match response.status() {
        StatusCode::REQUEST_TIMEOUT => {
            ApiError::Timeout("request did not complete in time".to_string()).into_response()
        }
        StatusCode::PAYLOAD_TOO_LARGE => {
            ApiError::PayloadTooLarge("request body is too large".to_string()).into_response()
        }
        _ => response,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({ "error": { "kind": self.kind(), "message": self.message() } });
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
