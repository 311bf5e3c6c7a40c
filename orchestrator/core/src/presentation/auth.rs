// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Bearer authentication middleware.
//!
//! Installed in front of every route except liveness, including the tool
//! protocol mount. Behavior follows the bridge state:
//! - Disabled: request passes with `AuthContext::Anonymous`
//! - Enabled: `Authorization: Bearer <token>` is validated by the external
//!   authority; the request is rejected before any handler runs on failure

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::domain::auth::AuthenticationBridge;
use crate::presentation::error::ApiError;

pub async fn authenticate(
    State(bridge): State<AuthenticationBridge>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default().to_string());

    match bridge.authenticate(header.as_deref()).await {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => {
            debug!(path = %request.uri().path(), error = %e, "Request rejected by authentication bridge");
            ApiError::Auth(e).into_response()
        }
    }
}
