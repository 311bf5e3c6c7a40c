// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! API Server
//!
//! Owns the HTTP listener. Composes the REST routes, the optional tool
//! protocol mount and the optional authentication gate into one router, then
//! serves it until the cancellation token fires.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()──▶ Serving ──cancel / shutdown()──▶ Stopped
//! ```
//!
//! `shutdown()` is safe in every state: before `start` and after `Stopped` it
//! returns immediately, while `Serving` it cancels and waits for the drain.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::application::services::DomainServices;
use crate::domain::auth::{AuthError, AuthenticationBridge, TokenValidator};
use crate::domain::config::{AuthSettings, ServerSettings};
use crate::infrastructure::database::Database;
use crate::infrastructure::mcprouter::McpRouterValidator;
use crate::presentation::api::{api_routes, health_routes, ApiState, Readiness};
use crate::presentation::auth::authenticate;
use crate::presentation::error::envelope_bare_errors;
use crate::presentation::mcp::registry::ToolRegistry;
use crate::presentation::mcp::transport;

/// Upper bound for any request body, uploads included.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("server error: {0}")]
    Serve(String),

    #[error("setup_routes() must be called before the server starts")]
    RoutesNotConfigured,

    #[error("server already started")]
    AlreadyStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServeState {
    Idle,
    Serving,
    Stopped,
}

pub struct ApiServer {
    services: DomainServices,
    tools: Arc<ToolRegistry>,
    settings: ServerSettings,
    readiness: Readiness,
    bridge: AuthenticationBridge,
    routes_ready: bool,
    streamable_http: bool,
    cancel: CancellationToken,
    state: watch::Sender<ServeState>,
    started_at: Instant,
}

impl ApiServer {
    pub fn new(
        services: DomainServices,
        tools: Arc<ToolRegistry>,
        settings: ServerSettings,
    ) -> Self {
        let (state, _) = watch::channel(ServeState::Idle);
        Self {
            services,
            tools,
            settings,
            readiness: Readiness::default(),
            bridge: AuthenticationBridge::Disabled,
            routes_ready: false,
            streamable_http: false,
            cancel: CancellationToken::new(),
            state,
            started_at: Instant::now(),
        }
    }

    /// Backends reported by `/readyz`.
    pub fn with_readiness(mut self, database: Database, object_storage: bool) -> Self {
        self.readiness.database = Some(database);
        self.readiness.object_storage = object_storage;
        self
    }

    /// Share a process-wide cancellation token with the server.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn setup_routes(&mut self) {
        if self.routes_ready {
            return;
        }
        self.routes_ready = true;
        info!("REST routes configured");
    }

    pub fn enable_streamable_http(&mut self) {
        if !self.streamable_http {
            self.streamable_http = true;
            info!(tools = self.tools.len(), "Tool protocol mounted at /mcp");
        }
    }

    /// Gate every route except `/health` behind the external token authority.
    pub fn enable_authentication(
        &mut self,
        settings: Option<&AuthSettings>,
    ) -> Result<(), AuthError> {
        let settings =
            settings.ok_or_else(|| AuthError::Config("MCPROUTER_SERVER_URL is not set".to_string()))?;
        let validator = McpRouterValidator::new(settings)?;
        self.enable_authentication_with(Arc::new(validator));
        info!(authority = %settings.server_url, "Authentication bridge enabled");
        Ok(())
    }

    pub fn enable_authentication_with(&mut self, validator: Arc<dyn TokenValidator>) {
        self.bridge = AuthenticationBridge::Enabled(validator);
    }

    pub fn is_authentication_enabled(&self) -> bool {
        self.bridge.is_enabled()
    }

    /// The composed router, as served by [`ApiServer::start`].
    pub fn router(&self) -> Result<Router, ServerError> {
        if !self.routes_ready {
            return Err(ServerError::RoutesNotConfigured);
        }

        let readiness = Readiness {
            authentication: self.bridge.is_enabled(),
            ..self.readiness.clone()
        };
        let state = ApiState {
            services: self.services.clone(),
            readiness,
            started_at: self.started_at,
        };

        let mut protected = api_routes(state).layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            self.settings.request_timeout,
        ));
        if self.streamable_http {
            protected = protected.merge(transport::routes(self.tools.clone()));
        }
        if self.bridge.is_enabled() {
            protected = protected.layer(axum::middleware::from_fn_with_state(
                self.bridge.clone(),
                authenticate,
            ));
        }

        Ok(health_routes(self.started_at)
            .merge(protected)
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(axum::middleware::map_response(envelope_bare_errors))
            .layer(TraceLayer::new_for_http()))
    }

    /// Bind `addr` and serve until cancelled.
    pub async fn start(&self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind { addr, reason: e.to_string() })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled, then drain.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let router = self.router()?;

        let mut claimed = false;
        self.state.send_if_modified(|state| {
            if *state == ServeState::Idle {
                *state = ServeState::Serving;
                claimed = true;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(ServerError::AlreadyStarted);
        }

        let addr = listener.local_addr().ok();
        info!(address = ?addr, "API server listening");

        let token = self.cancel.clone();
        let server = axum::serve(listener, router)
            .with_graceful_shutdown(async move { token.cancelled_owned().await });
        let mut handle = tokio::spawn(async move { server.await });

        let finished = tokio::select! {
            joined = &mut handle => Some(joined),
            _ = self.cancel.cancelled() => None,
        };

        let joined = match finished {
            Some(joined) => joined,
            None => {
                info!(grace_secs = self.settings.shutdown_timeout.as_secs(), "Draining in-flight requests");
                match tokio::time::timeout(self.settings.shutdown_timeout, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("Shutdown grace period elapsed, aborting remaining connections");
                        handle.abort();
                        self.state.send_replace(ServeState::Stopped);
                        return Ok(());
                    }
                }
            }
        };

        self.state.send_replace(ServeState::Stopped);
        info!("API server stopped");
        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ServerError::Serve(e.to_string())),
            Err(e) => Err(ServerError::Serve(e.to_string())),
        }
    }

    /// Stop accepting work and wait for the drain to finish.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        let mut state = self.state.subscribe();
        let current = *state.borrow_and_update();
        match current {
            ServeState::Idle | ServeState::Stopped => Ok(()),
            ServeState::Serving => {
                self.cancel.cancel();
                // The sender lives in `self`, so the channel cannot close under us.
                let _ = state.wait_for(|s| *s == ServeState::Stopped).await;
                Ok(())
            }
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.settings.shutdown_timeout
    }
}
