// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Composition root: configuration, storage, services, then the listener.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use invoicer_core::application::services::DomainServices;
use invoicer_core::domain::config::{ServiceConfig, DEFAULT_PRESIGN_TTL_SECS};
use invoicer_core::infrastructure::{connect_object_storage, Database};
use invoicer_core::presentation::mcp::ToolRegistry;
use invoicer_core::presentation::ApiServer;

use super::shutdown_signal;

/// Load configuration from the environment and serve until a signal arrives.
pub async fn run() -> Result<()> {
    let config = ServiceConfig::from_env().context("Failed to load configuration")?;

    let token = CancellationToken::new();
    let watcher = tokio::spawn({
        let token = token.clone();
        async move {
            tokio::select! {
                _ = shutdown_signal() => token.cancel(),
                _ = token.cancelled() => {}
            }
        }
    });

    let result = run_until(config, token.clone()).await;
    token.cancel();
    let _ = watcher.await;
    result
}

/// Wire every component from `config` and serve until `shutdown` is cancelled.
///
/// The database handle is closed on every exit path once it has been opened.
pub async fn run_until(config: ServiceConfig, shutdown: CancellationToken) -> Result<()> {
    let addr = config.server.bind_address().await.context("Invalid listen address")?;

    let database = Database::open(&config.database)
        .await
        .context("Failed to initialize storage")?;
    info!(backend = %database.kind(), "Storage ready");

    let result = serve(&config, database.clone(), addr, shutdown).await;

    database.close().await;
    info!("Storage closed");
    result
}

async fn serve(
    config: &ServiceConfig,
    database: Database,
    addr: std::net::SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    let object_storage = connect_object_storage(config.object_storage.as_ref()).await;
    let presign_ttl = config
        .object_storage
        .as_ref()
        .map(|settings| settings.presign_ttl)
        .unwrap_or(Duration::from_secs(DEFAULT_PRESIGN_TTL_SECS));
    let has_object_storage = object_storage.is_present();

    let services = DomainServices::new(&database, object_storage, presign_ttl);
    let tools = Arc::new(
        ToolRegistry::standard(services.clone(), config.server.request_timeout)
            .context("Failed to register tools")?,
    );
    info!(tools = tools.len(), "Tool registry built");

    let mut server = ApiServer::new(services, tools, config.server.clone())
        .with_readiness(database, has_object_storage)
        .with_cancellation(shutdown);
    server.enable_streamable_http();

    match config.auth.as_ref() {
        Some(settings) => {
            if let Err(e) = server.enable_authentication(Some(settings)) {
                warn!(error = %e, "Authentication bridge could not be enabled, serving without it");
            }
        }
        None => warn!("MCPROUTER_SERVER_URL not set, authentication disabled"),
    }

    server.setup_routes();

    info!(%addr, "Invoicer listening");
    server.start(addr).await.context("HTTP server failed")?;
    info!("Invoicer shut down");
    Ok(())
}
