// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Apply schema migrations without starting the server.

use anyhow::{Context, Result};
use colored::Colorize;

use invoicer_core::domain::config::{DatabaseSettings, ServiceConfig};
use invoicer_core::infrastructure::{BackendKind, Database};

pub async fn run() -> Result<()> {
    let config = ServiceConfig::from_env().context("Failed to load configuration")?;
    let kind = migrate(&config.database).await?;
    println!("{} {} database is up to date", "✓".green(), kind);
    Ok(())
}

/// Opening a database applies every pending migration.
pub async fn migrate(settings: &DatabaseSettings) -> Result<BackendKind> {
    let database = Database::open(settings).await.context("Failed to initialize storage")?;
    let kind = database.kind();
    database.close().await;
    Ok(kind)
}
