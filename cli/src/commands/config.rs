// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use invoicer_core::domain::config::ServiceConfig;
use invoicer_core::infrastructure::select_backend;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration with credentials redacted
    Show,

    /// Check that the environment forms a usable configuration
    Validate,
}

pub async fn handle_command(command: ConfigCommand) -> Result<()> {
    let config = ServiceConfig::from_env().context("Failed to load configuration")?;
    match command {
        ConfigCommand::Show => show(&config),
        ConfigCommand::Validate => validate(&config).await,
    }
}

/// Pretty JSON rendering of `config`; credentials never appear in it.
pub fn render(config: &ServiceConfig) -> Result<String> {
    serde_json::to_string_pretty(&config.redacted()).context("Failed to serialize configuration")
}

fn show(config: &ServiceConfig) -> Result<()> {
    println!("{}", render(config)?);
    Ok(())
}

/// Human readable findings for `config`, or the first blocking problem.
pub async fn check(config: &ServiceConfig) -> Result<Vec<String>> {
    let addr = config.server.bind_address().await.context("Invalid listen address")?;
    let backend = select_backend(&config.database);

    let mut notes = vec![
        format!("listen address: {addr}"),
        format!("storage backend: {}", backend.kind()),
    ];
    notes.push(match &config.object_storage {
        Some(storage) => format!("object storage: bucket {}", storage.bucket),
        None => "object storage: disabled".to_string(),
    });
    notes.push(match &config.auth {
        Some(auth) => format!("authentication: {}", auth.server_url),
        None => "authentication: disabled".to_string(),
    });
    Ok(notes)
}

async fn validate(config: &ServiceConfig) -> Result<()> {
    for note in check(config).await? {
        println!("  {} {}", "•".cyan(), note);
    }
    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}
