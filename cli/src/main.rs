// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Invoicer
//!
//! The `invoicer` binary supervises the invoice service: it wires storage,
//! object storage and the domain services, then serves the REST API and the
//! MCP tool endpoint until SIGINT or SIGTERM.
//!
//! ## Commands
//!
//! - `invoicer` / `invoicer serve` - Run the service (default)
//! - `invoicer migrate` - Open the configured database and apply migrations
//! - `invoicer config show|validate` - Inspect environment configuration
//! - `invoicer status` - Query a running instance

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use invoicer::commands::{self, ConfigCommand};
use invoicer::daemon;

/// Invoice, company and category service with an MCP tool surface
#[derive(Parser)]
#[command(name = "invoicer")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API and tool server (default)
    #[command(name = "serve")]
    Serve,

    /// Apply database migrations and exit
    #[command(name = "migrate")]
    Migrate,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Query health and readiness of a running instance
    #[command(name = "status")]
    Status {
        /// Base URL of the instance
        #[arg(long, env = "INVOICER_URL", default_value = "http://127.0.0.1:8080")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables take precedence
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            info!(version = env!("CARGO_PKG_VERSION"), "Starting invoicer");
            daemon::run().await
        }
        Commands::Migrate => commands::migrate::run().await,
        Commands::Config { command } => commands::config::handle_command(command).await,
        Commands::Status { url } => commands::status::run(&url).await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();

    Ok(())
}
