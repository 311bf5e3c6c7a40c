// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Query a running instance through `/health` and `/readyz`.

use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct InstanceStatus {
    pub uptime_seconds: Option<u64>,
    pub ready: bool,
    pub readiness: Value,
}

pub async fn fetch_status(base_url: &str) -> Result<InstanceStatus> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("Failed to build HTTP client")?;
    let base = base_url.trim_end_matches('/');

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .with_context(|| format!("Instance at {base} is not reachable"))?
        .error_for_status()
        .context("Health check failed")?
        .json()
        .await
        .context("Malformed health response")?;

    let response = client
        .get(format!("{base}/readyz"))
        .send()
        .await
        .context("Readiness check failed")?;
    let ready = response.status().is_success();
    let readiness = response.json().await.unwrap_or(Value::Null);

    Ok(InstanceStatus { uptime_seconds: health["uptime_seconds"].as_u64(), ready, readiness })
}

pub async fn run(base_url: &str) -> Result<()> {
    let status = fetch_status(base_url).await?;

    if status.ready {
        println!("{}", "✓ Invoicer is ready".green());
    } else {
        println!("{}", "✗ Invoicer is running but not ready".yellow());
    }
    if let Some(uptime) = status.uptime_seconds {
        println!("  Uptime: {uptime}s");
    }
    for key in ["storage", "object_storage", "authentication"] {
        if let Some(value) = status.readiness.get(key).and_then(Value::as_str) {
            println!("  {key}: {value}");
        }
    }

    if !status.ready {
        anyhow::bail!("instance at {base_url} reported unavailable");
    }
    Ok(())
}
