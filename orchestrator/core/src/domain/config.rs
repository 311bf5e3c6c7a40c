// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service Configuration - environment-sourced startup settings
//!
//! Groups every recognized variable into one typed record:
//! - listener and timeout settings
//! - relational backend selection inputs (local file vs remote libSQL)
//! - optional S3-compatible object storage
//! - optional delegated authentication authority
//!
//! Parsing goes through `ServiceConfig::from_lookup` so it can be exercised
//! without mutating the process environment.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_SQLITE_PATH: &str = "invoice.db";
pub const DEFAULT_S3_REGION: &str = "us-east-1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 900;

const REDACTED: &str = "***";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Fully resolved process configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    /// `None` when `S3_BUCKET` is not set at all
    pub object_storage: Option<ObjectStorageSettings>,
    /// `None` when `MCPROUTER_SERVER_URL` is not set at all
    pub auth: Option<AuthSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    #[serde(with = "secs")]
    pub request_timeout: Duration,
    #[serde(with = "secs")]
    pub shutdown_timeout: Duration,
}

impl ServerSettings {
    /// Listen address for `HOST` and `PORT`. IP literals (IPv6 with or without
    /// brackets) are taken as is; names such as `localhost` are resolved and the
    /// first address wins.
    pub async fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            key: "HOST",
            value: self.host.clone(),
            reason,
        };
        let host = self.host.trim().trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }

        let mut resolved = tokio::net::lookup_host((host, self.port))
            .await
            .map_err(|e| invalid(e.to_string()))?;
        resolved
            .next()
            .ok_or_else(|| invalid("host name did not resolve to any address".to_string()))
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        }
    }
}

/// Inputs to relational backend selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseSettings {
    pub sqlite_path: String,
    pub turso_url: Option<String>,
    pub turso_auth_token: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            sqlite_path: DEFAULT_SQLITE_PATH.to_string(),
            turso_url: None,
            turso_auth_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectStorageSettings {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: String,
    /// Path-style (`endpoint/bucket/key`) rather than virtual-host addressing
    pub use_path_style: bool,
    #[serde(with = "secs")]
    pub presign_ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthSettings {
    pub server_url: String,
    #[serde(with = "secs")]
    pub timeout: Duration,
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string());
        let present = |key: &str| text(key).filter(|v| !v.is_empty());

        let server = ServerSettings {
            host: present("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            shutdown_timeout: Duration::from_secs(parse_or(
                &lookup,
                "SHUTDOWN_TIMEOUT_SECS",
                DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            )?),
        };

        let database = DatabaseSettings {
            sqlite_path: present("SQLITE_DB_PATH").unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
            turso_url: present("TURSO_DATABASE_URL"),
            turso_auth_token: present("TURSO_AUTH_TOKEN"),
        };

        let object_storage = match text("S3_BUCKET") {
            None => None,
            Some(bucket) => Some(ObjectStorageSettings {
                bucket,
                endpoint: present("S3_ENDPOINT"),
                access_key: present("S3_ACCESS_KEY"),
                secret_key: present("S3_SECRET_KEY"),
                region: present("S3_REGION").unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
                use_path_style: parse_bool_or(&lookup, "S3_USE_PATH_STYLE", true)?,
                presign_ttl: Duration::from_secs(parse_or(
                    &lookup,
                    "S3_PRESIGN_TTL_SECS",
                    DEFAULT_PRESIGN_TTL_SECS,
                )?),
            }),
        };

        let auth = match text("MCPROUTER_SERVER_URL") {
            None => None,
            Some(server_url) => Some(AuthSettings {
                server_url,
                timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "AUTH_TIMEOUT_SECS",
                    DEFAULT_AUTH_TIMEOUT_SECS,
                )?),
            }),
        };

        Ok(Self { server, database, object_storage, auth })
    }

    /// Copy with credentials replaced, safe to print or log.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.database.turso_auth_token.is_some() {
            copy.database.turso_auth_token = Some(REDACTED.to_string());
        }
        if let Some(storage) = copy.object_storage.as_mut() {
            if storage.access_key.is_some() {
                storage.access_key = Some(REDACTED.to_string());
            }
            if storage.secret_key.is_some() {
                storage.secret_key = Some(REDACTED.to_string());
            }
        }
        copy
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => match value.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}

mod secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}
