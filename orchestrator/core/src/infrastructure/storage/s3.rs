// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! S3 Object Storage Implementation
//!
//! Implements the `ObjectStorage` trait on top of Apache OpenDAL's S3 service,
//! which covers AWS S3 and S3-compatible stores (MinIO, R2, SeaweedFS S3 gateway).
//!
//! # Addressing
//!
//! - path style (default): `https://endpoint/bucket/key`
//! - virtual-host style (`S3_USE_PATH_STYLE=false`): `https://bucket.endpoint/key`
//!
//! Every remote call is bounded by a timeout and surfaces as
//! [`ObjectStorageError::Timeout`] when it expires.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use opendal::services::S3;
use opendal::{ErrorKind, Operator};
use tracing::debug;

use crate::domain::config::ObjectStorageSettings;
use crate::domain::storage::{ObjectStorage, ObjectStorageError};

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

pub struct S3ObjectStorage {
    operator: Operator,
    bucket: String,
}

impl S3ObjectStorage {
    /// Build the operator and verify the session with a bounded `check()`.
    pub async fn connect(settings: &ObjectStorageSettings) -> Result<Self, ObjectStorageError> {
        let storage = Self::new(settings)?;
        match tokio::time::timeout(CHECK_TIMEOUT, storage.operator.check()).await {
            Ok(Ok(())) => Ok(storage),
            Ok(Err(e)) => Err(ObjectStorageError::Config(format!(
                "cannot reach bucket '{}': {e}",
                storage.bucket
            ))),
            Err(_) => Err(ObjectStorageError::Config(format!(
                "timed out after {}s checking bucket '{}'",
                CHECK_TIMEOUT.as_secs(),
                storage.bucket
            ))),
        }
    }

    /// Build the operator without contacting the store.
    pub fn new(settings: &ObjectStorageSettings) -> Result<Self, ObjectStorageError> {
        let bucket = settings.bucket.trim();
        if bucket.is_empty() {
            return Err(ObjectStorageError::Config("bucket name is empty".to_string()));
        }

        let mut builder = S3::default().bucket(bucket).region(&settings.region);
        if let Some(endpoint) = settings.endpoint.as_deref() {
            builder = builder.endpoint(endpoint);
        }
        if let Some(access_key) = settings.access_key.as_deref() {
            builder = builder.access_key_id(access_key);
        }
        if let Some(secret_key) = settings.secret_key.as_deref() {
            builder = builder.secret_access_key(secret_key);
        }
        if !settings.use_path_style {
            builder = builder.enable_virtual_host_style();
        }

        let operator = Operator::new(builder)
            .map_err(|e| ObjectStorageError::Config(e.to_string()))?
            .finish();

        Ok(Self { operator, bucket: bucket.to_string() })
    }
}

fn map_error(key: &str, err: opendal::Error) -> ObjectStorageError {
    match err.kind() {
        ErrorKind::NotFound => ObjectStorageError::NotFound(key.to_string()),
        ErrorKind::ConfigInvalid | ErrorKind::PermissionDenied => {
            ObjectStorageError::Config(err.to_string())
        }
        _ => ObjectStorageError::Backend(err.to_string()),
    }
}

async fn bounded<T, F>(key: &str, operation: F) -> Result<T, ObjectStorageError>
where
    F: Future<Output = opendal::Result<T>>,
{
    match tokio::time::timeout(OPERATION_TIMEOUT, operation).await {
        Ok(result) => result.map_err(|e| map_error(key, e)),
        Err(_) => Err(ObjectStorageError::Timeout),
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStorageError> {
        debug!(bucket = %self.bucket, key, size = data.len(), "Uploading object");
        bounded(key, async {
            self.operator.write_with(key, data).content_type(content_type).await
        })
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStorageError> {
        let buffer = bounded(key, self.operator.read(key)).await?;
        Ok(buffer.to_bytes())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStorageError> {
        debug!(bucket = %self.bucket, key, "Deleting object");
        bounded(key, self.operator.delete(key)).await
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, ObjectStorageError> {
        let request = bounded(key, self.operator.presign_read(key, ttl)).await?;
        Ok(request.uri().to_string())
    }

    async fn check(&self) -> Result<(), ObjectStorageError> {
        bounded(&self.bucket, self.operator.check()).await
    }
}
