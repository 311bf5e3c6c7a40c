// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Object Storage Contract - Anti-Corruption Layer for S3-compatible stores
//!
//! Isolates the domain from the concrete blob store (S3, MinIO, R2, ...) so that
//! invoice attachments can be stored, fetched and shared through one narrow
//! interface and replaced by an in-memory mock in tests.
//!
//! Object storage is optional for the whole process. Its absence is modelled
//! explicitly by [`ObjectStorageBackend::Absent`], never by a null handle:
//! consumers call [`ObjectStorageBackend::require`] and get a structured
//! [`ObjectStorageError::Unavailable`] when nothing is configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Blob store used for invoice documents.
///
/// Keys are slash-separated relative paths such as `invoices/<id>/scan.pdf`.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key`, replacing any previous object
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStorageError>;

    /// Read the full object stored under `key`
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStorageError>;

    /// Remove the object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectStorageError>;

    /// Time-limited download URL for `key`
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, ObjectStorageError>;

    /// Verify that the configured bucket is reachable with the configured credentials
    async fn check(&self) -> Result<(), ObjectStorageError>;
}

/// Object storage errors
#[derive(Debug, Error)]
pub enum ObjectStorageError {
    /// Object storage is not configured for this process
    #[error("object storage is not available")]
    Unavailable,

    /// Invalid configuration or the session could not be established
    #[error("object storage configuration error: {0}")]
    Config(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("timeout while communicating with object storage")]
    Timeout,

    #[error("object storage backend error: {0}")]
    Backend(String),
}

/// Process-wide object storage handle: either configured or explicitly absent.
#[derive(Clone, Default)]
pub enum ObjectStorageBackend {
    #[default]
    Absent,
    Present(Arc<dyn ObjectStorage>),
}

impl ObjectStorageBackend {
    pub fn is_present(&self) -> bool {
        matches!(self, ObjectStorageBackend::Present(_))
    }

    /// Borrow the live store or fail with [`ObjectStorageError::Unavailable`].
    pub fn require(&self) -> Result<&Arc<dyn ObjectStorage>, ObjectStorageError> {
        match self {
            ObjectStorageBackend::Present(storage) => Ok(storage),
            ObjectStorageBackend::Absent => Err(ObjectStorageError::Unavailable),
        }
    }
}

impl std::fmt::Debug for ObjectStorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectStorageBackend::Absent => f.write_str("ObjectStorageBackend::Absent"),
            ObjectStorageBackend::Present(_) => f.write_str("ObjectStorageBackend::Present(..)"),
        }
    }
}
