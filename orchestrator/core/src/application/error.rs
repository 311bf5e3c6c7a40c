// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

use crate::domain::repository::RepositoryError;
use crate::domain::storage::ObjectStorageError;
use crate::domain::validation::ValidationError;

/// Errors returned by every domain service. Both the REST and the tool surface
/// translate these into their own envelopes.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// Object storage is not configured or currently unreachable
    #[error("object storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl ServiceError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Storage(_) => "storage_error",
            ServiceError::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation(err.0)
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => ServiceError::NotFound(what),
            RepositoryError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Storage(other.to_string()),
        }
    }
}

impl From<ObjectStorageError> for ServiceError {
    fn from(err: ObjectStorageError) -> Self {
        match err {
            ObjectStorageError::Unavailable => {
                ServiceError::StorageUnavailable("object storage is not configured".to_string())
            }
            ObjectStorageError::Timeout => ServiceError::StorageUnavailable(err.to_string()),
            ObjectStorageError::NotFound(key) => ServiceError::NotFound(format!("object {key}")),
            other => ServiceError::Storage(other.to_string()),
        }
    }
}
