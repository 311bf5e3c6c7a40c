// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Object Storage Infrastructure Module
//!
//! Provides the concrete `ObjectStorage` implementations and the factory that
//! turns optional configuration into an [`ObjectStorageBackend`].

pub mod s3;

pub use s3::S3ObjectStorage;

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::config::ObjectStorageSettings;
use crate::domain::storage::{ObjectStorageBackend, ObjectStorageError};

/// Build the S3 backend from settings, verifying the session.
pub async fn create_object_storage(
    settings: &ObjectStorageSettings,
) -> Result<ObjectStorageBackend, ObjectStorageError> {
    let storage = S3ObjectStorage::connect(settings).await?;
    Ok(ObjectStorageBackend::Present(Arc::new(storage)))
}

/// Never fails: missing configuration or a construction error both yield
/// [`ObjectStorageBackend::Absent`] with a logged warning.
pub async fn connect_object_storage(
    settings: Option<&ObjectStorageSettings>,
) -> ObjectStorageBackend {
    let Some(settings) = settings else {
        warn!("S3_BUCKET not set, object storage disabled; attachment operations will report unavailable");
        return ObjectStorageBackend::Absent;
    };

    match create_object_storage(settings).await {
        Ok(backend) => {
            info!(
                bucket = %settings.bucket,
                endpoint = settings.endpoint.as_deref().unwrap_or("aws"),
                path_style = settings.use_path_style,
                "Object storage ready"
            );
            backend
        }
        Err(e) => {
            warn!(error = %e, "Object storage unavailable, continuing without attachments");
            ObjectStorageBackend::Absent
        }
    }
}

// Re-export MockObjectStorage for testing
pub use mock::MockObjectStorage;

mod mock {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::domain::storage::{ObjectStorage, ObjectStorageError};

    /// In-memory object store recording contents and content types.
    #[derive(Default)]
    pub struct MockObjectStorage {
        objects: Mutex<HashMap<String, (Bytes, String)>>,
        deletes: AtomicUsize,
    }

    impl MockObjectStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> = self
                .objects
                .lock()
                .map(|objects| objects.keys().cloned().collect())
                .unwrap_or_default();
            keys.sort();
            keys
        }

        pub fn content_type(&self, key: &str) -> Option<String> {
            self.objects.lock().ok()?.get(key).map(|(_, ct)| ct.clone())
        }

        pub fn delete_count(&self) -> usize {
            self.deletes.load(Ordering::SeqCst)
        }
    }

    fn poisoned() -> ObjectStorageError {
        ObjectStorageError::Backend("mock store lock poisoned".to_string())
    }

    #[async_trait]
    impl ObjectStorage for MockObjectStorage {
        async fn put(
            &self,
            key: &str,
            data: Bytes,
            content_type: &str,
        ) -> Result<(), ObjectStorageError> {
            self.objects
                .lock()
                .map_err(|_| poisoned())?
                .insert(key.to_string(), (data, content_type.to_string()));
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Bytes, ObjectStorageError> {
            self.objects
                .lock()
                .map_err(|_| poisoned())?
                .get(key)
                .map(|(data, _)| data.clone())
                .ok_or_else(|| ObjectStorageError::NotFound(key.to_string()))
        }

        async fn delete(&self, key: &str) -> Result<(), ObjectStorageError> {
            self.objects.lock().map_err(|_| poisoned())?.remove(key);
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn presign_get(
            &self,
            key: &str,
            ttl: Duration,
        ) -> Result<String, ObjectStorageError> {
            if !self.objects.lock().map_err(|_| poisoned())?.contains_key(key) {
                return Err(ObjectStorageError::NotFound(key.to_string()));
            }
            Ok(format!("memory://{key}?expires={}", ttl.as_secs()))
        }

        async fn check(&self) -> Result<(), ObjectStorageError> {
            Ok(())
        }
    }
}
