//! src/services/storage_service.rs
//!
//! StorageService — the application state handed to every handler. It owns
//! the configured backend and routes list/upload/delete through it; the
//! listing goes through the aggregator so handlers always see a complete
//! container listing or an error.

use crate::{
    models::object::ObjectSummary,
    services::{
        backend::{BlobBackend, StorageResult},
        listing,
    },
};
use bytes::Bytes;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cheap-to-clone handle to the configured storage backend.
///
/// All clones share one shutdown token; cancelling it aborts every listing
/// still in flight.
#[derive(Clone)]
pub struct StorageService {
    backend: Arc<dyn BlobBackend>,
    shutdown: CancellationToken,
}

impl StorageService {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self {
            backend,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that, once cancelled, makes in-flight and future listings fail
    /// with `StorageError::Cancelled`.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn backend(&self) -> &dyn BlobBackend {
        self.backend.as_ref()
    }

    /// Every object in the container, in the order the backend pages them.
    pub async fn list_objects(&self) -> StorageResult<Vec<ObjectSummary>> {
        debug!("listing {}", self.backend.describe());
        let items = listing::list_all_until(self.backend(), &self.shutdown).await?;
        info!("listed {} objects from {}", items.len(), self.backend.describe());
        Ok(items)
    }

    /// Upload an in-memory body under `name`, replacing any existing object.
    pub async fn upload_object(&self, name: &str, bytes: Bytes) -> StorageResult<()> {
        let size = bytes.len();
        debug!("uploading {} ({} bytes) to {}", name, size, self.backend.describe());
        self.backend.upload_object(name, bytes).await?;
        info!("uploaded {} ({} bytes)", name, size);
        Ok(())
    }

    pub async fn delete_object(&self, name: &str) -> StorageResult<()> {
        debug!("deleting {} from {}", name, self.backend.describe());
        self.backend.delete_object(name).await?;
        info!("deleted {}", name);
        Ok(())
    }

    pub async fn check_ready(&self) -> StorageResult<()> {
        self.backend.check_ready().await
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }
}
