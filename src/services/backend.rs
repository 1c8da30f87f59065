//! The capability interface every storage backend implements, and the error
//! type shared by all of them.

use crate::models::page::{ContinuationToken, ListPage};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("container `{0}` not found")]
    ContainerNotFound(String),
    #[error("container `{name}` invalid: {reason}")]
    InvalidContainerName { name: String, reason: String },
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error("invalid object name")]
    InvalidObjectName,
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("invalid storage configuration: {0}")]
    Config(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Authenticated access to one container of some object store.
///
/// Implementations are shared across requests behind an `Arc`, so every method
/// takes `&self` and must be safe to call concurrently.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Fetch the page of objects that begins at `token`.
    ///
    /// `token` is never `Done` when called by the listing aggregator; a
    /// backend handed `Done` returns an empty terminal page.
    async fn list_page(&self, token: &ContinuationToken) -> StorageResult<ListPage>;

    /// Store `bytes` under `name`, replacing any existing object.
    async fn upload_object(&self, name: &str, bytes: Bytes) -> StorageResult<()>;

    /// Remove the object called `name`.
    async fn delete_object(&self, name: &str) -> StorageResult<()>;

    /// Cheap health check used by `/readyz`.
    async fn check_ready(&self) -> StorageResult<()> {
        self.list_page(&ContinuationToken::Start).await.map(|_| ())
    }

    /// Short human-readable description, e.g. `local:photos`.
    fn describe(&self) -> String;
}
