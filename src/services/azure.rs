//! Azure Blob Storage backend built on [`object_store`].
//!
//! Listing resumes after the last name of the previous page, uploads above
//! `block_size` go through a multipart (block) upload with at most
//! `parallelism` blocks in flight.

use crate::{
    models::{
        object::ObjectSummary,
        page::{ContinuationToken, ListPage},
    },
    services::backend::{BlobBackend, StorageError, StorageResult},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::{
    ObjectMeta, ObjectStore, PutPayload, WriteMultipart, azure::MicrosoftAzureBuilder, path::Path,
};
use std::sync::Arc;
use tracing::debug;

/// Largest page the service hands out in one List Blobs call.
pub const MAX_LIST_RESULTS: usize = 5000;

/// Connection settings for one Azure container.
#[derive(Clone)]
pub struct AzureConfig {
    pub account: String,
    /// Base64 account key as shown in the portal.
    pub access_key: String,
    pub container: String,
    /// Overrides `https://{account}.blob.core.windows.net`, e.g. for Azurite.
    pub endpoint: Option<String>,
    pub page_size: usize,
    pub block_size: usize,
    pub parallelism: usize,
}

impl std::fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConfig")
            .field("account", &self.account)
            .field("access_key", &"<redacted>")
            .field("container", &self.container)
            .field("endpoint", &self.endpoint)
            .field("page_size", &self.page_size)
            .field("block_size", &self.block_size)
            .field("parallelism", &self.parallelism)
            .finish()
    }
}

#[derive(Clone)]
pub struct AzureBlobStore {
    store: Arc<dyn ObjectStore>,
    account: String,
    container: String,
    page_size: usize,
    block_size: usize,
    parallelism: usize,
}

impl AzureBlobStore {
    pub fn new(config: AzureConfig) -> StorageResult<Self> {
        if config.container.is_empty() {
            return Err(StorageError::Config("container name is empty".into()));
        }
        general_purpose::STANDARD
            .decode(config.access_key.trim())
            .map_err(|err| StorageError::Config(format!("account key is not base64: {}", err)))?;

        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(&config.account)
            .with_access_key(config.access_key.trim())
            .with_container_name(&config.container);
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint.trim_end_matches('/').to_string())
                .with_allow_http(endpoint.starts_with("http://"));
        }
        let store = builder
            .build()
            .map_err(|err| StorageError::Config(err.to_string()))?;

        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Wrap an already built store. `config` supplies paging and upload
    /// tuning plus the names reported by [`BlobBackend::describe`].
    pub fn with_store(store: Arc<dyn ObjectStore>, config: AzureConfig) -> Self {
        Self {
            store,
            account: config.account,
            container: config.container,
            page_size: config.page_size.clamp(1, MAX_LIST_RESULTS),
            block_size: config.block_size.max(1),
            parallelism: config.parallelism.max(1),
        }
    }

    async fn upload_blocks(&self, path: &Path, bytes: &Bytes) -> StorageResult<()> {
        let upload = self.store.put_multipart(path).await?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.block_size);
        for chunk in bytes.chunks(self.block_size) {
            if let Err(err) = writer.wait_for_capacity(self.parallelism).await {
                if let Err(abort_err) = writer.abort().await {
                    debug!(path = %path, "aborting block upload failed: {}", abort_err);
                }
                return Err(err.into());
            }
            writer.write(chunk);
        }
        writer.finish().await?;
        Ok(())
    }
}

#[async_trait]
impl BlobBackend for AzureBlobStore {
    async fn list_page(&self, token: &ContinuationToken) -> StorageResult<ListPage> {
        let offset = match token {
            ContinuationToken::Start => None,
            ContinuationToken::Next(marker) => Some(Path::parse(marker).map_err(|err| {
                StorageError::Backend(format!("bad marker `{}`: {}", marker, err))
            })?),
            ContinuationToken::Done => return Ok(ListPage::done()),
        };
        let listing = match &offset {
            Some(offset) => self.store.list_with_offset(None, offset),
            None => self.store.list(None),
        };

        // One extra entry tells whether another page follows.
        let mut metas: Vec<ObjectMeta> = listing
            .take(self.page_size + 1)
            .try_collect()
            .await
            .map_err(|err| match err {
                object_store::Error::NotFound { .. } => {
                    StorageError::ContainerNotFound(self.container.clone())
                }
                other => StorageError::ObjectStore(other),
            })?;

        let has_more = metas.len() > self.page_size;
        metas.truncate(self.page_size);
        let items: Vec<ObjectSummary> = metas
            .into_iter()
            .map(|meta| ObjectSummary::new(meta.location.to_string(), meta.size))
            .collect();
        let next = match items.last() {
            Some(last) if has_more => ContinuationToken::Next(last.name.clone()),
            _ => ContinuationToken::Done,
        };
        Ok(ListPage::new(items, next))
    }

    async fn upload_object(&self, name: &str, bytes: Bytes) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidObjectName);
        }
        let path = Path::from(name);

        if bytes.len() <= self.block_size {
            self.store.put(&path, PutPayload::from(bytes)).await?;
            return Ok(());
        }

        debug!(
            name,
            blocks = bytes.len().div_ceil(self.block_size),
            parallelism = self.parallelism,
            "uploading in blocks"
        );
        self.upload_blocks(&path, &bytes).await
    }

    async fn delete_object(&self, name: &str) -> StorageResult<()> {
        // names come back from `list_page` already in store encoding
        let path = Path::parse(name).map_err(|_| StorageError::InvalidObjectName)?;
        if path.as_ref().is_empty() {
            return Err(StorageError::InvalidObjectName);
        }

        match self.store.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                Err(StorageError::ObjectNotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn describe(&self) -> String {
        format!("azure:{}/{}", self.account, self.container)
    }
}
