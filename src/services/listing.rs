//! Listing aggregation: turns a backend's paginated listing into one
//! complete, in-memory sequence of object summaries.
//!
//! Pages are pulled strictly one after another, because the cursor for page
//! `n + 1` is only known once page `n` has arrived. A failure on any page
//! aborts the whole listing and nothing accumulated so far is returned.

use crate::{
    models::{
        object::ObjectSummary,
        page::{ContinuationToken, ListPage},
    },
    services::backend::{BlobBackend, StorageError, StorageResult},
};
use futures::{Stream, TryStreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lazily pull pages from `backend` until it reports no further continuation.
///
/// The stream yields each page as it arrives and ends after the terminal page
/// or after the first error.
pub fn pages<'a>(
    backend: &'a dyn BlobBackend,
) -> impl Stream<Item = StorageResult<ListPage>> + Send + 'a {
    stream::try_unfold(ContinuationToken::Start, move |token| async move {
        if !token.has_more() {
            return Ok(None);
        }

        let page = backend.list_page(&token).await?;
        if let (Some(prev), Some(next)) = (token.marker(), page.next.marker()) {
            if prev == next {
                return Err(StorageError::Backend(format!(
                    "pagination did not advance past `{}`",
                    next
                )));
            }
        }

        debug!(
            items = page.items.len(),
            has_more = page.has_more(),
            "fetched listing page"
        );
        let next = page.next.clone();
        Ok(Some((page, next)))
    })
}

/// Collect every object in the container, following pagination to the end.
pub async fn list_all(backend: &dyn BlobBackend) -> StorageResult<Vec<ObjectSummary>> {
    pages(backend)
        .try_fold(Vec::new(), |mut acc, page| async move {
            acc.extend(page.items);
            Ok(acc)
        })
        .await
}

/// Like [`list_all`], but gives up with [`StorageError::Cancelled`] as soon as
/// `cancel` fires. The in-flight page request is dropped.
pub async fn list_all_until(
    backend: &dyn BlobBackend,
    cancel: &CancellationToken,
) -> StorageResult<Vec<ObjectSummary>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("listing cancelled");
            Err(StorageError::Cancelled)
        }
        result = list_all(backend) => result,
    }
}
