//! Azure backend integration tests.
//!
//! Points `AzureBlobStore` at an in-process axum server that speaks enough of
//! the Blob REST API (List Blobs, Put Blob, Put Block, Put Block List, Delete
//! Blob) to check the requests the backend sends and how it reads the replies.

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use base64::{Engine as _, engine::general_purpose};
use blob_front::{
    models::{
        object::ObjectSummary,
        page::{ContinuationToken, ListPage},
    },
    routes::routes::routes,
    services::{
        azure::{AzureBlobStore, AzureConfig},
        backend::{BlobBackend, StorageError},
        listing::list_all,
        storage_service::StorageService,
    },
};
use http_body_util::BodyExt;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::net::TcpListener;
use tower::ServiceExt;

/// Blobs returned per List Blobs response, independent of the backend's own
/// page size.
const MOCK_PAGE: usize = 2;
const LAST_MODIFIED: &str = "Wed, 09 Sep 2009 09:20:02 GMT";
const ETAG: &str = "\"0x8D4BCC2E4835CD0\"";

#[derive(Default)]
struct MockAzure {
    blobs: Mutex<BTreeMap<String, Bytes>>,
    blocks: Mutex<HashMap<String, Bytes>>,
    /// `marker` of every List Blobs request, in arrival order.
    markers: Mutex<Vec<Option<String>>>,
    /// Block ids of every committed block list.
    block_lists: Mutex<Vec<Vec<String>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockAzure {
    fn seed(&self, name: &str, body: &'static [u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert(name.to_string(), Bytes::from_static(body));
    }

    fn blob(&self, name: &str) -> Option<Bytes> {
        self.blobs.lock().unwrap().get(name).cloned()
    }
}

/// NextMarker is the last name handed out; a marker resumes strictly after it.
async fn list_blobs(
    State(mock): State<Arc<MockAzure>>,
    Path(container): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if query.get("comp").map(String::as_str) != Some("list") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let marker = query.get("marker").filter(|m| !m.is_empty()).cloned();
    mock.markers.lock().unwrap().push(marker.clone());

    let blobs = mock.blobs.lock().unwrap();
    let remaining: Vec<(&String, &Bytes)> = blobs
        .iter()
        .filter(|(name, _)| marker.as_deref().is_none_or(|m| name.as_str() > m))
        .collect();

    let mut xml = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><EnumerationResults ServiceEndpoint="http://127.0.0.1/" ContainerName="{}"><Blobs>"#,
        container
    );
    for (name, body) in remaining.iter().take(MOCK_PAGE) {
        xml.push_str(&format!(
            "<Blob><Name>{}</Name><Properties><Last-Modified>{}</Last-Modified><Etag>{}</Etag>\
             <Content-Length>{}</Content-Length><Content-Type>application/octet-stream</Content-Type>\
             <BlobType>BlockBlob</BlobType></Properties></Blob>",
            name,
            LAST_MODIFIED,
            ETAG,
            body.len()
        ));
    }
    xml.push_str("</Blobs>");
    if remaining.len() > MOCK_PAGE {
        xml.push_str(&format!(
            "<NextMarker>{}</NextMarker>",
            remaining[MOCK_PAGE - 1].0
        ));
    }
    xml.push_str("</EnumerationResults>");

    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}

async fn put_blob(
    State(mock): State<Arc<MockAzure>>,
    Path((_container, blob)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    match query.get("comp").map(String::as_str) {
        Some("block") => {
            let Some(id) = query.get("blockid").cloned() else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            let now = mock.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            mock.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            mock.in_flight.fetch_sub(1, Ordering::SeqCst);
            mock.blocks.lock().unwrap().insert(id, body);
        }
        Some("blocklist") => {
            let ids = block_ids(&body);
            let mut assembled = Vec::new();
            {
                let blocks = mock.blocks.lock().unwrap();
                for id in &ids {
                    match blocks.get(id) {
                        Some(block) => assembled.extend_from_slice(block),
                        None => return StatusCode::BAD_REQUEST.into_response(),
                    }
                }
            }
            mock.block_lists.lock().unwrap().push(ids);
            mock.blobs
                .lock()
                .unwrap()
                .insert(blob, Bytes::from(assembled));
        }
        _ => {
            mock.blobs.lock().unwrap().insert(blob, body);
        }
    }

    (
        StatusCode::CREATED,
        [(header::ETAG, ETAG), (header::LAST_MODIFIED, LAST_MODIFIED)],
    )
        .into_response()
}

async fn delete_blob(
    State(mock): State<Arc<MockAzure>>,
    Path((_container, blob)): Path<(String, String)>,
) -> Response {
    if mock.blobs.lock().unwrap().remove(&blob).is_some() {
        return StatusCode::ACCEPTED.into_response();
    }
    (
        StatusCode::NOT_FOUND,
        [("x-ms-error-code", "BlobNotFound")],
        r#"<?xml version="1.0" encoding="utf-8"?><Error><Code>BlobNotFound</Code><Message>The specified blob does not exist.</Message></Error>"#,
    )
        .into_response()
}

/// Element texts of a `<BlockList>` body, in document order.
fn block_ids(body: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(body)
        .split('<')
        .filter(|segment| !segment.starts_with('/') && !segment.starts_with('?'))
        .filter_map(|segment| segment.split_once('>'))
        .map(|(_, text)| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

async fn spawn_mock() -> (String, Arc<MockAzure>) {
    let mock = Arc::new(MockAzure::default());
    let app = Router::new()
        .route("/{container}", get(list_blobs))
        .route("/{container}/{*blob}", put(put_blob).delete(delete_blob))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), mock)
}

fn azure_store(endpoint: String, page_size: usize, block_size: usize) -> AzureBlobStore {
    AzureBlobStore::new(AzureConfig {
        account: "devstoreaccount1".into(),
        access_key: general_purpose::STANDARD.encode(b"test-account-key"),
        container: "photos".into(),
        endpoint: Some(endpoint),
        page_size,
        block_size,
        parallelism: 2,
    })
    .expect("Failed to build azure store")
}

async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_first_page_ends_with_resumable_marker() {
    let (endpoint, mock) = spawn_mock().await;
    for name in ["a", "b", "c"] {
        mock.seed(name, b"xyz");
    }
    let store = azure_store(endpoint, 2, 1024);

    let page: ListPage = store.list_page(&ContinuationToken::Start).await.unwrap();

    assert_eq!(
        page.items,
        vec![ObjectSummary::new("a", 3), ObjectSummary::new("b", 3)]
    );
    assert_eq!(page.next, ContinuationToken::Next("b".into()));
}

#[tokio::test]
async fn test_listing_follows_next_marker_across_responses() {
    let (endpoint, mock) = spawn_mock().await;
    mock.seed("a.txt", b"1");
    mock.seed("b.txt", b"22");
    mock.seed("c.txt", b"333");
    mock.seed("d.txt", b"4444");
    mock.seed("e.txt", b"55555");
    let store = azure_store(endpoint, 2, 1024);

    let items = list_all(&store).await.unwrap();

    assert_eq!(
        items,
        vec![
            ObjectSummary::new("a.txt", 1),
            ObjectSummary::new("b.txt", 2),
            ObjectSummary::new("c.txt", 3),
            ObjectSummary::new("d.txt", 4),
            ObjectSummary::new("e.txt", 5),
        ]
    );
    let markers = mock.markers.lock().unwrap().clone();
    assert_eq!(markers.first(), Some(&None));
    assert!(markers.contains(&Some("b.txt".to_string())), "{markers:?}");
}

#[tokio::test]
async fn test_empty_container_lists_nothing() {
    let (endpoint, _mock) = spawn_mock().await;
    let store = azure_store(endpoint, 2, 1024);

    let page = store.list_page(&ContinuationToken::Start).await.unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.next, ContinuationToken::Done);
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_small_upload_is_a_single_put() {
    let (endpoint, mock) = spawn_mock().await;
    let store = azure_store(endpoint, 10, 8);

    store
        .upload_object("note.txt", Bytes::from_static(b"hello"))
        .await
        .unwrap();

    assert_eq!(mock.blob("note.txt"), Some(Bytes::from_static(b"hello")));
    assert!(mock.block_lists.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_large_upload_commits_blocks_in_order() {
    let (endpoint, mock) = spawn_mock().await;
    let store = azure_store(endpoint, 10, 4);
    let body: Bytes = (0u8..32).collect::<Vec<u8>>().into();

    store.upload_object("big.bin", body.clone()).await.unwrap();

    assert_eq!(mock.blob("big.bin"), Some(body));
    let block_lists = mock.block_lists.lock().unwrap().clone();
    assert_eq!(block_lists.len(), 1);
    assert_eq!(block_lists[0].len(), 8);
    let max_in_flight = mock.max_in_flight.load(Ordering::SeqCst);
    assert!(
        (1..=2).contains(&max_in_flight),
        "max in flight {max_in_flight}"
    );
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_removes_blob() {
    let (endpoint, mock) = spawn_mock().await;
    mock.seed("old.txt", b"bye");
    let store = azure_store(endpoint, 10, 1024);

    store.delete_object("old.txt").await.unwrap();

    assert_eq!(mock.blob("old.txt"), None);
}

#[tokio::test]
async fn test_delete_missing_blob_is_object_not_found() {
    let (endpoint, _mock) = spawn_mock().await;
    let store = azure_store(endpoint, 10, 1024);

    let err = store.delete_object("ghost.txt").await.unwrap_err();

    assert!(
        matches!(&err, StorageError::ObjectNotFound(name) if name == "ghost.txt"),
        "{err:?}"
    );
}

// ============================================================================
// Through the router
// ============================================================================

#[tokio::test]
async fn test_index_page_lists_every_azure_page() {
    let (endpoint, mock) = spawn_mock().await;
    for name in ["one.txt", "two.txt", "three.txt"] {
        mock.seed(name, b"data");
    }
    let backend: Arc<dyn BlobBackend> = Arc::new(azure_store(endpoint, 1, 1024));
    let app = routes(1024 * 1024).with_state(StorageService::new(backend));

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_to_string(response.into_body()).await;
    for name in ["one.txt", "two.txt", "three.txt"] {
        assert!(html.contains(&format!("<td>{name}</td>")), "{name}");
    }
}

#[tokio::test]
async fn test_deleting_missing_azure_blob_renders_not_found() {
    let (endpoint, _mock) = spawn_mock().await;
    let backend: Arc<dyn BlobBackend> = Arc::new(azure_store(endpoint, 10, 1024));
    let app = routes(1024 * 1024).with_state(StorageService::new(backend));

    let response = app
        .oneshot(
            Request::post("/delete")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("name=ghost.txt"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = body_to_string(response.into_body()).await;
    assert!(html.contains("ghost.txt"));
}
