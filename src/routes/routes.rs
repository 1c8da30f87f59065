//! Defines the routes of the web front-end.
//!
//! ## Structure
//! - `GET  /`        — listing page with upload form
//! - `POST /upload`  — multipart upload (field `file1`), redirects to `/`
//! - `POST /delete`  — form-encoded delete (field `name`), redirects to `/`
//! - `GET  /healthz` — liveness
//! - `GET  /readyz`  — backend readiness

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{delete, index, upload},
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. Upload bodies larger than `max_upload_bytes` are
/// rejected before they reach the handler.
pub fn routes(max_upload_bytes: usize) -> Router<StorageService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/", get(index))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/delete", post(delete))
}
