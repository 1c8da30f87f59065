//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the storage backend

use crate::services::storage_service::StorageService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// `GET /healthz`
///
/// Very small liveness check — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Asks the backend for its readiness check (a database query and disk
/// round-trip for the local store, a one-page listing for Azure).
///
/// HTTP 200 when the check passes, HTTP 503 otherwise.
pub async fn readyz(State(service): State<StorageService>) -> impl IntoResponse {
    let (status, error) = match service.check_ready().await {
        Ok(()) => (StatusCode::OK, None),
        Err(err) => {
            tracing::warn!("readiness check failed: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, Some(err.to_string()))
        }
    };

    let body = ReadyResponse {
        status: if error.is_none() {
            "ok".into()
        } else {
            "error".into()
        },
        backend: service.describe(),
        error,
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}
