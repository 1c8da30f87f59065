//! HTTP handlers for the listing page, uploads and deletes.
//! Storage concerns are delegated to `StorageService`; successful form posts
//! redirect back to the listing.

use crate::{errors::AppError, services::storage_service::StorageService, views};
use axum::{
    Form,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

/// Multipart field the upload form uses for the file.
pub const UPLOAD_FIELD: &str = "file1";

/// Form body for `POST /delete`.
#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    pub name: Option<String>,
}

/// `GET /` — list every object in the container.
pub async fn index(State(service): State<StorageService>) -> Result<Html<String>, AppError> {
    let items = service.list_objects().await?;
    Ok(Html(views::index_page(&service.describe(), &items)))
}

/// `POST /upload` — store the `file1` part under its file name.
///
/// A form without a chosen file redirects straight back to the listing.
pub async fn upload(
    State(service): State<StorageService>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let Some(file_name) = field.file_name().and_then(base_name) else {
            break;
        };
        let bytes = field.bytes().await?;
        service.upload_object(&file_name, bytes).await?;
        break;
    }

    Ok(redirect_home())
}

/// `POST /delete` — remove the object named in the form.
pub async fn delete(
    State(service): State<StorageService>,
    Form(form): Form<DeleteForm>,
) -> Result<Response, AppError> {
    let name = form
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::bad_request("missing object name"))?;

    service.delete_object(&name).await?;
    Ok(redirect_home())
}

fn redirect_home() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}

/// Strip any client-side directory from an uploaded file name. Empty names
/// mean no file was chosen.
fn base_name(file_name: &str) -> Option<String> {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_drops_client_directories() {
        assert_eq!(base_name("photo.jpg").as_deref(), Some("photo.jpg"));
        assert_eq!(base_name(r"C:\Users\me\photo.jpg").as_deref(), Some("photo.jpg"));
        assert_eq!(base_name("dir/photo.jpg").as_deref(), Some("photo.jpg"));
        assert_eq!(base_name(""), None);
        assert_eq!(base_name("dir/"), None);
    }
}
