//! HTTP handlers for upload, download, delete, and listing.

use crate::common::VaultError;
use crate::server::AppState;
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use serde_json::json;
use tokio_util::io::StreamReader;

/// Accept a multipart upload and run it through the pipeline.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, VaultError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| VaultError::BadRequest(format!("malformed multipart stream: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| VaultError::BadRequest("file field has no filename".to_string()))?;

        // Bridge the multipart field into AsyncRead so the chunker can
        // consume it without buffering the whole body.
        let reader = StreamReader::new(
            field.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let file_id = state.pipeline.put(&name, reader, "Web").await?;
        return Ok(Json(json!({ "id": file_id, "name": name })));
    }

    Err(VaultError::BadRequest("no file field in upload".to_string()))
}

pub async fn list_handler(State(state): State<AppState>) -> Result<Response, VaultError> {
    let files = state.pipeline.store().list_files().await?;
    Ok(Json(files).into_response())
}

/// Stream a reconstructed file back to the client chunk by chunk.
pub async fn download_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, VaultError> {
    let (file, stream) = state.pipeline.get(id).await?;

    Response::builder()
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.name),
        )
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from_stream(stream))
        .map_err(|e| VaultError::Internal(e.into()))
}

pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, VaultError> {
    state.pipeline.delete(id).await?;
    Ok(StatusCode::OK)
}

pub async fn serve_index() -> Html<&'static str> {
    const HTML: &str = include_str!("../../templates/index.html");
    Html(HTML)
}

pub async fn serve_js() -> Response {
    const JS: &str = include_str!("../../templates/app.js");
    Response::builder()
        .header(header::CONTENT_TYPE, "application/javascript; charset=utf-8")
        .body(Body::from(JS))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
