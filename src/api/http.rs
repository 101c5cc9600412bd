//! axum router over [`DocumentService`].
//!
//! # Endpoints
//!
//! - `POST /add` - Ingest a document (JSON)
//! - `POST /search` - Query for nearest neighbors (JSON)
//! - `POST /upload` - Ingest a file (multipart: `file`, `bucketName`, `objName`)
//! - `GET /health` - Engine counters
//!
//! Engine calls block (redb I/O, graph work), so every handler runs them
//! on tokio's blocking pool.

use std::sync::Arc;

use axum::extract::multipart::Multipart;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::warn;

use super::{AddRequest, ApiError, DocumentService, FilePart, SearchBody, Upload};

/// Shared application state.
pub type SharedService = Arc<DocumentService>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Builds the router with all endpoints.
pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/add", post(add))
        .route("/search", post(search))
        .route("/upload", post(upload))
        .route("/health", get(health))
        .with_state(service)
}

async fn blocking<T, F>(service: SharedService, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&DocumentService) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| {
            warn!(error = %e, "Blocking task failed");
            ApiError {
                status: 500,
                message: format!("worker task failed: {}", e),
            }
        })?
}

/// POST /add
async fn add(
    State(service): State<SharedService>,
    body: Result<Json<AddRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<super::AddResponse>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let response = blocking(service, move |svc| svc.add(request)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /search
async fn search(
    State(service): State<SharedService>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<super::SearchResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let response = blocking(service, move |svc| svc.search(body)).await?;
    Ok(Json(response))
}

/// POST /upload
async fn upload(
    State(service): State<SharedService>,
    mut multipart: Multipart,
) -> Result<Json<super::UploadResponse>, ApiError> {
    let mut form = Upload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                form.file = Some(FilePart {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            Some("bucketName") => {
                form.bucket_name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(e.body_text()))?,
                );
            }
            Some("objName") => {
                form.obj_name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(e.body_text()))?,
                );
            }
            _ => {}
        }
    }

    let response = blocking(service, move |svc| svc.upload(form)).await?;
    Ok(Json(response))
}

/// GET /health
async fn health(
    State(service): State<SharedService>,
) -> Result<Json<crate::engine::EngineStats>, ApiError> {
    let stats = blocking(service, |svc| Ok(svc.engine().stats()?)).await?;
    Ok(Json(stats))
}
