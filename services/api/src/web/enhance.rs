//! services/api/src/web/enhance.rs
//!
//! Handlers for the enhancement view: upload, apply, preview and download.

use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use image::RgbImage;
use image_enhancer_core::domain::{ExportFormat, Technique};
use image_enhancer_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::error::port_error_response;
use crate::web::state::{AppState, SessionHandle};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub file_name: Option<String>,
    pub width: u32,
    pub height: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct ApplyRequest {
    #[schema(value_type = String, example = "complement")]
    pub technique: Technique,
}

#[derive(Serialize, ToSchema)]
pub struct ApplyResponse {
    #[schema(value_type = String)]
    pub technique: Technique,
    pub width: u32,
    pub height: u32,
    /// The account's running total after this enhancement.
    pub enhancement_count: u64,
}

#[derive(Serialize, ToSchema)]
pub struct TechniqueInfo {
    pub id: String,
    pub label: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// One of `png`, `jpeg` or `webp`.
    #[param(value_type = String)]
    pub format: ExportFormat,
}

fn png_response(
    state: &AppState,
    image: Option<&RgbImage>,
    missing: &str,
) -> Result<Response, (StatusCode, String)> {
    let image = image.ok_or_else(|| (StatusCode::NOT_FOUND, missing.to_string()))?;
    let bytes = state
        .codec
        .encode(image, ExportFormat::Png)
        .map_err(port_error_response)?;
    Ok(([(header::CONTENT_TYPE, ExportFormat::Png.mime_type())], bytes).into_response())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /enhance/techniques - List the enhancement catalog
#[utoipa::path(
    get,
    path = "/enhance/techniques",
    responses(
        (status = 200, description = "The fixed catalog of techniques", body = [TechniqueInfo])
    )
)]
pub async fn techniques_handler() -> Json<Vec<TechniqueInfo>> {
    Json(
        Technique::ALL
            .iter()
            .map(|t| TechniqueInfo {
                id: t.id().to_string(),
                label: t.label().to_string(),
            })
            .collect(),
    )
}

/// POST /enhance/upload - Upload a new original image
///
/// Accepts a multipart/form-data request; the first part is taken as the image.
/// A successful upload discards any previous enhanced result.
#[utoipa::path(
    post,
    path = "/enhance/upload",
    request_body(content_type = "multipart/form-data", description = "A JPEG, PNG, BMP or TIFF image."),
    responses(
        (status = 200, description = "Image decoded and stored as the original", body = UploadResponse),
        (status = 400, description = "Missing file or undecodable image"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Read the first multipart field
    let field = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), format!("Failed to read multipart data: {}", e)))?
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Multipart form must include a file".to_string(),
            )
        })?;
    let file_name = field.file_name().map(str::to_string);
    let data = field
        .bytes()
        .await
        .map_err(|e| (e.status(), format!("Failed to read file bytes: {}", e)))?;

    // 2. Decode into the session
    let mut session = session.lock().await;
    let image = session
        .upload(state.codec.as_ref(), file_name, &data)
        .map_err(|e| {
            warn!("Rejected upload: {}", e);
            port_error_response(e)
        })?;
    let (width, height) = image.dimensions();

    info!("Uploaded {}x{} image", width, height);
    Ok(Json(UploadResponse {
        file_name: session.source_filename().map(str::to_string),
        width,
        height,
    }))
}

/// POST /enhance/apply - Apply a technique to the original image
#[utoipa::path(
    post,
    path = "/enhance/apply",
    request_body = ApplyRequest,
    responses(
        (status = 200, description = "Enhancement applied and recorded", body = ApplyResponse),
        (status = 400, description = "No image uploaded"),
        (status = 401, description = "Not authenticated"),
        (status = 422, description = "Image layout not supported by the transform"),
        (status = 500, description = "Enhancement or storage failure")
    )
)]
pub async fn apply_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Json(req): Json<ApplyRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut session = session.lock().await;
    let account = session
        .apply(state.enhancer.clone(), state.accounts.as_ref(), req.technique)
        .await
        .map_err(|e| {
            match &e {
                PortError::Validation(_) => warn!("Apply rejected: {}", e),
                _ => error!("Failed to apply {}: {:?}", req.technique.id(), e),
            }
            port_error_response(e)
        })?;

    let (width, height) = session
        .enhanced_image()
        .map(|image| image.dimensions())
        .unwrap_or_default();

    Ok(Json(ApplyResponse {
        technique: req.technique,
        width,
        height,
        enhancement_count: account.enhancement_count,
    }))
}

/// GET /enhance/original - PNG preview of the uploaded image
#[utoipa::path(
    get,
    path = "/enhance/original",
    responses(
        (status = 200, description = "The original image as PNG"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No image uploaded")
    )
)]
pub async fn original_preview_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = session.lock().await;
    png_response(&state, session.original_image(), "No image uploaded")
}

/// GET /enhance/enhanced - PNG preview of the latest result
#[utoipa::path(
    get,
    path = "/enhance/enhanced",
    responses(
        (status = 200, description = "The enhanced image as PNG"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No enhancement applied")
    )
)]
pub async fn enhanced_preview_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = session.lock().await;
    png_response(&state, session.enhanced_image(), "No enhancement applied")
}

/// GET /enhance/download - Download the enhanced image in the chosen format
#[utoipa::path(
    get,
    path = "/enhance/download",
    params(DownloadQuery),
    responses(
        (status = 200, description = "The encoded enhanced image as an attachment"),
        (status = 400, description = "No enhancement applied or unknown format"),
        (status = 401, description = "Not authenticated"),
        (status = 422, description = "Encoding failed")
    )
)]
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = session.lock().await;
    let download = session
        .download(state.codec.as_ref(), query.format)
        .map_err(port_error_response)?;

    let disposition = format!("attachment; filename=\"{}\"", download.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, download.mime_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    ))
}
