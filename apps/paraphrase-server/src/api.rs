//! API handlers for the paraphrase server
//!
//! - `GET /` banner
//! - `GET /health`
//! - `POST /paraphrase` multipart upload, returns the rewritten `.docx`

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use paraphrase_core::DOCX_MIME_TYPE;
use serde::Serialize;
use tracing::{debug, info};

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field carrying the document
pub const UPLOAD_FIELD: &str = "file";

/// Banner response
#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

/// Handler: GET /
pub async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Undetectable Document Paraphraser API is running.",
    })
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub max_concurrency: usize,
}

/// Handler: GET /health
pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "paraphrase-server",
        version: env!("CARGO_PKG_VERSION"),
        max_concurrency: state.paraphraser.rewriter().limiter().capacity(),
    })
}

/// An uploaded document
#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Handler: POST /paraphrase
///
/// Credentials are verified by the [`AuthenticatedUser`] extractor, which
/// runs before the multipart body is consumed.
pub async fn handle_paraphrase(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(&mut multipart).await?;
    info!(
        filename = %upload.filename,
        user = %identity.label(),
        size = upload.bytes.len(),
        "Received file for paraphrasing"
    );

    let document = state
        .paraphraser
        .process(&upload.filename, upload.bytes)
        .await?;
    info!(
        output = %document.filename,
        format = %document.format,
        submitted = document.submitted,
        "Returning paraphrased document"
    );

    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static(DOCX_MIME_TYPE)),
        (CONTENT_DISPOSITION, content_disposition(&document.filename)?),
    ];
    Ok((headers, document.bytes).into_response())
}

/// Pull the `file` field out of the multipart body; other fields are ignored
pub async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }
        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidUpload("uploaded file has no filename".into()))?;
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::InvalidUpload(format!(
        "missing '{}' field",
        UPLOAD_FIELD
    )))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::UploadTooLarge
    } else {
        ApiError::InvalidUpload(err.body_text())
    }
}

/// `attachment; filename=<name>` with control characters replaced
pub fn content_disposition(filename: &str) -> Result<HeaderValue, ApiError> {
    let safe: String = filename
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename={}", safe))
        .map_err(|e| ApiError::Internal(format!("invalid filename header: {}", e)))
}
