//! Error types for the paraphrase server

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use paraphrase_core::PipelineError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Server error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authorization header missing")]
    MissingCredential,

    /// The reason is logged, never returned to the caller
    #[error("Invalid authentication credentials: {0}")]
    InvalidCredential(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Upload exceeds the configured size limit")]
    UploadTooLarge,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingCredential => "MISSING_CREDENTIAL",
            ApiError::InvalidCredential(_) => "INVALID_CREDENTIAL",
            ApiError::InvalidUpload(_) => "INVALID_UPLOAD",
            ApiError::UploadTooLarge => "UPLOAD_TOO_LARGE",
            ApiError::Pipeline(err) => err.kind(),
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCredential | ApiError::InvalidCredential(_) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Pipeline(PipelineError::SerializationFailure(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Pipeline(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::InvalidCredential(_) => "Invalid authentication credentials".to_string(),
            ApiError::Pipeline(PipelineError::SerializationFailure(_)) | ApiError::Internal(_) => {
                error!(code = self.code(), error = %self, "Request failed");
                "An error occurred while processing the file".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code().to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
