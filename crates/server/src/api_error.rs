use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crowdcount_core::pipeline::error::PipelineError;

pub const NO_FILE_UPLOADED: &str = "No file uploaded";
pub const INVALID_VIDEO_TYPE: &str = "Invalid file type. Only mp4, avi, or mov allowed.";
pub const INVALID_IMAGE_TYPE: &str = "Invalid file type. Only jpg and png allowed.";
pub const FILE_NOT_FOUND: &str = "File not found";

/// Request failure as seen by an HTTP client.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("{}", FILE_NOT_FOUND)]
    NotFound,
    #[error("processing exceeded {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `detail` field. Server-side causes stay in the log.
    pub fn detail(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Pipeline(e) => e.detail(),
            ApiError::NotFound => FILE_NOT_FOUND.to_string(),
            ApiError::Timeout(_) => "Processing timed out".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        } else {
            log::warn!("Request rejected: {self}");
        }
        (
            status,
            Json(ErrorBody {
                detail: self.detail(),
            }),
        )
            .into_response()
    }
}
