//! Error types for image uploads

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error(transparent)]
    Authz(#[from] be_authz::AuthzError),

    #[error("No file provided")]
    MissingFile,

    #[error("Only image files can be uploaded (got {0})")]
    NotAnImage(String),

    #[error("Image exceeds the {max_bytes} byte limit")]
    TooLarge { max_bytes: usize },

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error(
        "Image storage is not configured: set STORAGE_URL and STORAGE_SERVICE_KEY, or IMAGE_HOST_API_KEY"
    )]
    NotConfigured,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage answered {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Storage request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl StorageError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::NotConfigured)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            StorageError::Authz(err) => err.status_code(),
            StorageError::MissingFile
            | StorageError::NotAnImage(_)
            | StorageError::Multipart(_) => StatusCode::BAD_REQUEST,
            StorageError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            StorageError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            StorageError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StorageError::Upstream { .. } | StorageError::Http(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            StorageError::NotAnImage(_) => Some("INVALID_FILE_TYPE"),
            StorageError::TooLarge { .. } => Some("FILE_TOO_LARGE"),
            StorageError::NotConfigured => Some("STORAGE_NOT_CONFIGURED"),
            _ => None,
        }
    }
}

impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        if let StorageError::Authz(err) = self {
            return err.into_response();
        }

        let status = self.status_code();
        let message = match &self {
            StorageError::NotConfigured => self.to_string(),
            _ if status.is_server_error() => {
                tracing::error!(%status, error = %self, "Image upload failed");
                "Image upload failed".to_string()
            }
            _ => {
                tracing::warn!(%status, error = %self, "Image upload rejected");
                self.to_string()
            }
        };

        let body = match self.code() {
            Some(code) => json!({ "error": message, "code": code }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
