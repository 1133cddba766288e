use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken(String),

    #[error("Unknown user")]
    UnknownUser,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Too many failed authentication attempts. Try again later.")]
    RateLimited,

    #[error("Role lookup failed: {0}")]
    Directory(String),

    #[error("Identity gate is not configured")]
    NotConfigured,
}

impl AuthzError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthzError::MissingToken | AuthzError::InvalidToken(_) | AuthzError::UnknownUser => {
                StatusCode::UNAUTHORIZED
            }
            AuthzError::Forbidden => StatusCode::FORBIDDEN,
            AuthzError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthzError::Directory(_) | AuthzError::NotConfigured => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Failures that count against the per-IP limiter.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            AuthzError::MissingToken | AuthzError::InvalidToken(_) | AuthzError::UnknownUser
        )
    }
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AuthzError::Directory(detail) => {
                tracing::error!(error = %detail, "Role lookup failed");
                "Authorization error".to_string()
            }
            AuthzError::NotConfigured => {
                tracing::error!("IdentityGate missing from request extensions");
                "Authorization error".to_string()
            }
            AuthzError::InvalidToken(detail) => {
                tracing::debug!(error = %detail, "Rejected access token");
                self.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
