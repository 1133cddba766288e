use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_remote_db::{DbError, OrderStatus};
use serde_json::json;

use crate::sirene::RegistryError;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Authz(#[from] be_authz::AuthzError),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Order is {0} and can no longer be cancelled")]
    NotCancellable(OrderStatus),

    #[error("User is not a delivery driver")]
    NotADriver,

    #[error("Confirmation text does not match")]
    InvalidConfirmation,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl AdminError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdminError::Authz(err) => err.status_code(),
            AdminError::MissingField(_)
            | AdminError::InvalidField(_)
            | AdminError::NotADriver
            | AdminError::InvalidConfirmation => StatusCode::BAD_REQUEST,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::NotCancellable(_) => StatusCode::CONFLICT,
            AdminError::Registry(err) => err.status_code(),
            AdminError::Database(DbError::Duplicate { .. })
            | AdminError::Database(DbError::ForeignKeyViolation { .. }) => StatusCode::CONFLICT,
            AdminError::Database(err) if err.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            AdminError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            AdminError::InvalidConfirmation => Some("INVALID_CONFIRMATION"),
            AdminError::NotCancellable(_) => Some("ORDER_NOT_CANCELLABLE"),
            AdminError::Database(DbError::ForeignKeyViolation { .. }) => {
                Some("FOREIGN_KEY_CONSTRAINT")
            }
            AdminError::Registry(RegistryError::NotConfigured) => Some("REGISTRY_NOT_CONFIGURED"),
            _ => None,
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        if let AdminError::Authz(err) = self {
            return err.into_response();
        }

        let status = self.status_code();
        let message = match &self {
            // Operators need to know which variables are missing.
            AdminError::Registry(RegistryError::NotConfigured) => self.to_string(),
            AdminError::Registry(_) => {
                tracing::error!(%status, error = %self, "Business registry request failed");
                "Business registry is unavailable".to_string()
            }
            _ if status.is_server_error() => {
                tracing::error!(%status, error = %self, "Admin service error");
                "Internal server error".to_string()
            }
            _ => {
                tracing::warn!(%status, error = %self, "Admin request rejected");
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
