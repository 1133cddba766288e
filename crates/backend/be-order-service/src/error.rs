use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_remote_db::DbError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error(transparent)]
    Authz(#[from] be_authz::AuthzError),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Account suspended for abusive complaints")]
    AccountFlagged,

    #[error("Only delivered orders can receive a complaint")]
    OrderNotDelivered,

    #[error("Complaints open one hour after delivery")]
    ComplaintTooEarly,

    #[error("The 48 hour complaint window has closed")]
    ComplaintWindowExpired,

    #[error("A complaint already exists for this order")]
    DuplicateComplaint,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl OrderError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OrderError::Authz(err) => err.status_code(),
            OrderError::MissingField(_)
            | OrderError::InvalidField(_)
            | OrderError::OrderNotDelivered
            | OrderError::ComplaintTooEarly
            | OrderError::ComplaintWindowExpired => StatusCode::BAD_REQUEST,
            OrderError::AccountFlagged => StatusCode::FORBIDDEN,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::DuplicateComplaint
            | OrderError::Database(DbError::Duplicate { .. })
            | OrderError::Database(DbError::ForeignKeyViolation { .. }) => StatusCode::CONFLICT,
            OrderError::Database(err) if err.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            OrderError::Config(_) | OrderError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            OrderError::AccountFlagged => Some("ACCOUNT_FLAGGED"),
            OrderError::OrderNotDelivered => Some("ORDER_NOT_DELIVERED"),
            OrderError::ComplaintTooEarly => Some("COMPLAINT_TOO_EARLY"),
            OrderError::ComplaintWindowExpired => Some("COMPLAINT_WINDOW_EXPIRED"),
            OrderError::DuplicateComplaint => Some("DUPLICATE_COMPLAINT"),
            OrderError::Database(DbError::ForeignKeyViolation { .. }) => {
                Some("FOREIGN_KEY_CONSTRAINT")
            }
            _ => None,
        }
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        if let OrderError::Authz(err) = self {
            return err.into_response();
        }

        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(%status, error = %self, "Order service error");
            "Internal server error".to_string()
        } else {
            tracing::warn!(%status, error = %self, "Order request rejected");
            self.to_string()
        };

        let body = match self.code() {
            Some(code) => json!({ "error": message, "code": code }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}
