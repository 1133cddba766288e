use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_remote_db::DbError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum PromoError {
    #[error(transparent)]
    Authz(#[from] be_authz::AuthzError),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("This promo code has already been applied to this order")]
    AlreadyApplied,

    #[error("This prize has already been used")]
    PrizeAlreadyUsed,

    #[error("This code belongs to another account")]
    PrizeNotOwned,

    #[error("This code has expired")]
    PrizeExpired,

    #[error("Could not generate a unique prize code")]
    CodeSpaceExhausted,

    #[error("Random source unavailable: {0}")]
    Random(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl PromoError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PromoError::Authz(err) => err.status_code(),
            PromoError::MissingField(_) | PromoError::InvalidField(_) => StatusCode::BAD_REQUEST,
            PromoError::NotFound(_) => StatusCode::NOT_FOUND,
            PromoError::AlreadyApplied | PromoError::PrizeAlreadyUsed => StatusCode::CONFLICT,
            PromoError::PrizeNotOwned => StatusCode::FORBIDDEN,
            PromoError::PrizeExpired => StatusCode::GONE,
            PromoError::Database(DbError::Duplicate { .. }) => StatusCode::CONFLICT,
            PromoError::CodeSpaceExhausted | PromoError::Random(_) | PromoError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            PromoError::AlreadyApplied => Some("PROMO_ALREADY_APPLIED"),
            PromoError::PrizeAlreadyUsed => Some("PRIZE_ALREADY_USED"),
            PromoError::PrizeNotOwned => Some("PRIZE_NOT_OWNED"),
            PromoError::PrizeExpired => Some("PRIZE_EXPIRED"),
            _ => None,
        }
    }
}

impl IntoResponse for PromoError {
    fn into_response(self) -> Response {
        if let PromoError::Authz(err) = self {
            return err.into_response();
        }

        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(%status, error = %self, "Promo service error");
            "Internal server error".to_string()
        } else {
            tracing::warn!(%status, error = %self, "Promo request rejected");
            self.to_string()
        };

        let body = match self.code() {
            Some(code) => json!({ "error": message, "code": code }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}
