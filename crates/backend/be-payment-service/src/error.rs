use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_remote_db::DbError;
use serde::Serialize;

use crate::gateway::GatewayError;
use crate::reconcile::ReconcileError;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error(transparent)]
    Authz(#[from] be_authz::AuthzError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Payments are temporarily unavailable while the platform is under maintenance")]
    Maintenance,

    #[error("{0}")]
    InvalidAmount(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("Idempotency key already used for an amount of {stored_cents} cents, not {requested_cents}")]
    IdempotencyConflict {
        stored_cents: i64,
        requested_cents: i64,
    },

    #[error("Webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

const SUPPORT_MESSAGE: &str = "Payment service configuration error. Please contact support.";

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Authz(err) => err.status_code(),
            PaymentError::Gateway(err) => err.status_code(),
            PaymentError::Reconcile(err) => err.status_code(),
            PaymentError::Maintenance => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::InvalidAmount(_)
            | PaymentError::MissingField(_)
            | PaymentError::InvalidField(_)
            | PaymentError::WebhookSignatureInvalid => StatusCode::BAD_REQUEST,
            PaymentError::IdempotencyConflict { .. } => StatusCode::CONFLICT,
            PaymentError::Config(_) | PaymentError::Database(_) | PaymentError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            PaymentError::Authz(err) if err.status_code().is_server_error() => {
                "Authorization error".to_string()
            }
            PaymentError::Gateway(GatewayError::Configuration(_)) => SUPPORT_MESSAGE.to_string(),
            PaymentError::Gateway(GatewayError::Communication(_)) => {
                "Could not reach the payment processor. Please try again.".to_string()
            }
            PaymentError::Gateway(GatewayError::Rejected { message, .. }) => message.clone(),
            PaymentError::Config(_) => SUPPORT_MESSAGE.to_string(),
            PaymentError::Database(_) | PaymentError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            PaymentError::Reconcile(err) => Some(err.code()),
            PaymentError::Maintenance => Some("MAINTENANCE_MODE"),
            PaymentError::IdempotencyConflict { .. } => Some("IDEMPOTENCY_CONFLICT"),
            _ => None,
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(%status, error = %self, "Payment service error");
        } else {
            tracing::warn!(%status, error = %self, "Payment request rejected");
        }

        let body = ErrorBody {
            error: self.public_message(),
            code: self.code(),
        };

        (status, axum::Json(body)).into_response()
    }
}
