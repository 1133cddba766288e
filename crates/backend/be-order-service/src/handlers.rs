use std::sync::Arc;

use auth_core::Role;
use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use be_authz::{AuthUser, authorize};
use be_remote_db::Complaint;
use chrono::Utc;

use crate::complaints::{ComplaintRequest, FiledComplaint};
use crate::error::OrderError;
use crate::service::AppState;
use crate::types::{ComplaintBody, ListParams, ValidateOrderBody};
use crate::validation::{ValidateOrderRequest, Verdict};

// ---------------------------------------------------------------------------
// POST /orders/validate
// ---------------------------------------------------------------------------

/// Public: the cart is checked before the customer pays.
pub async fn validate_order(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ValidateOrderBody>,
) -> Result<Response, OrderError> {
    let request = ValidateOrderRequest::try_from(body)?;
    let response = match state.validator.validate(request, Utc::now()).await? {
        Verdict::Valid(order) => Json(order).into_response(),
        Verdict::Rejected(rejection) => {
            tracing::info!(code = rejection.code(), "Order validation rejected");
            rejection.into_response()
        }
    };
    Ok(response)
}

// ---------------------------------------------------------------------------
// /complaints
// ---------------------------------------------------------------------------

pub async fn file_complaint(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Json(body): Json<ComplaintBody>,
) -> Result<Json<FiledComplaint>, OrderError> {
    authorize(&principal, &[Role::Customer])?;

    let request = ComplaintRequest::try_from(body)?;
    let filed = state
        .complaints
        .file(principal.user_id, request, Utc::now())
        .await?;
    Ok(Json(filed))
}

pub async fn list_complaints(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Complaint>>, OrderError> {
    authorize(&principal, &Role::ALL)?;

    let complaints = state
        .complaints
        .list(principal.user_id, principal.is_admin(), params.limit)
        .await?;
    Ok(Json(complaints))
}
