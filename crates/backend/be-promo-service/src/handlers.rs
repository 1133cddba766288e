use std::sync::Arc;

use auth_core::Role;
use axum::Json;
use axum::extract::State;
use be_authz::{AuthUser, authorize};
use chrono::Utc;

use crate::error::PromoError;
use crate::generator::{GenerateRequest, GeneratedPrize, generate};
use crate::service::AppState;
use crate::types::{ApplyBody, GenerateBody, ValidateBody};
use crate::usage::{ApplyOutcome, ApplyRequest, apply};
use crate::validator::{ValidateRequest, ValidationOutcome, validate};

// ---------------------------------------------------------------------------
// POST /promo-codes/validate
// ---------------------------------------------------------------------------

/// Public: checkout calls this before the customer signs in.
pub async fn validate_code(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ValidateBody>,
) -> Result<Json<ValidationOutcome>, PromoError> {
    let request = ValidateRequest::try_from(body)?;
    let outcome = validate(state.store.as_ref(), request, Utc::now()).await?;
    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// POST /promo-codes/apply
// ---------------------------------------------------------------------------

pub async fn apply_code(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Json(body): Json<ApplyBody>,
) -> Result<Json<ApplyOutcome>, PromoError> {
    authorize(&principal, &Role::ALL)?;

    let request = ApplyRequest::try_from(body)?;
    let outcome = apply(state.store.as_ref(), principal.user_id, request, Utc::now()).await?;
    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// POST /promo-codes/generate
// ---------------------------------------------------------------------------

pub async fn generate_prize(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GeneratedPrize>, PromoError> {
    authorize(&principal, &Role::ALL)?;

    let request = GenerateRequest::try_from(body)?;
    let prize = generate(state.store.as_ref(), principal.user_id, request, Utc::now()).await?;
    Ok(Json(prize))
}
