use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use be_authz::AdminUser;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::cancellation::{ADMIN_CANCEL_REASON, REFUNDED_CANCEL_REASON, start_of_day};
use crate::error::AdminError;
use crate::payouts::{PayoutOutcome, PayoutRequest, record_payout};
use crate::reset::{ResetOutcome, reset_all};
use crate::service::AppState;
use crate::sirene::{SearchParams, SearchResults};
use crate::types::{
    BatchResponse, CancelBody, CancelPendingBody, CancelResponse, PayoutBody, PreviewOrder,
    PreviewResponse, ResetBody,
};

// ---------------------------------------------------------------------------
// Order cancellation
// ---------------------------------------------------------------------------

pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(order_id): Path<Uuid>,
    body: Option<Json<CancelBody>>,
) -> Result<Json<CancelResponse>, AdminError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let reason = body.reason().unwrap_or(ADMIN_CANCEL_REASON);

    info!(admin_id = %admin.user_id, %order_id, "Admin cancellation requested");
    let cancellation = state.canceller.cancel(order_id, reason).await?;
    Ok(Json(cancellation.into()))
}

pub async fn cancel_pending(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    body: Option<Json<CancelPendingBody>>,
) -> Result<Json<BatchResponse>, AdminError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let orders = state
        .store
        .pending_for_cancellation(body.include_unpaid)
        .await?;

    info!(
        admin_id = %admin.user_id,
        selected = orders.len(),
        include_unpaid = body.include_unpaid,
        "Cancelling pending orders"
    );

    let outcome = state
        .canceller
        .cancel_batch(orders.iter().map(|o| o.id).collect(), ADMIN_CANCEL_REASON)
        .await;
    Ok(Json(BatchResponse::new(orders.len(), outcome)))
}

pub async fn preview_refunded_today(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<PreviewResponse>, AdminError> {
    let orders = state
        .store
        .refunded_uncancelled_since(start_of_day(Utc::now()))
        .await?;

    Ok(Json(PreviewResponse {
        count: orders.len(),
        orders: orders.iter().map(PreviewOrder::from).collect(),
    }))
}

pub async fn cancel_refunded_today(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
) -> Result<Json<BatchResponse>, AdminError> {
    let orders = state
        .store
        .refunded_uncancelled_since(start_of_day(Utc::now()))
        .await?;

    info!(admin_id = %admin.user_id, selected = orders.len(), "Cancelling orders refunded today");

    let outcome = state
        .canceller
        .cancel_batch(orders.iter().map(|o| o.id).collect(), REFUNDED_CANCEL_REASON)
        .await;
    Ok(Json(BatchResponse::new(orders.len(), outcome)))
}

// ---------------------------------------------------------------------------
// POST /admin/delivery-payments/create
// ---------------------------------------------------------------------------

pub async fn create_delivery_payment(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(body): Json<PayoutBody>,
) -> Result<Json<PayoutOutcome>, AdminError> {
    let request = PayoutRequest::try_from(body)?;
    let outcome = record_payout(state.store.as_ref(), admin.user_id, request).await?;
    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// POST /admin/reset
// ---------------------------------------------------------------------------

pub async fn reset_platform(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(body): Json<ResetBody>,
) -> Result<Json<ResetOutcome>, AdminError> {
    let outcome = reset_all(state.store.as_ref(), admin.user_id, &body.confirmation).await?;
    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// GET /admin/sirene/search
// ---------------------------------------------------------------------------

pub async fn search_registry(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, AdminError> {
    Ok(Json(state.registry.search(&params).await?))
}
