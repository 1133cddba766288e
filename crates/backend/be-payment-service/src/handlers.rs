use std::sync::Arc;

use auth_core::Role;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use be_authz::{AuthUser, authorize};
use rust_decimal::Decimal;
use stripe::{EventObject, EventType, Webhook};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::PaymentError;
use crate::issuer::{IssueRequest, issue_payment_intent};
use crate::reconcile::round2;
use crate::service::AppState;
use crate::types::{CreatePaymentIntentRequest, CreatePaymentIntentResponse};
use crate::webhook::WebhookEventHandler;

// ---------------------------------------------------------------------------
// POST /payment/create-payment-intent
// ---------------------------------------------------------------------------

/// Reconciles the submitted amount with the stored order, then creates (or
/// reuses) the processor intent for this checkout.
pub async fn create_payment_intent<H: WebhookEventHandler>(
    State(state): State<Arc<AppState<H>>>,
    AuthUser(principal): AuthUser,
    Json(body): Json<CreatePaymentIntentRequest>,
) -> Result<Json<CreatePaymentIntentResponse>, PaymentError> {
    authorize(&principal, &Role::ALL)?;

    let amount = body.amount.ok_or(PaymentError::MissingField("amount"))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(PaymentError::InvalidField("amount"));
    }
    let amount = round2(Decimal::try_from(amount).map_err(|_| PaymentError::InvalidField("amount"))?);

    let order_id = body
        .metadata
        .order_id
        .as_deref()
        .ok_or(PaymentError::MissingField("metadata.order_id"))?;
    let order_id =
        Uuid::parse_str(order_id).map_err(|_| PaymentError::InvalidField("metadata.order_id"))?;

    let currency = body
        .currency
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| state.config.currency.clone());

    let response = issue_payment_intent(
        state.store.as_ref(),
        state.gateway.as_ref(),
        &state.config,
        IssueRequest {
            order_id,
            customer_id: principal.user_id,
            amount,
            currency,
            idempotency_key: body.idempotency_key,
            points_used: body.metadata.points_used.unwrap_or(0),
        },
    )
    .await?;

    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// POST /payment/webhook
// ---------------------------------------------------------------------------

/// Handles processor webhook events with signature verification. Events for
/// unknown intents are acknowledged so the processor stops retrying.
pub async fn handle_webhook<H: WebhookEventHandler>(
    State(state): State<Arc<AppState<H>>>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, PaymentError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(PaymentError::WebhookSignatureInvalid)?;

    let event = Webhook::construct_event(&body, signature, &state.config.stripe_webhook_secret)
        .map_err(|_| PaymentError::WebhookSignatureInvalid)?;

    let EventObject::PaymentIntent(intent) = event.data.object else {
        info!(event_type = %event.type_, "Ignoring webhook event");
        return Ok(StatusCode::OK);
    };
    let intent_id = intent.id.to_string();

    let result = match event.type_ {
        EventType::PaymentIntentSucceeded => {
            info!(%intent_id, "Payment intent succeeded");
            state.webhook_handler.on_payment_succeeded(intent_id).await
        }
        EventType::PaymentIntentPaymentFailed => {
            info!(%intent_id, "Payment intent failed");
            state.webhook_handler.on_payment_failed(intent_id).await
        }
        EventType::PaymentIntentCanceled => {
            info!(%intent_id, "Payment intent canceled");
            state.webhook_handler.on_payment_canceled(intent_id).await
        }
        other => {
            warn!(event_type = %other, "Unhandled webhook event");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Failed to apply webhook event");
        return Err(e);
    }

    Ok(StatusCode::OK)
}
