use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Extension, Router, extract::DefaultBodyLimit, routing::post};
use be_authz::IdentityGate;
use be_remote_db::DatabaseManager;
use tower::ServiceBuilder;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod issuer;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod types;
pub mod webhook;

#[cfg(test)]
mod testing;

use service::AppState;
use webhook::WebhookEventHandler;

pub fn create_router<H: WebhookEventHandler>(state: Arc<AppState<H>>) -> Router {
    let intent_route = Router::new().route(
        "/payment/create-payment-intent",
        post(handlers::create_payment_intent::<H>),
    );

    let intent_route = match GovernorConfigBuilder::default()
        .per_second(6)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
    {
        Some(governor) => intent_route.layer(GovernorLayer::new(Arc::new(governor))),
        None => {
            tracing::warn!("Invalid rate limit configuration; payment intent route is not rate limited");
            intent_route
        }
    };

    let webhook_route =
        Router::new().route("/payment/webhook", post(handlers::handle_webhook::<H>));

    intent_route
        .merge(webhook_route)
        .layer(Extension(state.gate.clone()))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub fn init_payment_service(db: Arc<DatabaseManager>, gate: IdentityGate) -> Result<Router> {
    debug!("Initializing payment service");

    let state =
        Arc::new(AppState::from_env(db, gate).context("Failed to create payment service state")?);

    Ok(create_router(state))
}

pub use config::PaymentConfig;
pub use error::PaymentError;
pub use gateway::{
    GatewayError, IssuedRefund, PaymentGateway, RefundRequest, RefundableBalance, StripeGateway,
};
pub use reconcile::{ReconcileError, round2, to_cents};
pub use types::{CreatePaymentIntentRequest, CreatePaymentIntentResponse};
