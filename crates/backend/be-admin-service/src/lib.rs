use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use be_authz::IdentityGate;
use be_remote_db::DatabaseManager;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub mod cancellation;
pub mod error;
pub mod handlers;
pub mod payouts;
pub mod reset;
pub mod service;
pub mod sirene;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

use service::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/admin/orders/cancel/{order_id}", post(handlers::cancel_order))
        .route("/admin/orders/cancel-pending", post(handlers::cancel_pending))
        .route(
            "/admin/orders/cancel-refunded-today",
            get(handlers::preview_refunded_today).post(handlers::cancel_refunded_today),
        )
        .route(
            "/admin/delivery-payments/create",
            post(handlers::create_delivery_payment),
        )
        .route("/admin/reset", post(handlers::reset_platform))
        .route("/admin/sirene/search", get(handlers::search_registry))
        .layer(Extension(state.gate.clone()))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub fn init_admin_service(db: Arc<DatabaseManager>, gate: IdentityGate) -> Result<Router> {
    debug!("Initializing admin service");

    let state =
        Arc::new(AppState::from_env(db, gate).context("Failed to create admin service state")?);

    Ok(create_router(state))
}

pub use cancellation::{BatchOutcome, Cancellation, Canceller};
pub use error::AdminError;
pub use store::AdminStore;
