use std::sync::Arc;

use anyhow::Result;
use axum::{Extension, Router, extract::DefaultBodyLimit, routing::post};
use be_authz::IdentityGate;
use be_remote_db::DatabaseManager;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub mod error;
pub mod generator;
pub mod handlers;
pub mod service;
pub mod store;
pub mod types;
pub mod usage;
pub mod validator;

#[cfg(test)]
mod testing;

use service::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/promo-codes/validate", post(handlers::validate_code))
        .route("/promo-codes/apply", post(handlers::apply_code))
        .route("/promo-codes/generate", post(handlers::generate_prize))
        .layer(Extension(state.gate.clone()))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub fn init_promo_service(db: Arc<DatabaseManager>, gate: IdentityGate) -> Result<Router> {
    debug!("Initializing promo service");

    Ok(create_router(Arc::new(AppState::new(db, gate))))
}

pub use error::PromoError;
pub use store::PromoStore;
pub use validator::{ValidateRequest, ValidationOutcome, validate};
