use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use be_authz::IdentityGate;
use be_remote_db::DatabaseManager;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub mod cache;
pub mod complaints;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hours;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod testing;

use service::AppState;

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/orders/validate", post(handlers::validate_order))
        .route(
            "/complaints",
            get(handlers::list_complaints).post(handlers::file_complaint),
        )
        .layer(Extension(state.gate.clone()))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Also starts the restaurant cache sweeper, which stops with `shutdown`.
pub fn init_order_service(
    db: Arc<DatabaseManager>,
    gate: IdentityGate,
    shutdown: watch::Receiver<()>,
) -> Result<Router> {
    debug!("Initializing order service");

    let config = OrderConfig::from_env().context("Failed to load order service config")?;
    let state = Arc::new(AppState::new(db, gate, config));
    state
        .restaurants
        .spawn_sweeper(CACHE_SWEEP_INTERVAL, shutdown);

    Ok(create_router(state))
}

pub use cache::TtlCache;
pub use config::OrderConfig;
pub use error::OrderError;
pub use store::OrderStore;
pub use validation::{OrderValidator, Rejection, Verdict};
