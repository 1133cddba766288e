use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::get;
use be_admin_service::init_admin_service;
use be_auth_core::JwtConfig;
use be_authz::{IdentityGate, RoleDirectory};
use be_notification_service::{OutboxStore, OutboxWorker, WorkerConfig};
use be_order_service::init_order_service;
use be_payment_service::init_payment_service;
use be_promo_service::init_promo_service;
use be_remote_db::DatabaseManager;
use be_storage::init_storage_service;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

const DEFAULT_CORS_ORIGINS: &str = "https://www.cvneat.fr,https://cvneat.fr";

/// Configuration for running the monolith server.
pub struct ServerConfig {
    pub database_url: String,
    pub http_addr: SocketAddr,
    /// Services whose configuration is missing are disabled instead of
    /// aborting startup.
    pub local_mode: bool,
    /// When this receiver gets a value, the server and background workers
    /// shut down gracefully.
    pub shutdown: tokio::sync::watch::Receiver<()>,
}

fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<HeaderValue>().ok()
        })
        .collect()
}

fn build_cors() -> CorsLayer {
    let origins =
        std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.into());

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parse_origins(&origins)))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

fn health_router() -> Router {
    Router::new().route("/health", get(|| async { StatusCode::OK }))
}

/// A failing service aborts startup, except in local mode where it is
/// replaced by an empty router.
fn mount(
    name: &str,
    result: anyhow::Result<Router>,
    local_mode: bool,
) -> Result<Router, Box<dyn std::error::Error + Send + Sync>> {
    match result {
        Ok(router) => Ok(router),
        Err(e) if local_mode => {
            tracing::warn!("{} service disabled in local mode: {:#}", name, e);
            Ok(Router::new())
        }
        Err(e) => {
            tracing::error!("Failed to initialize {} service: {:#}", name, e);
            Err(e.into())
        }
    }
}

pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db_manager = Arc::new(DatabaseManager::new(&config.database_url).await?);

    let jwt_config = Arc::new(JwtConfig::from_env()?);
    let gate = IdentityGate::new(jwt_config, db_manager.clone() as Arc<dyn RoleDirectory>);

    let payment_router = mount(
        "Payment",
        init_payment_service(db_manager.clone(), gate.clone()),
        config.local_mode,
    )?;
    let promo_router = mount(
        "Promo",
        init_promo_service(db_manager.clone(), gate.clone()),
        config.local_mode,
    )?;
    let admin_router = mount(
        "Admin",
        init_admin_service(db_manager.clone(), gate.clone()),
        config.local_mode,
    )?;
    let order_router = mount(
        "Order",
        init_order_service(db_manager.clone(), gate.clone(), config.shutdown.clone()),
        config.local_mode,
    )?;
    let storage_router = mount(
        "Storage",
        init_storage_service(gate.clone()),
        config.local_mode,
    )?;

    let worker = OutboxWorker::new(
        db_manager.clone() as Arc<dyn OutboxStore>,
        be_email_service::mailer_from_env(),
        WorkerConfig::from_env(),
    );
    let worker_handle = worker.spawn(config.shutdown.clone());

    let http_router = payment_router
        .merge(promo_router)
        .merge(admin_router)
        .merge(order_router)
        .merge(storage_router)
        .merge(health_router())
        .layer(build_cors());

    tracing::info!("Starting HTTP server at {}", config.http_addr);

    let mut http_shutdown = config.shutdown.clone();
    let http_listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    let served = axum::serve(
        http_listener,
        http_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = http_shutdown.changed().await;
        tracing::info!("Shutting down HTTP server...");
    })
    .await;

    if let Err(e) = served {
        tracing::error!("HTTP server error: {}", e);
        return Err(e.into());
    }

    if let Err(e) = worker_handle.await {
        tracing::warn!("Outbox worker did not stop cleanly: {}", e);
    }

    Ok(())
}
