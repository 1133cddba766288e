use std::sync::Arc;

use be_authz::IdentityGate;
use be_notification_service::{Outbox, OutboxStore};
use be_payment_service::{PaymentConfig, PaymentGateway, PaymentError, StripeGateway};
use be_remote_db::DatabaseManager;

use crate::cancellation::Canceller;
use crate::sirene::{RegistryClient, RegistryConfig, RegistryError};
use crate::store::AdminStore;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub struct AppState {
    pub store: Arc<dyn AdminStore>,
    pub canceller: Canceller,
    pub registry: Arc<RegistryClient>,
    pub gate: IdentityGate,
}

impl AppState {
    pub fn from_env(db: Arc<DatabaseManager>, gate: IdentityGate) -> Result<Self, InitError> {
        let payment = PaymentConfig::from_env()?;
        let gateway: Arc<dyn PaymentGateway> =
            Arc::new(StripeGateway::new(&payment.stripe_secret_key));

        let registry_config = RegistryConfig::from_env();
        if registry_config.credentials.is_none() {
            tracing::warn!("INSEE credentials not set; business registry search is disabled");
        }

        let store: Arc<dyn AdminStore> = db.clone();
        let outbox_store: Arc<dyn OutboxStore> = db;

        Ok(Self {
            canceller: Canceller::new(store.clone(), gateway, Outbox::new(outbox_store)),
            registry: Arc::new(RegistryClient::new(registry_config)?),
            store,
            gate,
        })
    }
}
