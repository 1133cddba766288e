use std::sync::Arc;

use be_authz::IdentityGate;
use be_remote_db::DatabaseManager;

use crate::config::PaymentConfig;
use crate::gateway::{PaymentGateway, StripeGateway};
use crate::store::PaymentStore;
use crate::webhook::{OrderPaymentHandler, WebhookEventHandler};

pub struct AppState<H: WebhookEventHandler = OrderPaymentHandler> {
    pub config: PaymentConfig,
    pub gateway: Arc<dyn PaymentGateway>,
    pub store: Arc<dyn PaymentStore>,
    pub webhook_handler: Arc<H>,
    pub gate: IdentityGate,
}

impl AppState {
    pub fn from_env(
        db: Arc<DatabaseManager>,
        gate: IdentityGate,
    ) -> Result<Self, crate::error::PaymentError> {
        let config = PaymentConfig::from_env()?;
        let gateway = Arc::new(StripeGateway::new(&config.stripe_secret_key));
        let store: Arc<dyn PaymentStore> = db;
        Ok(Self {
            config,
            gateway,
            webhook_handler: Arc::new(OrderPaymentHandler::new(store.clone())),
            store,
            gate,
        })
    }
}
