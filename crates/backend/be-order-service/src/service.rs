use std::sync::Arc;

use be_authz::IdentityGate;
use be_notification_service::{Outbox, OutboxStore};
use be_remote_db::{DatabaseManager, Restaurant};
use uuid::Uuid;

use crate::cache::{DEFAULT_MAX_ENTRIES, TtlCache};
use crate::complaints::ComplaintDesk;
use crate::config::OrderConfig;
use crate::store::OrderStore;
use crate::validation::{OrderValidator, RESTAURANT_CACHE_TTL};

pub struct AppState {
    pub validator: OrderValidator,
    pub complaints: ComplaintDesk,
    pub restaurants: Arc<TtlCache<Uuid, Restaurant>>,
    pub gate: IdentityGate,
}

impl AppState {
    pub fn new(db: Arc<DatabaseManager>, gate: IdentityGate, config: OrderConfig) -> Self {
        let store: Arc<dyn OrderStore> = db.clone();
        let outbox_store: Arc<dyn OutboxStore> = db;
        let restaurants = Arc::new(TtlCache::new(RESTAURANT_CACHE_TTL, DEFAULT_MAX_ENTRIES));

        Self {
            validator: OrderValidator::new(store.clone(), restaurants.clone(), config.timezone),
            complaints: ComplaintDesk::new(store, Outbox::new(outbox_store)),
            restaurants,
            gate,
        }
    }
}
