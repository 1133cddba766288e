use std::sync::Arc;

use be_authz::IdentityGate;
use be_remote_db::DatabaseManager;

use crate::store::PromoStore;

pub struct AppState {
    pub store: Arc<dyn PromoStore>,
    pub gate: IdentityGate,
}

impl AppState {
    pub fn new(db: Arc<DatabaseManager>, gate: IdentityGate) -> Self {
        Self { store: db, gate }
    }
}
