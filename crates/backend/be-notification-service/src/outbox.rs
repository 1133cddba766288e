use std::sync::Arc;

use uuid::Uuid;

use crate::effects::SideEffect;
use crate::error::OutboxError;
use crate::store::OutboxStore;

#[derive(Clone)]
pub struct Outbox {
    store: Arc<dyn OutboxStore>,
}

impl Outbox {
    pub fn new(store: Arc<dyn OutboxStore>) -> Self {
        Self { store }
    }

    pub async fn enqueue(&self, effect: SideEffect) -> Result<Uuid, OutboxError> {
        let payload = effect.to_payload()?;
        let id = self.store.enqueue(effect.kind(), payload).await?;
        tracing::debug!(task_id = %id, kind = ?effect.kind(), "Side effect enqueued");
        Ok(id)
    }

    /// Enqueue failures never fail the primary operation.
    pub async fn enqueue_or_log(&self, effect: SideEffect) {
        let kind = effect.kind();
        if let Err(e) = self.enqueue(effect).await {
            tracing::warn!(?kind, error = %e, "Failed to enqueue side effect");
        }
    }

    pub async fn enqueue_all_or_log(&self, effects: impl IntoIterator<Item = SideEffect>) {
        for effect in effects {
            self.enqueue_or_log(effect).await;
        }
    }
}
