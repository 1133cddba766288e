use std::time::Duration;

use async_trait::async_trait;
use be_remote_db::{DatabaseManager, DbResult, OutboxKind, OutboxTask};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::effects::{LedgerPayload, NotificationPayload};

#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn enqueue(&self, kind: OutboxKind, payload: serde_json::Value) -> DbResult<Uuid>;

    /// Claims due tasks, bumping their attempt counter and leasing them.
    async fn claim_due(&self, limit: i64, lease: Duration) -> DbResult<Vec<OutboxTask>>;

    async fn complete(&self, task_id: Uuid) -> DbResult<()>;

    /// `retry_at = None` marks the task as failed for good.
    async fn record_failure(
        &self,
        task_id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> DbResult<()>;

    async fn insert_notification(&self, notification: &NotificationPayload) -> DbResult<()>;

    async fn insert_ledger_entry(&self, entry: &LedgerPayload) -> DbResult<()>;
}

#[async_trait]
impl OutboxStore for DatabaseManager {
    async fn enqueue(&self, kind: OutboxKind, payload: serde_json::Value) -> DbResult<Uuid> {
        let task = self
            .enqueue_outbox_task()
            .kind(kind)
            .payload(payload)
            .call()
            .await?;
        Ok(task.id)
    }

    async fn claim_due(&self, limit: i64, lease: Duration) -> DbResult<Vec<OutboxTask>> {
        self.claim_due_outbox_tasks()
            .limit(limit)
            .lease_secs(lease.as_secs_f64())
            .call()
            .await
    }

    async fn complete(&self, task_id: Uuid) -> DbResult<()> {
        self.complete_outbox_task(task_id).await
    }

    async fn record_failure(
        &self,
        task_id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        self.record_outbox_failure()
            .task_id(task_id)
            .error(error)
            .maybe_retry_at(retry_at)
            .call()
            .await
    }

    async fn insert_notification(&self, notification: &NotificationPayload) -> DbResult<()> {
        self.create_notification()
            .maybe_user_id(notification.user_id)
            .maybe_restaurant_id(notification.restaurant_id)
            .kind(&notification.kind)
            .title(&notification.title)
            .message(&notification.message)
            .data(notification.data.clone())
            .call()
            .await?;
        Ok(())
    }

    async fn insert_ledger_entry(&self, entry: &LedgerPayload) -> DbResult<()> {
        self.insert_payment_ledger_entry()
            .order_id(entry.order_id)
            .maybe_processor_intent_id(entry.processor_intent_id.clone())
            .maybe_processor_refund_id(entry.processor_refund_id.clone())
            .kind(&entry.kind)
            .amount(entry.amount)
            .call()
            .await?;
        Ok(())
    }
}
