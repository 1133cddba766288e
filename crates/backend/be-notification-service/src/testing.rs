use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use be_email_service::{EmailError, EmailMessage, Mailer};
use be_remote_db::{DbError, DbResult, Json, OutboxKind, OutboxStatus, OutboxTask};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::effects::{LedgerPayload, NotificationPayload};
use crate::store::OutboxStore;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn task(kind: OutboxKind, payload: serde_json::Value) -> OutboxTask {
    let now = Utc::now();
    OutboxTask {
        id: Uuid::from_u128(NEXT_ID.fetch_add(1, Ordering::Relaxed) as u128),
        kind,
        payload: Json(payload),
        status: OutboxStatus::Pending,
        attempts: 0,
        next_attempt_at: now,
        last_error: None,
        created_at: now,
        updated_at: now,
    }
}

type Failure = (Uuid, String, Option<DateTime<Utc>>);

#[derive(Default)]
pub struct FakeOutboxStore {
    pending: Mutex<Vec<OutboxTask>>,
    enqueue_fails: Mutex<bool>,
    completed: Mutex<Vec<Uuid>>,
    failures: Mutex<Vec<Failure>>,
    notifications: Mutex<Vec<NotificationPayload>>,
    ledger: Mutex<Vec<LedgerPayload>>,
}

impl FakeOutboxStore {
    pub fn push(&self, task: OutboxTask) {
        self.pending.lock().push(task);
    }

    pub fn fail_enqueue(&self) {
        *self.enqueue_fails.lock() = true;
    }

    pub fn tasks(&self) -> Vec<OutboxTask> {
        self.pending.lock().clone()
    }

    pub fn completed(&self) -> Vec<Uuid> {
        self.completed.lock().clone()
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.failures.lock().clone()
    }

    pub fn notifications(&self) -> Vec<NotificationPayload> {
        self.notifications.lock().clone()
    }

    pub fn ledger(&self) -> Vec<LedgerPayload> {
        self.ledger.lock().clone()
    }
}

#[async_trait]
impl OutboxStore for FakeOutboxStore {
    async fn enqueue(&self, kind: OutboxKind, payload: serde_json::Value) -> DbResult<Uuid> {
        if *self.enqueue_fails.lock() {
            return Err(DbError::Connection("connection refused".into()));
        }
        let task = task(kind, payload);
        let id = task.id;
        self.push(task);
        Ok(id)
    }

    async fn claim_due(&self, limit: i64, _lease: Duration) -> DbResult<Vec<OutboxTask>> {
        let mut pending = self.pending.lock();
        let take = (limit.max(0) as usize).min(pending.len());
        Ok(pending
            .drain(..take)
            .map(|mut task| {
                task.attempts += 1;
                task
            })
            .collect())
    }

    async fn complete(&self, task_id: Uuid) -> DbResult<()> {
        self.completed.lock().push(task_id);
        Ok(())
    }

    async fn record_failure(
        &self,
        task_id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        self.failures
            .lock()
            .push((task_id, error.to_string(), retry_at));
        Ok(())
    }

    async fn insert_notification(&self, notification: &NotificationPayload) -> DbResult<()> {
        self.notifications.lock().push(notification.clone());
        Ok(())
    }

    async fn insert_ledger_entry(&self, entry: &LedgerPayload) -> DbResult<()> {
        self.ledger.lock().push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: Mutex<bool>,
}

impl FakeMailer {
    pub fn fail_all(&self) {
        *self.fail.lock() = true;
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if *self.fail.lock() {
            return Err(EmailError::Rejected {
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
