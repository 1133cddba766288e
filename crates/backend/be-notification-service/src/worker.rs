use std::sync::Arc;
use std::time::Duration;

use be_email_service::Mailer;
use be_remote_db::OutboxTask;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::effects::SideEffect;
use crate::error::OutboxError;
use crate::store::OutboxStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_BATCH_SIZE: i64 = 20;
pub const DEFAULT_MAX_ATTEMPTS: i32 = 8;
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(30);
const DEFAULT_LEASE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub lease: Duration,
    pub max_attempts: i32,
    pub base_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            lease: DEFAULT_LEASE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let poll_interval = std::env::var("OUTBOX_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        Self {
            poll_interval,
            ..Self::default()
        }
    }
}

/// `base × 2^attempts`, with the exponent capped so the delay stays finite.
pub fn retry_delay(base: Duration, attempts: i32) -> Duration {
    let exponent = attempts.clamp(0, 16) as u32;
    base.saturating_mul(2u32.pow(exponent))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub claimed: usize,
    pub done: usize,
    pub retried: usize,
    pub failed: usize,
}

pub struct OutboxWorker {
    store: Arc<dyn OutboxStore>,
    mailer: Arc<dyn Mailer>,
    config: WorkerConfig,
}

impl OutboxWorker {
    pub fn new(store: Arc<dyn OutboxStore>, mailer: Arc<dyn Mailer>, config: WorkerConfig) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<()>) {
        tracing::info!(
            poll_interval = ?self.config.poll_interval,
            "Outbox worker started"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    match self.process_due().await {
                        Ok(report) if report.claimed > 0 => {
                            tracing::debug!(?report, "Outbox batch processed");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "Failed to claim outbox tasks"),
                    }
                }
            }
        }

        tracing::info!("Outbox worker stopped");
    }

    /// Claims one batch of due tasks and dispatches each.
    pub async fn process_due(&self) -> Result<BatchReport, OutboxError> {
        let tasks = self
            .store
            .claim_due(self.config.batch_size, self.config.lease)
            .await?;

        let mut report = BatchReport {
            claimed: tasks.len(),
            ..Default::default()
        };

        for task in tasks {
            match self.dispatch(&task).await {
                Ok(()) => {
                    if let Err(e) = self.store.complete(task.id).await {
                        tracing::warn!(task_id = %task.id, error = %e, "Failed to mark outbox task done");
                    }
                    report.done += 1;
                }
                Err(err) => {
                    if self.handle_failure(&task, &err).await {
                        report.failed += 1;
                    } else {
                        report.retried += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    async fn dispatch(&self, task: &OutboxTask) -> Result<(), OutboxError> {
        match SideEffect::from_payload(task.kind, &task.payload.0)? {
            SideEffect::Notification(notification) => {
                self.store.insert_notification(&notification).await?;
            }
            SideEffect::Email(email) => {
                self.mailer.send(&email.to_message()).await?;
            }
            SideEffect::PaymentLedger(entry) => {
                self.store.insert_ledger_entry(&entry).await?;
            }
        }
        Ok(())
    }

    /// Returns `true` when the task was given up on.
    async fn handle_failure(&self, task: &OutboxTask, err: &OutboxError) -> bool {
        let give_up = err.is_permanent() || task.attempts >= self.config.max_attempts;

        let retry_at = if give_up {
            tracing::error!(
                task_id = %task.id,
                kind = ?task.kind,
                attempts = task.attempts,
                error = %err,
                "Outbox task failed permanently"
            );
            None
        } else {
            let delay = retry_delay(self.config.base_backoff, task.attempts);
            tracing::warn!(
                task_id = %task.id,
                kind = ?task.kind,
                attempts = task.attempts,
                retry_in = ?delay,
                error = %err,
                "Outbox task failed; will retry"
            );
            chrono::Duration::from_std(delay)
                .ok()
                .map(|delay| Utc::now() + delay)
        };

        if let Err(e) = self
            .store
            .record_failure(task.id, &err.to_string(), retry_at)
            .await
        {
            tracing::warn!(task_id = %task.id, error = %e, "Failed to record outbox failure");
        }

        give_up
    }
}
