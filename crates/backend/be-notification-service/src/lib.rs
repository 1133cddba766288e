//! Durable outbox for the secondary effects of a primary write.
//!
//! Services call [`Outbox::enqueue_or_log`] after their write commits; the
//! [`OutboxWorker`] later delivers in-app notifications, emails and payment
//! ledger rows, retrying with exponential backoff.

mod effects;
mod error;
mod outbox;
mod store;
mod worker;

#[cfg(test)]
mod testing;

pub use effects::{EmailPayload, LedgerPayload, NotificationPayload, SideEffect};
pub use error::OutboxError;
pub use outbox::Outbox;
pub use store::OutboxStore;
pub use worker::{BatchReport, OutboxWorker, WorkerConfig, retry_delay};
