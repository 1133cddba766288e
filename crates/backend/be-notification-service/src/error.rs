use be_email_service::EmailError;
use be_remote_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("Invalid outbox payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Outbox database error: {0}")]
    Database(#[from] DbError),

    #[error("Email delivery failed: {0}")]
    Email(#[from] EmailError),
}

impl OutboxError {
    /// A payload that cannot be decoded will never succeed on retry.
    pub fn is_permanent(&self) -> bool {
        matches!(self, OutboxError::Payload(_))
    }
}
