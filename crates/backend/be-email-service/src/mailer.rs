use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::EmailConfig;
use crate::error::EmailError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_name: Option<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

pub struct HttpMailer {
    client: reqwest::Client,
    api_key: SecretString,
    api_url: String,
    sender: String,
    sender_name: String,
}

impl HttpMailer {
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let api_key = config
            .api_key
            .ok_or_else(|| EmailError::Config("EMAIL_API_KEY is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EmailError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            api_url: config.api_url,
            sender: config.sender,
            sender_name: config.sender_name,
        })
    }

    fn payload(&self, message: &EmailMessage) -> serde_json::Value {
        let mut recipient = serde_json::json!({ "email": message.to });
        if let Some(name) = &message.to_name {
            recipient["name"] = serde_json::Value::String(name.clone());
        }

        serde_json::json!({
            "sender": { "name": self.sender_name, "email": self.sender },
            "to": [recipient],
            "subject": message.subject,
            "htmlContent": message.html,
        })
    }

    async fn post_once(&self, payload: &serde_json::Value) -> Result<(), EmailError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("api-key", self.api_key.expose_secret())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(EmailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn validate_recipient(address: &str) -> Result<(), EmailError> {
    let trimmed = address.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(EmailError::InvalidRecipient(address.to_string())),
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        validate_recipient(&message.to)?;
        let payload = self.payload(message);

        (|| self.post_once(&payload))
            .retry(ExponentialBuilder::default().with_max_times(MAX_RETRIES))
            .when(|e| e.is_retryable())
            .notify(|err, dur| {
                tracing::warn!(error = %err, delay = ?dur, "Retrying email delivery");
            })
            .await?;

        tracing::info!(subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// Used when no email API is configured.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        tracing::info!(
            subject = %message.subject,
            "Email delivery disabled; dropping message"
        );
        Ok(())
    }
}
