//! Transactional email for order, complaint and delivery events.
//!
//! [`HttpMailer`] posts to a JSON email API (Brevo by default). When no API
//! key is configured, [`mailer_from_env`] returns a [`DisabledMailer`] that
//! logs and drops messages.

mod config;
mod error;
mod mailer;
mod templates;

use std::sync::Arc;

pub use config::EmailConfig;
pub use error::EmailError;
pub use mailer::{DisabledMailer, EmailMessage, HttpMailer, Mailer};
pub use templates::EmailTemplate;

pub fn mailer_from_env() -> Arc<dyn Mailer> {
    let config = EmailConfig::from_env();

    if config.api_key.is_none() {
        tracing::warn!("EMAIL_API_KEY not set; outgoing email is disabled");
        return Arc::new(DisabledMailer);
    }

    match HttpMailer::new(config) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP mailer; outgoing email is disabled");
            Arc::new(DisabledMailer)
        }
    }
}
