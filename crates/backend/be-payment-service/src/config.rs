use crate::error::PaymentError;

pub const DEFAULT_CURRENCY: &str = "eur";

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub currency: String,
    /// Accept charges without reconciliation when the order store is
    /// unreachable. Off unless `PAYMENT_VERIFY_FAIL_OPEN=true`.
    pub verify_fail_open: bool,
}

impl PaymentConfig {
    pub fn from_env() -> Result<Self, PaymentError> {
        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY").map_err(|_| {
            PaymentError::Config("STRIPE_SECRET_KEY environment variable must be set".into())
        })?;

        let stripe_webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET").map_err(|_| {
            PaymentError::Config("STRIPE_WEBHOOK_SECRET environment variable must be set".into())
        })?;

        let currency = std::env::var("PAYMENT_CURRENCY")
            .map(|c| c.trim().to_lowercase())
            .ok()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        currency.parse::<stripe::Currency>().map_err(|_| {
            PaymentError::Config(format!("PAYMENT_CURRENCY '{currency}' is not a known currency"))
        })?;

        let verify_fail_open = std::env::var("PAYMENT_VERIFY_FAIL_OPEN")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if verify_fail_open {
            tracing::warn!(
                "PAYMENT_VERIFY_FAIL_OPEN is enabled: charges will be accepted unverified while the order store is unreachable"
            );
        }

        Ok(Self {
            stripe_secret_key,
            stripe_webhook_secret,
            currency,
            verify_fail_open,
        })
    }
}
