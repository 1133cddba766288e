use secrecy::SecretString;

pub const DEFAULT_API_URL: &str = "https://api.brevo.com/v3/smtp/email";
pub const DEFAULT_SENDER: &str = "noreply@cvneat.fr";
pub const DEFAULT_SENDER_NAME: &str = "CVN'EAT";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_key: Option<SecretString>,
    pub api_url: String,
    pub sender: String,
    pub sender_name: String,
}

impl EmailConfig {
    /// Every variable is optional; a missing key disables sending.
    pub fn from_env() -> Self {
        let non_empty = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            api_key: non_empty("EMAIL_API_KEY").map(SecretString::from),
            api_url: non_empty("EMAIL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            sender: non_empty("EMAIL_SENDER").unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            sender_name: non_empty("EMAIL_SENDER_NAME")
                .unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
        }
    }
}
