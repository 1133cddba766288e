#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email transport error: {0}")]
    Transport(String),

    #[error("Email API rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Email client configuration error: {0}")]
    Config(String),
}

impl EmailError {
    pub fn is_retryable(&self) -> bool {
        match self {
            EmailError::Transport(_) => true,
            EmailError::Rejected { status, .. } => *status == 429 || *status >= 500,
            EmailError::InvalidRecipient(_) | EmailError::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for EmailError {
    fn from(err: reqwest::Error) -> Self {
        EmailError::Transport(err.to_string())
    }
}
