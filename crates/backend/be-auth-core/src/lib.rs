use anyhow::{Context, Result, anyhow};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

pub use auth_core::{Claims, Role};

pub const DEFAULT_AUDIENCE: &str = "authenticated";

/// Verifies access tokens issued by the hosted auth provider (HS256, shared secret).
#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_decoding_key: DecodingKey,
    access_token_encoding_key: EncodingKey,
    pub validation: Validation,
}

impl JwtConfig {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.leeway = 30;

        Self {
            access_token_decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("AUTH_JWT_SECRET")
            .context("AUTH_JWT_SECRET environment variable must be set")?;
        if secret.trim().is_empty() {
            return Err(anyhow!("AUTH_JWT_SECRET must not be empty"));
        }
        let audience =
            std::env::var("AUTH_JWT_AUDIENCE").unwrap_or_else(|_| DEFAULT_AUDIENCE.to_string());

        Ok(Self::new(&secret, &audience))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.access_token_decoding_key, &self.validation)
            .map_err(|e| anyhow!("Invalid token: {}", e))?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(anyhow!("Invalid token: missing subject"));
        }

        Ok(token_data.claims)
    }

    /// Signs claims with the shared secret. Used by local tooling and tests.
    pub fn issue_access_token(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.access_token_encoding_key)
            .map_err(|e| anyhow!("Token generation failed: {}", e))
    }
}
