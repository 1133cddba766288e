use secrecy::SecretString;
use url::Url;

use crate::error::{StorageError, StorageResult};

pub const DEFAULT_IMAGE_HOST_URL: &str = "https://api.imgbb.com/1/upload";

/// Where uploaded images end up. Object storage wins when both are set.
#[derive(Debug, Clone, Default)]
pub enum StorageConfig {
    ObjectStorage {
        url: Url,
        service_key: SecretString,
    },
    ImageHost {
        url: Url,
        api_key: SecretString,
    },
    #[default]
    Disabled,
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_url(name: &str, raw: &str) -> StorageResult<Url> {
    Url::parse(raw).map_err(|e| StorageError::configuration(format!("{name} is not a URL: {e}")))
}

impl StorageConfig {
    /// Create configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Configuration` when a URL variable is set but
    /// cannot be parsed. Missing variables leave uploads disabled.
    pub fn from_env() -> StorageResult<Self> {
        if let (Some(url), Some(key)) = (non_empty("STORAGE_URL"), non_empty("STORAGE_SERVICE_KEY"))
        {
            return Ok(StorageConfig::ObjectStorage {
                url: parse_url("STORAGE_URL", &url)?,
                service_key: SecretString::from(key),
            });
        }

        if let Some(key) = non_empty("IMAGE_HOST_API_KEY") {
            let url = non_empty("IMAGE_HOST_URL").unwrap_or_else(|| DEFAULT_IMAGE_HOST_URL.into());
            return Ok(StorageConfig::ImageHost {
                url: parse_url("IMAGE_HOST_URL", &url)?,
                api_key: SecretString::from(key),
            });
        }

        Ok(StorageConfig::Disabled)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            StorageConfig::ObjectStorage { .. } => "object-storage",
            StorageConfig::ImageHost { .. } => "image-host",
            StorageConfig::Disabled => "disabled",
        }
    }
}
