//! Upload targets: a bucket-based object storage REST API, or an image
//! hosting API that takes base64 payloads.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub bucket: &'static str,
    pub path: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stores the image and returns its public URL.
    async fn put(&self, image: StoredImage) -> StorageResult<String>;
}

/// `None` when the config disables uploads.
pub fn from_config(config: StorageConfig) -> StorageResult<Option<Box<dyn ImageBackend>>> {
    if matches!(config, StorageConfig::Disabled) {
        return Ok(None);
    }
    let http = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    let backend: Box<dyn ImageBackend> = match config {
        StorageConfig::ObjectStorage { url, service_key } => Box::new(ObjectStorage {
            http,
            base: url,
            service_key,
        }),
        StorageConfig::ImageHost { url, api_key } => Box::new(ImageHost {
            http,
            endpoint: url,
            api_key,
        }),
        StorageConfig::Disabled => return Ok(None),
    };
    Ok(Some(backend))
}

async fn ensure_success(response: reqwest::Response) -> StorageResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Upstream {
        status: status.as_u16(),
        body,
    })
}

pub struct ObjectStorage {
    http: reqwest::Client,
    base: Url,
    service_key: SecretString,
}

impl ObjectStorage {
    fn object_url(&self, segments: &[&str]) -> StorageResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::configuration("STORAGE_URL cannot be a base URL"))?
            .pop_if_empty()
            .extend(["storage", "v1", "object"])
            .extend(segments.iter().flat_map(|s| s.split('/')));
        Ok(url)
    }
}

#[async_trait]
impl ImageBackend for ObjectStorage {
    fn name(&self) -> &'static str {
        "object-storage"
    }

    async fn put(&self, image: StoredImage) -> StorageResult<String> {
        let upload_url = self.object_url(&[image.bucket, &image.path])?;
        debug!(bucket = image.bucket, path = %image.path, bytes = image.bytes.len(), "Uploading to object storage");

        let key = self.service_key.expose_secret();
        let response = self
            .http
            .post(upload_url)
            .header(AUTHORIZATION, format!("Bearer {key}"))
            .header("apikey", key)
            .header(CONTENT_TYPE, image.content_type)
            .header("x-upsert", "false")
            .body(image.bytes)
            .send()
            .await?;
        ensure_success(response).await?;

        Ok(self
            .object_url(&["public", image.bucket, &image.path])?
            .to_string())
    }
}

#[derive(Debug, Deserialize)]
struct HostedImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct HostResponse {
    data: HostedImage,
}

pub struct ImageHost {
    http: reqwest::Client,
    endpoint: Url,
    api_key: SecretString,
}

#[async_trait]
impl ImageBackend for ImageHost {
    fn name(&self) -> &'static str {
        "image-host"
    }

    async fn put(&self, image: StoredImage) -> StorageResult<String> {
        debug!(path = %image.path, bytes = image.bytes.len(), "Uploading to image host");

        let name = image
            .path
            .rsplit('/')
            .next()
            .unwrap_or(image.path.as_str())
            .to_string();
        let encoded = STANDARD.encode(&image.bytes);
        let response = self
            .http
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.expose_secret())])
            .form(&[("image", encoded.as_str()), ("name", name.as_str())])
            .send()
            .await?;
        let hosted: HostResponse = ensure_success(response).await?.json().await?;
        Ok(hosted.data.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_storage(base: &str) -> ObjectStorage {
        ObjectStorage {
            http: reqwest::Client::new(),
            base: Url::parse(base).unwrap(),
            service_key: SecretString::from("key"),
        }
    }

    #[test]
    fn object_urls_keep_folder_segments() {
        let storage = object_storage("https://project.example.co/");
        let url = storage
            .object_url(&["public", "MENU-IMAGES", "menu-images/abc_1.png"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.example.co/storage/v1/object/public/MENU-IMAGES/menu-images/abc_1.png"
        );
    }

    #[test]
    fn disabled_config_has_no_backend() {
        assert!(from_config(StorageConfig::Disabled).unwrap().is_none());
    }

    #[test]
    fn host_response_reads_url() {
        let parsed: HostResponse = serde_json::from_str(
            r#"{"data":{"id":"x","url":"https://i.example/x.png","display_url":"d"},"success":true,"status":200}"#,
        )
        .unwrap();
        assert_eq!(parsed.data.url, "https://i.example/x.png");
    }
}
