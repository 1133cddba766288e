//! Image uploads for menus and restaurant pages.
//!
//! Images go to the configured object storage, into a bucket chosen from the
//! upload folder, or to an external image host when no object storage is
//! configured.
//!
//! ## Environment Variables
//!
//! - `STORAGE_URL`, `STORAGE_SERVICE_KEY`: object storage REST endpoint and key
//! - `IMAGE_HOST_API_KEY`: image host API key, used when object storage is unset
//! - `IMAGE_HOST_URL`: image host upload endpoint (optional)

pub mod backend;
pub mod config;
mod error;
pub mod handlers;

pub use backend::{ImageBackend, StoredImage};
pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::{Extension, Router};
use be_authz::IdentityGate;
use bon::bon;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const MULTIPART_OVERHEAD: usize = 64 * 1024;
const DEFAULT_FOLDER: &str = "general";

/// An image as received from the client, before any checks.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub folder: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub success: bool,
    pub url: String,
    /// Same as `url`; older clients read this key.
    pub image_url: String,
    pub file_name: String,
}

#[derive(Clone)]
pub struct StorageService {
    backend: Option<Arc<dyn ImageBackend>>,
}

#[bon]
impl StorageService {
    #[builder]
    pub fn new(backend: Option<Arc<dyn ImageBackend>>) -> Self {
        Self { backend }
    }

    /// Create a new storage service using environment variables for configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn from_env() -> StorageResult<Self> {
        let config = StorageConfig::from_env()?;
        info!(backend = config.backend_name(), "Initializing storage service");
        if matches!(config, StorageConfig::Disabled) {
            warn!("No image storage configured; uploads will answer 503");
        }
        let backend = backend::from_config(config)?;
        Ok(Self::builder().maybe_backend(backend.map(Arc::from)).build())
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Bucket that receives images uploaded into `folder`.
    pub fn bucket_for(folder: &str) -> &'static str {
        match folder {
            "menu-images" => "MENU-IMAGES",
            "restaurant-images" => "RESTAURANTS-IMAGES",
            "advertisement-images" => "PUBLICITE-IMAGES",
            _ => "IMAGES",
        }
    }

    pub fn extension_from_mime(mime_type: &str) -> Option<&'static str> {
        let ext = match mime_type {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/avif" => "avif",
            "image/svg+xml" => "svg",
            "image/bmp" => "bmp",
            "image/tiff" => "tiff",
            _ => return None,
        };
        Some(ext)
    }

    /// Folder names are path segments; anything unexpected falls back to the
    /// default folder.
    fn folder(raw: Option<&str>) -> &str {
        raw.map(str::trim)
            .filter(|f| {
                !f.is_empty()
                    && f.chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            })
            .unwrap_or(DEFAULT_FOLDER)
    }

    /// Declared type first; a generic or missing one is guessed from the
    /// file name.
    fn content_type(upload: &ImageUpload) -> Option<String> {
        upload
            .content_type
            .as_deref()
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
            .or_else(|| {
                upload
                    .file_name
                    .as_deref()
                    .and_then(|name| mime_guess::from_path(name).first())
                    .map(|mime| mime.essence_str().to_string())
            })
    }

    fn extension(content_type: &str, file_name: Option<&str>) -> String {
        if let Some(ext) = Self::extension_from_mime(content_type) {
            return ext.to_string();
        }
        file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "img".to_string())
    }

    pub fn generate_path(folder: &str, user_id: &Uuid, at: DateTime<Utc>, extension: &str) -> String {
        format!("{folder}/{user_id}_{}.{extension}", at.timestamp_millis())
    }

    /// Checks the image and stores it.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when no backend is set, `NotAnImage`/`TooLarge` for
    /// rejected files, and upstream errors from the backend.
    #[tracing::instrument(skip(self, upload), fields(bytes = upload.bytes.len()))]
    pub async fn upload(
        &self,
        user_id: Uuid,
        upload: ImageUpload,
        now: DateTime<Utc>,
    ) -> StorageResult<UploadedImage> {
        if upload.bytes.is_empty() {
            return Err(StorageError::MissingFile);
        }
        let content_type = Self::content_type(&upload)
            .ok_or_else(|| StorageError::NotAnImage("unknown".to_string()))?;
        if !content_type.starts_with("image/") {
            return Err(StorageError::NotAnImage(content_type));
        }
        if upload.bytes.len() > MAX_IMAGE_BYTES {
            return Err(StorageError::TooLarge {
                max_bytes: MAX_IMAGE_BYTES,
            });
        }

        let backend = self.backend.as_ref().ok_or(StorageError::NotConfigured)?;

        let folder = Self::folder(upload.folder.as_deref());
        let bucket = Self::bucket_for(folder);
        let extension = Self::extension(&content_type, upload.file_name.as_deref());
        let path = Self::generate_path(folder, &user_id, now, &extension);
        debug!(backend = backend.name(), bucket, %path, "Storing image");

        let url = backend
            .put(StoredImage {
                bucket,
                path: path.clone(),
                content_type,
                bytes: upload.bytes,
            })
            .await?;

        info!(%user_id, bucket, %path, "Image uploaded");
        Ok(UploadedImage {
            success: true,
            image_url: url.clone(),
            url,
            file_name: path,
        })
    }
}

pub struct AppState {
    pub storage: StorageService,
    pub gate: IdentityGate,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload-image", post(handlers::upload_image))
        .layer(Extension(state.gate.clone()))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + MULTIPART_OVERHEAD))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub fn init_storage_service(gate: IdentityGate) -> Result<Router> {
    debug!("Initializing storage service");
    let storage = StorageService::from_env().context("Failed to create storage service")?;
    Ok(create_router(Arc::new(AppState { storage, gate })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        stored: Mutex<Vec<StoredImage>>,
    }

    #[async_trait::async_trait]
    impl ImageBackend for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn put(&self, image: StoredImage) -> StorageResult<String> {
            let url = format!("https://cdn.example/{}/{}", image.bucket, image.path);
            self.stored.lock().push(image);
            Ok(url)
        }
    }

    fn png(folder: Option<&str>) -> ImageUpload {
        ImageUpload {
            folder: folder.map(str::to_string),
            file_name: Some("burger.png".to_string()),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
        }
    }

    fn service() -> (Arc<Recorder>, StorageService) {
        let recorder = Arc::new(Recorder::default());
        let service = StorageService::builder()
            .backend(recorder.clone() as Arc<dyn ImageBackend>)
            .build();
        (recorder, service)
    }

    #[test]
    fn test_bucket_for_folder() {
        assert_eq!(StorageService::bucket_for("menu-images"), "MENU-IMAGES");
        assert_eq!(
            StorageService::bucket_for("restaurant-images"),
            "RESTAURANTS-IMAGES"
        );
        assert_eq!(StorageService::bucket_for("general"), "IMAGES");
    }

    #[test]
    fn test_generate_path() {
        let user_id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let at = Utc.timestamp_millis_opt(1_760_000_000_123).unwrap();
        assert_eq!(
            StorageService::generate_path("menu-images", &user_id, at, "png"),
            "menu-images/550e8400-e29b-41d4-a716-446655440000_1760000000123.png"
        );
    }

    #[test]
    fn test_folder_is_sanitized() {
        assert_eq!(StorageService::folder(Some("../etc")), "general");
        assert_eq!(StorageService::folder(Some(" menu-images ")), "menu-images");
        assert_eq!(StorageService::folder(None), "general");
    }

    #[tokio::test]
    async fn uploads_into_folder_bucket() {
        let (recorder, service) = service();
        let uploaded = service
            .upload(Uuid::from_u128(7), png(Some("menu-images")), Utc::now())
            .await
            .unwrap();

        let stored = recorder.stored.lock();
        assert_eq!(stored[0].bucket, "MENU-IMAGES");
        assert!(stored[0].path.starts_with("menu-images/"));
        assert!(stored[0].path.ends_with(".png"));
        assert_eq!(uploaded.url, uploaded.image_url);
        assert!(uploaded.url.contains("MENU-IMAGES"));
    }

    #[tokio::test]
    async fn content_type_is_guessed_from_name() {
        let (recorder, service) = service();
        let mut upload = png(None);
        upload.content_type = Some("application/octet-stream".to_string());
        upload.file_name = Some("photo.JPG".to_string());

        service
            .upload(Uuid::from_u128(7), upload, Utc::now())
            .await
            .unwrap();
        assert_eq!(recorder.stored.lock()[0].content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn non_images_are_rejected() {
        let (recorder, service) = service();
        let mut upload = png(None);
        upload.content_type = Some("application/pdf".to_string());

        let err = service
            .upload(Uuid::from_u128(7), upload, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotAnImage(_)));
        assert!(recorder.stored.lock().is_empty());
    }

    #[tokio::test]
    async fn oversized_images_are_rejected() {
        let (_, service) = service();
        let mut upload = png(None);
        upload.bytes = Bytes::from(vec![0u8; MAX_IMAGE_BYTES + 1]);

        let err = service
            .upload(Uuid::from_u128(7), upload, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn unconfigured_storage_is_unavailable() {
        let service = StorageService::builder().build();
        let err = service
            .upload(Uuid::from_u128(7), png(None), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotConfigured));
    }
}
