//! Profile image storage backends

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use studymate_core::{ImageBackend, UnifiedConfig};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ImageStoreError {
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),
    #[error("Uploaded image is empty")]
    Empty,
    #[error("Image storage is not configured: {0}")]
    NotConfigured(String),
    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image upload failed: {0}")]
    Upload(String),
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persists an image and returns the URL it can be fetched from
    async fn store(&self, file_name: &str, content_type: &str, bytes: Bytes) -> Result<String, ImageStoreError>;

    fn backend_name(&self) -> &'static str;
}

pub type ImageStoreRef = Arc<dyn ImageStore>;

/// Checks the upload and returns the file extension for its type
pub fn validate_image(content_type: &str, bytes: &[u8]) -> Result<&'static str, ImageStoreError> {
    if bytes.is_empty() {
        return Err(ImageStoreError::Empty);
    }
    match content_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        other => Err(ImageStoreError::UnsupportedType(other.to_string())),
    }
}

/// Local-disk backend; files land under `<root>/profile` and are served
/// from `/uploads`
#[derive(Debug, Clone)]
pub struct LocalDiskStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageStore for LocalDiskStore {
    async fn store(&self, file_name: &str, content_type: &str, bytes: Bytes) -> Result<String, ImageStoreError> {
        let extension = validate_image(content_type, &bytes)?;
        let dir = self.root.join("profile");
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        tokio::fs::write(dir.join(&name), &bytes).await?;

        info!(original = file_name, stored = %name, bytes = bytes.len(), "Stored profile image on disk");
        Ok(format!("{}/uploads/profile/{}", self.public_base_url, name))
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

/// Cloudinary backend using an unsigned upload preset
#[derive(Debug, Clone)]
pub struct CloudinaryStore {
    cloud_name: String,
    upload_preset: String,
    folder: Option<String>,
    base_url: String,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: String,
}

#[derive(Deserialize)]
struct CloudinaryErrorResponse {
    error: CloudinaryError,
}

#[derive(Deserialize)]
struct CloudinaryError {
    message: String,
}

impl CloudinaryStore {
    pub fn new(
        cloud_name: String,
        upload_preset: String,
        folder: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            cloud_name,
            upload_preset,
            folder,
            base_url: base_url
                .unwrap_or_else(|| "https://api.cloudinary.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/v1_1/{}/image/upload", self.base_url, self.cloud_name)
    }
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    async fn store(&self, file_name: &str, content_type: &str, bytes: Bytes) -> Result<String, ImageStoreError> {
        validate_image(content_type, &bytes)?;

        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| ImageStoreError::Upload(e.to_string()))?;
        let mut form = Form::new()
            .text("upload_preset", self.upload_preset.clone())
            .part("file", part);
        if let Some(folder) = &self.folder {
            form = form.text("folder", folder.clone());
        }

        let response = self
            .http_client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ImageStoreError::Upload(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ImageStoreError::Upload(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<CloudinaryErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ImageStoreError::Upload(format!("{} ({})", message, status)));
        }

        let uploaded: CloudinaryUploadResponse = serde_json::from_str(&body)
            .map_err(|e| ImageStoreError::Upload(format!("unexpected response: {}", e)))?;
        info!(url = %uploaded.secure_url, "Uploaded profile image to Cloudinary");
        Ok(uploaded.secure_url)
    }

    fn backend_name(&self) -> &'static str {
        "cloudinary"
    }
}

/// Creates the configured image backend
pub fn create_image_store(config: &UnifiedConfig) -> Result<ImageStoreRef, ImageStoreError> {
    match config.images.backend {
        ImageBackend::Local => Ok(Arc::new(LocalDiskStore::new(
            config.server.upload_dir.clone(),
            &config.server.public_base_url,
        ))),
        ImageBackend::Cloudinary => {
            let cloud_name = config.images.cloud_name.clone().ok_or_else(|| {
                ImageStoreError::NotConfigured("images.cloud_name is required for cloudinary".to_string())
            })?;
            let upload_preset = config.images.upload_preset.clone().ok_or_else(|| {
                ImageStoreError::NotConfigured("images.upload_preset is required for cloudinary".to_string())
            })?;
            Ok(Arc::new(CloudinaryStore::new(
                cloud_name,
                upload_preset,
                config.images.folder.clone(),
                config.images.base_url.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Multipart, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    #[test]
    fn test_validate_image() {
        assert_eq!(validate_image("image/png", b"x").unwrap(), "png");
        assert_eq!(validate_image("IMAGE/JPEG", b"x").unwrap(), "jpg");
        assert!(matches!(
            validate_image("application/pdf", b"x"),
            Err(ImageStoreError::UnsupportedType(_))
        ));
        assert!(matches!(validate_image("image/png", b""), Err(ImageStoreError::Empty)));
    }

    #[tokio::test]
    async fn test_local_store_writes_file() {
        let dir = tempdir().unwrap();
        let store = LocalDiskStore::new(dir.path(), "http://localhost:5000/");

        let url = store
            .store("me.png", "image/png", Bytes::from_static(b"\x89PNG data"))
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost:5000/uploads/profile/"));
        assert!(url.ends_with(".png"));

        let name = url.rsplit('/').next().unwrap();
        let written = std::fs::read(dir.path().join("profile").join(name)).unwrap();
        assert_eq!(written, b"\x89PNG data");
    }

    #[tokio::test]
    async fn test_cloudinary_upload() {
        let app = Router::new().route(
            "/v1_1/demo/image/upload",
            post(|mut multipart: Multipart| async move {
                let mut fields = Vec::new();
                while let Some(field) = multipart.next_field().await.unwrap() {
                    let name = field.name().unwrap_or_default().to_string();
                    let data = field.bytes().await.unwrap();
                    fields.push((name, data.len()));
                }
                let has_preset = fields.iter().any(|(name, _)| name == "upload_preset");
                let has_file = fields.iter().any(|(name, len)| name == "file" && *len == 4);
                if has_preset && has_file {
                    Json(json!({"secure_url": "https://res.cloudinary.com/demo/image/upload/abc.png"}))
                } else {
                    Json(Value::Null)
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let store = CloudinaryStore::new(
            "demo".to_string(),
            "unsigned".to_string(),
            None,
            Some(format!("http://{}", addr)),
        );
        let url = store
            .store("me.png", "image/png", Bytes::from_static(b"\x89PNG"))
            .await
            .unwrap();
        assert_eq!(url, "https://res.cloudinary.com/demo/image/upload/abc.png");
    }

    #[test]
    fn test_cloudinary_requires_credentials() {
        let mut config = UnifiedConfig::default();
        config.images.backend = ImageBackend::Cloudinary;
        assert!(matches!(
            create_image_store(&config),
            Err(ImageStoreError::NotConfigured(_))
        ));
    }
}
