//! Image handling: background removal, hosting, and fetching remote images
//! for bulk imports.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::auth_token::now_secs;
use crate::config::{ImageConfig, Secret};
use crate::error::{Result, WardrobeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ImageData {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("image service is not configured")]
    NotConfigured,
}

#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove_background(&self, image: &ImageData) -> std::result::Result<ImageData, ImageError>;
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Returns the public (https) URL of the stored image.
    async fn upload(&self, image: &ImageData) -> std::result::Result<String, ImageError>;
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<ImageData, ImageError>;
}

/// PhotoRoom segmentation API. Without an API key the image is passed
/// through untouched.
#[derive(Clone)]
pub struct PhotoRoomClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Secret,
}

impl PhotoRoomClient {
    pub fn new(http: reqwest::Client, config: &ImageConfig) -> Self {
        Self {
            http,
            endpoint: config.photoroom_endpoint.clone(),
            api_key: config.photoroom_api_key.clone(),
        }
    }
}

#[async_trait]
impl BackgroundRemover for PhotoRoomClient {
    async fn remove_background(&self, image: &ImageData) -> std::result::Result<ImageData, ImageError> {
        if self.api_key.is_empty() {
            log::debug!("PhotoRoom API key not configured, keeping original image");
            return Ok(image.clone());
        }

        let part = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name("image")
            .mime_str(&image.content_type)?;
        let form = reqwest::multipart::Form::new().part("image_file", part);

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.expose())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(ImageData::new(bytes.to_vec(), "image/png"))
    }
}

/// Signed uploads to Cloudinary's `auto/upload` endpoint.
#[derive(Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    cloud_name: String,
    api_key: Secret,
    api_secret: Secret,
    folder: String,
}

#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: Option<String>,
}

impl CloudinaryClient {
    pub fn new(http: reqwest::Client, config: &ImageConfig) -> Self {
        Self {
            http,
            cloud_name: config.cloudinary_cloud_name.clone(),
            api_key: config.cloudinary_api_key.clone(),
            api_secret: config.cloudinary_api_secret.clone(),
            folder: config.folder.clone(),
        }
    }

    fn is_configured(&self) -> bool {
        !self.cloud_name.trim().is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/auto/upload",
            self.cloud_name
        )
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, with the API secret appended.
pub fn cloudinary_signature(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(&self, image: &ImageData) -> std::result::Result<String, ImageError> {
        if !self.is_configured() {
            return Err(ImageError::NotConfigured);
        }

        let timestamp = now_secs().to_string();
        let signature = cloudinary_signature(
            &[("folder", self.folder.as_str()), ("timestamp", timestamp.as_str())],
            self.api_secret.expose(),
        );

        let file = image.data_uri();
        let params = [
            ("file", file.as_str()),
            ("api_key", self.api_key.expose()),
            ("timestamp", timestamp.as_str()),
            ("folder", self.folder.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self.http.post(self.upload_url()).form(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: CloudinaryUploadResponse = response.json().await?;
        body.secure_url
            .ok_or_else(|| ImageError::InvalidResponse("missing secure_url".to_string()))
    }
}

#[derive(Clone)]
pub struct HttpImageFetcher {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpImageFetcher {
    pub fn new(http: reqwest::Client, config: &ImageConfig) -> Self {
        Self {
            http,
            timeout: Duration::from_secs(config.fetch_timeout_secs),
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<ImageData, ImageError> {
        let response = self.http.get(url).timeout(self.timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status {
                status: status.as_u16(),
                body: format!("Failed to fetch image from URL: {}", url),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await?;
        Ok(ImageData::new(bytes.to_vec(), content_type))
    }
}

/// Background removal followed by upload, shared by the single-item and
/// bulk handlers.
#[derive(Clone)]
pub struct ImagePipeline {
    remover: Arc<dyn BackgroundRemover>,
    host: Arc<dyn ImageHost>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl ImagePipeline {
    pub fn new(
        remover: Arc<dyn BackgroundRemover>,
        host: Arc<dyn ImageHost>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        Self {
            remover,
            host,
            fetcher,
        }
    }

    pub fn from_config(config: &ImageConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| WardrobeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::new(
            Arc::new(PhotoRoomClient::new(http.clone(), config)),
            Arc::new(CloudinaryClient::new(http.clone(), config)),
            Arc::new(HttpImageFetcher::new(http, config)),
        ))
    }

    /// Removes the background (keeping the original when that fails) and
    /// uploads the result.
    pub async fn store(&self, image: ImageData) -> Result<String> {
        let processed = match self.remover.remove_background(&image).await {
            Ok(processed) => processed,
            Err(err) => {
                log::warn!("Background removal failed, using original image: {}", err);
                image
            }
        };

        self.host.upload(&processed).await.map_err(|err| {
            log::error!("Image upload failed: {}", err);
            WardrobeError::upstream("image host", err)
        })
    }

    pub async fn import_remote(&self, url: &str) -> Result<String> {
        let image = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|err| WardrobeError::upstream("image fetch", err))?;
        self.store(image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FailingRemover;

    #[async_trait]
    impl BackgroundRemover for FailingRemover {
        async fn remove_background(
            &self,
            _image: &ImageData,
        ) -> std::result::Result<ImageData, ImageError> {
            Err(ImageError::Status {
                status: 402,
                body: "quota".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        uploads: Mutex<Vec<ImageData>>,
    }

    #[async_trait]
    impl ImageHost for RecordingHost {
        async fn upload(&self, image: &ImageData) -> std::result::Result<String, ImageError> {
            let mut uploads = self.uploads.lock().unwrap();
            uploads.push(image.clone());
            Ok(format!("https://cdn.example/{}.png", uploads.len()))
        }
    }

    struct UnusedFetcher;

    #[async_trait]
    impl ImageFetcher for UnusedFetcher {
        async fn fetch(&self, _url: &str) -> std::result::Result<ImageData, ImageError> {
            Err(ImageError::NotConfigured)
        }
    }

    #[actix_web::test]
    async fn falls_back_to_original_when_removal_fails() {
        let host = Arc::new(RecordingHost::default());
        let pipeline = ImagePipeline::new(Arc::new(FailingRemover), host.clone(), Arc::new(UnusedFetcher));

        let original = ImageData::new(vec![1, 2, 3], "image/jpeg");
        let url = pipeline.store(original.clone()).await.unwrap();

        assert_eq!(url, "https://cdn.example/1.png");
        assert_eq!(host.uploads.lock().unwrap()[0], original);
    }

    #[actix_web::test]
    async fn fetch_failure_is_upstream_error() {
        let pipeline = ImagePipeline::new(
            Arc::new(FailingRemover),
            Arc::new(RecordingHost::default()),
            Arc::new(UnusedFetcher),
        );
        let result = pipeline.import_remote("https://unreachable.example/a.png").await;
        assert!(matches!(result, Err(WardrobeError::Upstream { service: "image fetch", .. })));
    }

    #[test]
    fn signature_sorts_parameters() {
        let a = cloudinary_signature(&[("timestamp", "1"), ("folder", "wardrobe")], "secret");
        let b = cloudinary_signature(&[("folder", "wardrobe"), ("timestamp", "1")], "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut hasher = Sha256::new();
        hasher.update(b"folder=wardrobe&timestamp=1secret");
        assert_eq!(a, hex::encode(hasher.finalize()));
    }

    #[test]
    fn data_uri_encoding() {
        let image = ImageData::new(b"abc".to_vec(), "image/png");
        assert_eq!(image.data_uri(), "data:image/png;base64,YWJj");
    }
}
