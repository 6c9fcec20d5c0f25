//! Image Storage
//!
//! Uploaded leaf photos are pushed to Cloudinary so the inference service can
//! fetch them by URL. The image travels as a base64 data URI in a signed
//! upload request.

use crate::config::CloudinaryConfig;
use crate::error::CollaboratorError;
use crate::metrics::{self, Timer};
use crate::retry::RetryExecutor;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

const SERVICE: &str = "cloudinary";

type Result<T> = std::result::Result<T, CollaboratorError>;

/// A validated image as received from the client
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: Option<String>,
}

impl UploadedImage {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// Somewhere an image can be stored and later fetched by public URL
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, image: &UploadedImage) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Clone)]
pub struct CloudinaryStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
    retry: RetryExecutor,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig, retry: RetryExecutor) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/image/upload", self.config.api_base, self.config.cloud_name)
    }

    async fn upload_once(&self, data_uri: &str) -> Result<String> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("folder", self.config.folder.as_str()), ("timestamp", timestamp.as_str())],
            &self.config.api_secret,
        );

        let form = [
            ("file", data_uri),
            ("folder", self.config.folder.as_str()),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.config.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .client
            .post(self.upload_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let uploaded: UploadResponse =
            response
                .json()
                .await
                .map_err(|e| CollaboratorError::InvalidResponse {
                    service: SERVICE,
                    message: e.to_string(),
                })?;
        Ok(uploaded.secure_url)
    }
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    async fn upload(&self, image: &UploadedImage) -> Result<String> {
        let data_uri = image.data_uri();
        let data_uri = data_uri.as_str();
        let timer = Timer::new();
        let result = self
            .retry
            .execute(SERVICE, || self.upload_once(data_uri))
            .await;
        timer.observe_duration_seconds(&metrics::COLLABORATOR_LATENCY.with_label_values(&[SERVICE]));

        if let Ok(url) = &result {
            info!("Stored {} bytes ({}) at {}", image.bytes.len(), image.mime_type, url);
        }
        result
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, secret appended, SHA-256 hex digest.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri() {
        let image = UploadedImage {
            bytes: b"abc".to_vec(),
            mime_type: "image/png".to_string(),
            file_name: None,
        };
        assert_eq!(image.data_uri(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_signature_sorts_params() {
        let a = sign_params(&[("timestamp", "1700000000"), ("folder", "kisan_saathi")], "secret");
        let b = sign_params(&[("folder", "kisan_saathi"), ("timestamp", "1700000000")], "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut hasher = Sha256::new();
        hasher.update(b"folder=kisan_saathi&timestamp=1700000000secret");
        assert_eq!(a, hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let params = [("folder", "f"), ("timestamp", "1")];
        assert_ne!(sign_params(&params, "one"), sign_params(&params, "two"));
    }
}
