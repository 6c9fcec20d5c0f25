use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures of the catalog store itself
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Catalog record is corrupt for key {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Catalog seed could not be read: {0}")]
    Seed(String),

    #[error("Invalid catalog entry: {0}")]
    InvalidEntry(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Conditions returned by the label matcher
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),
}

impl From<CatalogError> for MatchError {
    fn from(err: CatalogError) -> Self {
        MatchError::CatalogUnavailable(err.to_string())
    }
}

/// Failures talking to an outside service (inference endpoint, image store)
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Request to {service} failed: {message}")]
    Transport { service: &'static str, message: String },

    #[error("{service} timed out")]
    Timeout { service: &'static str },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned an unreadable response: {message}")]
    InvalidResponse { service: &'static str, message: String },
}

impl CollaboratorError {
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CollaboratorError::Timeout { service }
        } else if err.is_decode() {
            CollaboratorError::InvalidResponse {
                service,
                message: err.to_string(),
            }
        } else {
            CollaboratorError::Transport {
                service,
                message: err.to_string(),
            }
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            CollaboratorError::Transport { .. } | CollaboratorError::Timeout { .. } => true,
            CollaboratorError::Status { status, .. } => *status >= 500 || *status == 429,
            CollaboratorError::InvalidResponse { .. } => false,
        }
    }
}

/// Everything that can end a detection request without a catalog verdict
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("No image uploaded")]
    NoImage,

    #[error("Unsupported image format")]
    UnsupportedImage,

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("Image exceeds the upload size limit")]
    ImageTooLarge,

    #[error("Image upload failed: {0}")]
    Upload(#[source] CollaboratorError),

    #[error("Inference request failed: {0}")]
    Inference(#[source] CollaboratorError),

    #[error("Detection failed")]
    NoPrediction,

    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),
}

impl From<MatchError> for DetectionError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::InvalidInput(msg) => DetectionError::InvalidLabel(msg),
            MatchError::CatalogUnavailable(msg) => DetectionError::CatalogUnavailable(msg),
        }
    }
}

impl DetectionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DetectionError::NoImage
            | DetectionError::UnsupportedImage
            | DetectionError::MalformedUpload(_)
            | DetectionError::NoPrediction
            | DetectionError::InvalidLabel(_) => StatusCode::BAD_REQUEST,
            DetectionError::ImageTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            DetectionError::Upload(_) | DetectionError::Inference(_) => StatusCode::BAD_GATEWAY,
            DetectionError::CatalogUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionError::NoImage => "no_image",
            DetectionError::UnsupportedImage => "unsupported_image",
            DetectionError::MalformedUpload(_) => "malformed_upload",
            DetectionError::ImageTooLarge => "image_too_large",
            DetectionError::Upload(_) => "upload_failed",
            DetectionError::Inference(_) => "inference_failed",
            DetectionError::NoPrediction => "no_prediction",
            DetectionError::InvalidLabel(_) => "invalid_label",
            DetectionError::CatalogUnavailable(_) => "catalog_unavailable",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            DetectionError::NoImage => "No image uploaded",
            DetectionError::UnsupportedImage => "Unsupported image format",
            DetectionError::MalformedUpload(_) => "Malformed upload",
            DetectionError::ImageTooLarge => "Image is too large",
            DetectionError::Upload(_) => "Image upload failed",
            DetectionError::Inference(_) => "Disease detection service failed",
            DetectionError::NoPrediction | DetectionError::InvalidLabel(_) => "Detection failed",
            DetectionError::CatalogUnavailable(_) => "Disease catalog is unavailable",
        }
    }
}

impl IntoResponse for DetectionError {
    fn into_response(self) -> Response {
        let body = match &self {
            DetectionError::NoImage
            | DetectionError::UnsupportedImage
            | DetectionError::ImageTooLarge
            | DetectionError::NoPrediction => {
                json!({ "success": false, "message": self.public_message() })
            }
            _ => json!({
                "success": false,
                "message": self.public_message(),
                "error": self.to_string(),
            }),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
