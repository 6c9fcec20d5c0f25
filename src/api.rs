use crate::catalog::{CatalogListing, CatalogLookup};
use crate::detection::{DetectionReport, Detector, Identification};
use crate::error::DetectionError;
use crate::metrics;
use crate::storage::UploadedImage;
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const NOT_FOUND_MESSAGE: &str = "Disease not found in database.";

#[derive(Clone)]
pub struct AppState {
    pub detector: Detector,
    pub listing: Arc<dyn CatalogListing>,
}

pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/detect", post(detect_handler))
        .route("/api/diseases", get(list_diseases_handler))
        .route("/api/diseases/{name}", get(get_disease_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Prometheus metrics endpoint
async fn metrics_handler() -> String {
    metrics::export_metrics()
}

async fn detect_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, DetectionError> {
    let multipart = multipart.map_err(|_| DetectionError::NoImage)?;
    let image = read_image(multipart).await?;
    let report = state.detector.detect(image).await?;
    Ok(report_response(report, &state.detector.config().warning))
}

/// Pull the `image` file field out of a multipart body
async fn read_image(mut multipart: Multipart) -> Result<UploadedImage, DetectionError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some("image") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let declared = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(upload_error)?;
        if bytes.is_empty() {
            return Err(DetectionError::NoImage);
        }

        let mime_type = resolve_mime_type(declared.as_deref(), &bytes)?;
        return Ok(UploadedImage {
            bytes: bytes.to_vec(),
            mime_type,
            file_name,
        });
    }

    Err(DetectionError::NoImage)
}

fn upload_error(err: axum::extract::multipart::MultipartError) -> DetectionError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DetectionError::ImageTooLarge
    } else {
        DetectionError::MalformedUpload(err.body_text())
    }
}

/// Declared `image/*` types are trusted; anything else is sniffed from the bytes
pub fn resolve_mime_type(declared: Option<&str>, bytes: &[u8]) -> Result<String, DetectionError> {
    if let Some(declared) = declared {
        if declared.starts_with("image/") {
            return Ok(declared.to_string());
        }
    }

    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .map_err(|_| DetectionError::UnsupportedImage)
}

fn report_response(report: DetectionReport, warning: &str) -> Response {
    match report.identification {
        Identification::Matched {
            detected,
            entry,
            matched_by,
        } => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "imageUrl": report.image_url,
                "detected": detected,
                "diseaseInfo": entry,
                "matchedBy": matched_by,
                "warning": warning,
            })),
        )
            .into_response(),
        Identification::NotMatched { detected } => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": NOT_FOUND_MESSAGE,
                "detected": detected,
            })),
        )
            .into_response(),
    }
}

async fn list_diseases_handler(
    State(state): State<AppState>,
) -> Result<Response, DetectionError> {
    let diseases = state
        .listing
        .entries()
        .map_err(|e| DetectionError::CatalogUnavailable(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "count": diseases.len(),
        "diseases": diseases,
    }))
    .into_response())
}

async fn get_disease_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, DetectionError> {
    let entry = state
        .detector
        .catalog()
        .find_by_name_case_insensitive_exact(&name)
        .map_err(|e| DetectionError::CatalogUnavailable(e.to_string()))?;

    Ok(match entry {
        Some(entry) => Json(json!({ "success": true, "diseaseInfo": entry })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": NOT_FOUND_MESSAGE })),
        )
            .into_response(),
    })
}
