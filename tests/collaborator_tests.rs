//! Inference client and image store against local stand-in servers

use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use crop_disease_node::config::{CloudinaryConfig, InferenceConfig};
use crop_disease_node::error::CollaboratorError;
use crop_disease_node::inference::{HttpInferenceClient, InferenceClient};
use crop_disease_node::retry::{RetryExecutor, RetryStrategy};
use crop_disease_node::storage::{sign_params, CloudinaryStore, ImageStore, UploadedImage};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const IMAGE_URL: &str = "https://res.cloudinary.com/demo/image/upload/v1/kisan_saathi/leaf.jpg";
const SECRET: &str = "s3cret";

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn inference_client(base_url: String, retry: RetryStrategy) -> HttpInferenceClient {
    let config = InferenceConfig {
        base_url,
        timeout: Duration::from_secs(5),
    };
    HttpInferenceClient::new(&config, RetryExecutor::new(retry)).unwrap()
}

/// Answers 503 for the first `failures` calls, then a prediction
async fn flaky_predict(
    State((calls, failures)): State<(Arc<AtomicUsize>, usize)>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let call = calls.fetch_add(1, Ordering::SeqCst);
    if call < failures {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "detail": "warming up" })));
    }
    match params.get("image_path") {
        Some(path) if path == IMAGE_URL => (
            StatusCode::OK,
            Json(json!({ "predicted_class": "Tomato_Leaf_Late_blight", "confidence": 0.91 })),
        ),
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "detail": "image_path missing" }))),
    }
}

fn inference_app(calls: Arc<AtomicUsize>, failures: usize) -> Router {
    Router::new()
        .route("/predict", get(flaky_predict))
        .with_state((calls, failures))
}

#[tokio::test]
async fn test_predict_sends_image_path() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base = serve(inference_app(calls.clone(), 0)).await;
    let client = inference_client(base, RetryStrategy::None);

    let prediction = client.predict(IMAGE_URL).await.unwrap();

    assert_eq!(prediction.predicted_class.as_deref(), Some("Tomato_Leaf_Late_blight"));
    assert_eq!(prediction.confidence, Some(json!(0.91)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_predict_retries_unavailable_service() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base = serve(inference_app(calls.clone(), 2)).await;
    let client = inference_client(base, RetryStrategy::exponential(3, 5));

    let prediction = client.predict(IMAGE_URL).await.unwrap();

    assert!(prediction.predicted_class.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_predict_gives_up_on_client_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base = serve(inference_app(calls.clone(), 0)).await;
    let client = inference_client(base, RetryStrategy::exponential(3, 5));

    let err = client.predict("https://elsewhere.example/leaf.jpg").await.unwrap_err();

    assert!(matches!(err, CollaboratorError::Status { status: 400, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_predict_unreachable_service() {
    let client = inference_client("http://127.0.0.1:1".to_string(), RetryStrategy::None);
    let err = client.predict(IMAGE_URL).await.unwrap_err();
    assert!(err.is_recoverable());
}

async fn fake_upload(
    Path(cloud): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let folder = form.get("folder").cloned().unwrap_or_default();
    let timestamp = form.get("timestamp").cloned().unwrap_or_default();
    let expected = sign_params(&[("folder", folder.as_str()), ("timestamp", timestamp.as_str())], SECRET);

    let signed = form.get("signature") == Some(&expected)
        && form.get("signature_algorithm").map(String::as_str) == Some("sha256")
        && form.get("api_key").map(String::as_str) == Some("1234");
    let is_data_uri = form
        .get("file")
        .is_some_and(|f| f.starts_with("data:image/jpeg;base64,"));

    if cloud != "demo" || !signed || !is_data_uri {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": { "message": "Invalid Signature" } })));
    }

    (
        StatusCode::OK,
        Json(json!({
            "secure_url": format!("https://res.cloudinary.com/demo/image/upload/v1/{}/leaf.jpg", folder),
            "public_id": "leaf",
        })),
    )
}

fn cloudinary_config(api_base: String, api_secret: &str) -> CloudinaryConfig {
    CloudinaryConfig {
        cloud_name: "demo".to_string(),
        api_key: "1234".to_string(),
        api_secret: api_secret.to_string(),
        folder: "kisan_saathi".to_string(),
        api_base,
        timeout: Duration::from_secs(5),
    }
}

fn leaf_image() -> UploadedImage {
    UploadedImage {
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10],
        mime_type: "image/jpeg".to_string(),
        file_name: Some("leaf.jpg".to_string()),
    }
}

#[tokio::test]
async fn test_signed_upload_returns_secure_url() {
    let base = serve(Router::new().route("/v1_1/{cloud}/image/upload", post(fake_upload))).await;
    let store = CloudinaryStore::new(
        cloudinary_config(format!("{}/v1_1", base), SECRET),
        RetryExecutor::default(),
    )
    .unwrap();

    let url = store.upload(&leaf_image()).await.unwrap();
    assert_eq!(url, IMAGE_URL);
}

#[tokio::test]
async fn test_bad_credentials_are_not_retried() {
    let base = serve(Router::new().route("/v1_1/{cloud}/image/upload", post(fake_upload))).await;
    let store = CloudinaryStore::new(
        cloudinary_config(format!("{}/v1_1", base), "wrong"),
        RetryExecutor::new(RetryStrategy::exponential(3, 5)),
    )
    .unwrap();

    let err = store.upload(&leaf_image()).await.unwrap_err();
    assert!(matches!(err, CollaboratorError::Status { status: 401, .. }));
    assert!(!err.is_recoverable());
}
