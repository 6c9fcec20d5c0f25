//! Inference Client
//!
//! Talks to the crop disease classification service. The service is given a
//! public image URL and answers with the predicted class label:
//!
//! ```text
//! GET {base_url}/predict?image_path=<url-encoded image url>
//! {"predicted_class": "Tomato_Leaf_Late_blight", "confidence": 0.93}
//! ```

use crate::config::InferenceConfig;
use crate::error::CollaboratorError;
use crate::metrics::{self, Timer};
use crate::retry::RetryExecutor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const SERVICE: &str = "inference";

type Result<T> = std::result::Result<T, CollaboratorError>;

/// What the classifier said about an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Raw class label, absent when the model produced nothing usable
    #[serde(default)]
    pub predicted_class: Option<String>,
    /// Passed through as reported: any JSON value, never clamped or parsed
    #[serde(default)]
    pub confidence: Option<Value>,
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn predict(&self, image_url: &str) -> Result<Prediction>;
}

/// HTTP client for the hosted model endpoint
#[derive(Clone)]
pub struct HttpInferenceClient {
    client: reqwest::Client,
    predict_url: String,
    retry: RetryExecutor,
}

impl HttpInferenceClient {
    pub fn new(config: &InferenceConfig, retry: RetryExecutor) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        Ok(Self {
            client,
            predict_url: format!("{}/predict", config.base_url.trim_end_matches('/')),
            retry,
        })
    }

    async fn predict_once(&self, image_url: &str) -> Result<Prediction> {
        let response = self
            .client
            .get(&self.predict_url)
            .query(&[("image_path", image_url)])
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

        response
            .json::<Prediction>()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse {
                service: SERVICE,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn predict(&self, image_url: &str) -> Result<Prediction> {
        let timer = Timer::new();
        let result = self
            .retry
            .execute(SERVICE, || self.predict_once(image_url))
            .await;
        timer.observe_duration_seconds(&metrics::COLLABORATOR_LATENCY.with_label_values(&[SERVICE]));

        if let Ok(prediction) = &result {
            debug!(
                "Model predicted {:?} (confidence {:?})",
                prediction.predicted_class, prediction.confidence
            );
        }
        result
    }
}
