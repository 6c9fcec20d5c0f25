//! Detection Orchestrator
//!
//! Runs one detection request end to end:
//! upload image -> ask the classifier -> normalize the label -> match the catalog.
//!
//! The normalizer and matcher stay free of I/O and logging; everything that
//! talks to the outside world or records what happened lives here.

use crate::catalog::{CatalogEntry, CatalogLookup};
use crate::config::DetectionConfig;
use crate::error::{DetectionError, MatchError};
use crate::inference::InferenceClient;
use crate::matcher::{match_label, MatchResult, MatchStrategy};
use crate::metrics::{self, Timer};
use crate::normalizer::normalize;
use crate::storage::{ImageStore, UploadedImage};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What the classifier reported, echoed back to the client unchanged
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedLabel {
    pub predicted_class: String,
    pub normalized_name: String,
    pub confidence: Option<Value>,
}

/// Outcome of label identification against the catalog
#[derive(Debug, Clone, PartialEq)]
pub enum Identification {
    Matched {
        detected: DetectedLabel,
        entry: CatalogEntry,
        matched_by: MatchStrategy,
    },
    NotMatched {
        detected: DetectedLabel,
    },
}

impl Identification {
    pub fn detected(&self) -> &DetectedLabel {
        match self {
            Identification::Matched { detected, .. } | Identification::NotMatched { detected } => {
                detected
            }
        }
    }
}

/// Full result of a detection request that reached the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub image_url: String,
    pub identification: Identification,
}

/// Shared, read-only pipeline: built once at start-up and cloned per request
#[derive(Clone)]
pub struct Detector {
    config: Arc<DetectionConfig>,
    catalog: Arc<dyn CatalogLookup>,
    store: Arc<dyn ImageStore>,
    inference: Arc<dyn InferenceClient>,
}

impl Detector {
    pub fn new(
        config: DetectionConfig,
        catalog: Arc<dyn CatalogLookup>,
        store: Arc<dyn ImageStore>,
        inference: Arc<dyn InferenceClient>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            catalog,
            store,
            inference,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn CatalogLookup {
        self.catalog.as_ref()
    }

    /// Normalize a raw label and resolve it against the catalog
    pub fn identify(
        &self,
        predicted_class: &str,
        confidence: Option<Value>,
    ) -> Result<Identification, MatchError> {
        let normalized_name = normalize(predicted_class, &self.config.noise_words);

        let result = match_label(predicted_class, &normalized_name, self.catalog.as_ref());
        match &result {
            // only labels that reached the raw probe
            Ok(_) if normalized_name.is_empty() => metrics::EMPTY_NORMALIZED_NAMES.inc(),
            Err(MatchError::CatalogUnavailable(_)) => metrics::CATALOG_FAILURES.inc(),
            _ => {}
        }

        let detected = DetectedLabel {
            predicted_class: predicted_class.to_string(),
            normalized_name,
            confidence,
        };

        Ok(match result? {
            MatchResult::Matched { entry, matched_by } => {
                metrics::MATCHES_BY_STRATEGY
                    .with_label_values(&[matched_by.as_str()])
                    .inc();
                Identification::Matched {
                    detected,
                    entry,
                    matched_by,
                }
            }
            MatchResult::NotMatched => Identification::NotMatched { detected },
        })
    }

    /// Run the whole pipeline for one uploaded image
    pub async fn detect(&self, image: UploadedImage) -> Result<DetectionReport, DetectionError> {
        let timer = Timer::new();
        let result = self.run(image).await;
        timer.observe_duration_seconds(&metrics::DETECTION_LATENCY);

        let outcome = match &result {
            Ok(report) => match report.identification {
                Identification::Matched { .. } => "matched",
                Identification::NotMatched { .. } => "not_matched",
            },
            Err(e) => e.kind(),
        };
        metrics::DETECTIONS.with_label_values(&[outcome]).inc();
        result
    }

    async fn run(&self, image: UploadedImage) -> Result<DetectionReport, DetectionError> {
        let image_url = self
            .store
            .upload(&image)
            .await
            .map_err(DetectionError::Upload)?;

        let prediction = self
            .inference
            .predict(&image_url)
            .await
            .map_err(DetectionError::Inference)?;

        let predicted_class = match prediction.predicted_class {
            Some(label) if !label.trim().is_empty() => label,
            _ => {
                warn!("Model returned no class for {}", image_url);
                return Err(DetectionError::NoPrediction);
            }
        };

        let identification = match self.identify(&predicted_class, prediction.confidence) {
            Ok(identification) => identification,
            Err(e) => {
                error!("Catalog match failed for {:?}: {}", predicted_class, e);
                return Err(e.into());
            }
        };

        match &identification {
            Identification::Matched {
                detected,
                entry,
                matched_by,
            } => info!(
                "Detected {:?} -> {:?}, catalog entry {:?} via {}",
                detected.predicted_class, detected.normalized_name, entry.disease_name, matched_by
            ),
            Identification::NotMatched { detected } => info!(
                "Detected {:?} -> {:?}, no catalog entry",
                detected.predicted_class, detected.normalized_name
            ),
        }

        Ok(DetectionReport {
            image_url,
            identification,
        })
    }
}
