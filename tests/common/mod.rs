#![allow(dead_code)]

use async_trait::async_trait;
use crop_disease_node::catalog::{CatalogEntry, CatalogListing, CatalogLookup, InMemoryCatalog};
use crop_disease_node::config::DetectionConfig;
use crop_disease_node::detection::Detector;
use crop_disease_node::error::{CatalogError, CollaboratorError};
use crop_disease_node::inference::{InferenceClient, Prediction};
use crop_disease_node::storage::{ImageStore, UploadedImage};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const IMAGE_URL: &str = "https://res.cloudinary.com/demo/image/upload/kisan_saathi/leaf.jpg";

/// Image store that hands back a fixed URL, or fails with the given status
pub struct StubStore {
    pub status: Option<u16>,
    pub uploads: AtomicUsize,
}

impl StubStore {
    pub fn ok() -> Self {
        Self { status: None, uploads: AtomicUsize::new(0) }
    }

    pub fn failing(status: u16) -> Self {
        Self { status: Some(status), uploads: AtomicUsize::new(0) }
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageStore for StubStore {
    async fn upload(&self, _image: &UploadedImage) -> Result<String, CollaboratorError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        match self.status {
            None => Ok(IMAGE_URL.to_string()),
            Some(status) => Err(CollaboratorError::Status {
                service: "cloudinary",
                status,
                body: "upload rejected".to_string(),
            }),
        }
    }
}

/// Classifier that always answers with the same prediction
pub struct StubInference {
    pub result: Result<Prediction, u16>,
    pub requested: Mutex<Vec<String>>,
}

impl StubInference {
    pub fn predicting(label: &str, confidence: Option<f64>) -> Self {
        Self::reporting(label, confidence.map(Value::from))
    }

    /// Confidence exactly as the classifier sent it
    pub fn reporting(label: &str, confidence: Option<Value>) -> Self {
        Self {
            result: Ok(Prediction {
                predicted_class: Some(label.to_string()),
                confidence,
            }),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self {
            result: Ok(Prediction { predicted_class: None, confidence: None }),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self { result: Err(status), requested: Mutex::new(Vec::new()) }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for StubInference {
    async fn predict(&self, image_url: &str) -> Result<Prediction, CollaboratorError> {
        self.requested.lock().unwrap().push(image_url.to_string());
        match &self.result {
            Ok(prediction) => Ok(prediction.clone()),
            Err(status) => Err(CollaboratorError::Status {
                service: "inference",
                status: *status,
                body: "model crashed".to_string(),
            }),
        }
    }
}

/// Catalog whose backing store is gone
pub struct BrokenCatalog;

impl CatalogLookup for BrokenCatalog {
    fn find_by_name_case_insensitive_exact(
        &self,
        _name: &str,
    ) -> Result<Option<CatalogEntry>, CatalogError> {
        Err(CatalogError::Unavailable("database connection refused".to_string()))
    }
}

impl CatalogListing for BrokenCatalog {
    fn entries(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        Err(CatalogError::Unavailable("database connection refused".to_string()))
    }
}

pub fn late_blight() -> CatalogEntry {
    CatalogEntry::new("Late Blight")
        .with_detail("cropName", "Tomato")
        .with_detail("symptoms", "Dark, water-soaked lesions on leaves and stems")
        .with_detail("treatment", "Apply copper-based fungicide; remove infected plants")
}

pub fn sample_catalog() -> Arc<InMemoryCatalog> {
    Arc::new(
        vec![
            late_blight(),
            CatalogEntry::new("Apple Scab").with_detail("cropName", "Apple"),
            CatalogEntry::new("Potato___healthy").with_detail("cropName", "Potato"),
        ]
        .into_iter()
        .collect(),
    )
}

pub fn detector(
    catalog: Arc<dyn CatalogLookup>,
    store: Arc<StubStore>,
    inference: Arc<StubInference>,
) -> Detector {
    Detector::new(DetectionConfig::default(), catalog, store, inference)
}

pub fn jpeg_image() -> UploadedImage {
    UploadedImage {
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'],
        mime_type: "image/jpeg".to_string(),
        file_name: Some("leaf.jpg".to_string()),
    }
}
