pub mod api;
pub mod catalog;
pub mod config;
pub mod detection;
pub mod error;
pub mod inference;
pub mod matcher;
pub mod metrics;
pub mod normalizer;
pub mod retry;
pub mod storage;

// Re-export commonly used types for easier testing
pub use crate::catalog::{CatalogEntry, CatalogListing, CatalogLookup, InMemoryCatalog, SledCatalog};
pub use crate::detection::{DetectedLabel, DetectionReport, Detector, Identification};
pub use crate::error::{CatalogError, CollaboratorError, DetectionError, MatchError};
pub use crate::matcher::{match_label, MatchResult, MatchStrategy};
pub use crate::normalizer::{normalize, NoiseWords};
