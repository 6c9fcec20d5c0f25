use crate::normalizer::NoiseWords;
use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INFERENCE_URL: &str =
    "https://cropdiseasedetectionmodel-production.up.railway.app";
pub const DEFAULT_CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";
pub const DEFAULT_UPLOAD_FOLDER: &str = "kisan_saathi";
pub const DEFAULT_WARNING: &str = "⚠️ This is an AI-based early prediction. Do not rely completely. \
Consult local agriculture experts or KVK.";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub max_upload_bytes: usize,
    pub inference_config: InferenceConfig,
    pub cloudinary_config: CloudinaryConfig,
    pub catalog_config: CatalogConfig,
    pub retry_config: RetryConfig,
    pub detection_config: DetectionConfig,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    pub api_base: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub db_path: PathBuf,
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

/// Read-only settings of the detection pipeline, fixed at start-up
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub noise_words: NoiseWords,
    pub warning: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            noise_words: NoiseWords::default(),
            warning: DEFAULT_WARNING.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{} must be set", key));

        let api_host = var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let api_port = parse_or(var("API_PORT"), 8080);
        let max_upload_bytes = parse_or(var("MAX_UPLOAD_BYTES"), 10 * 1024 * 1024);

        let inference_config = InferenceConfig {
            base_url: var("INFERENCE_URL")
                .unwrap_or_else(|| DEFAULT_INFERENCE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_millis(parse_or(var("INFERENCE_TIMEOUT_MS"), 30_000)),
        };

        let cloudinary_config = CloudinaryConfig {
            cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            api_key: required("CLOUDINARY_API_KEY")?,
            api_secret: required("CLOUDINARY_API_SECRET")?,
            folder: var("CLOUDINARY_FOLDER").unwrap_or_else(|| DEFAULT_UPLOAD_FOLDER.to_string()),
            api_base: var("CLOUDINARY_API_BASE")
                .unwrap_or_else(|| DEFAULT_CLOUDINARY_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_millis(parse_or(var("CLOUDINARY_TIMEOUT_MS"), 30_000)),
        };

        let catalog_config = CatalogConfig {
            db_path: var("CATALOG_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/catalog")),
            seed_path: var("CATALOG_SEED_PATH").map(PathBuf::from),
        };

        let retry_config = RetryConfig {
            max_attempts: parse_or(var("RETRY_MAX_ATTEMPTS"), 3),
            base_delay_ms: parse_or(var("RETRY_BASE_DELAY_MS"), 200),
        };

        let noise_words = match var("NOISE_WORDS") {
            Some(list) => NoiseWords::from_csv(&list),
            None => NoiseWords::default(),
        };

        Ok(Self {
            api_host,
            api_port,
            max_upload_bytes,
            inference_config,
            cloudinary_config,
            catalog_config,
            retry_config,
            detection_config: DetectionConfig {
                noise_words,
                warning: var("DETECTION_WARNING").unwrap_or_else(|| DEFAULT_WARNING.to_string()),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
