use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Once;
use std::time::Instant;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Detection metrics
    pub static ref DETECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("detections_total", "Total detection requests by outcome"),
        &["outcome"]
    ).unwrap();

    pub static ref MATCHES_BY_STRATEGY: IntCounterVec = IntCounterVec::new(
        Opts::new("catalog_matches_total", "Catalog matches by winning strategy"),
        &["strategy"]
    ).unwrap();

    pub static ref EMPTY_NORMALIZED_NAMES: IntCounter = IntCounter::new(
        "empty_normalized_names_total",
        "Labels that normalized to an empty name"
    ).unwrap();

    pub static ref DETECTION_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "detection_duration_seconds",
            "End-to-end detection latency in seconds"
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).unwrap();

    // Catalog metrics
    pub static ref CATALOG_FAILURES: IntCounter = IntCounter::new(
        "catalog_failures_total",
        "Catalog lookups that failed"
    ).unwrap();

    pub static ref CATALOG_ENTRIES: IntGauge = IntGauge::new(
        "catalog_entries",
        "Number of entries in the disease catalog"
    ).unwrap();

    // Collaborator metrics
    pub static ref COLLABORATOR_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "collaborator_duration_seconds",
            "Latency of calls to outside services in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service"]
    ).unwrap();

    pub static ref COLLABORATOR_RETRIES: IntCounterVec = IntCounterVec::new(
        Opts::new("collaborator_retries_total", "Retried calls to outside services"),
        &["service"]
    ).unwrap();
}

static INIT: Once = Once::new();

/// Initialize metrics registry. Safe to call more than once.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY.register(Box::new(DETECTIONS.clone())).unwrap();
        REGISTRY.register(Box::new(MATCHES_BY_STRATEGY.clone())).unwrap();
        REGISTRY.register(Box::new(EMPTY_NORMALIZED_NAMES.clone())).unwrap();
        REGISTRY.register(Box::new(DETECTION_LATENCY.clone())).unwrap();

        REGISTRY.register(Box::new(CATALOG_FAILURES.clone())).unwrap();
        REGISTRY.register(Box::new(CATALOG_ENTRIES.clone())).unwrap();

        REGISTRY.register(Box::new(COLLABORATOR_LATENCY.clone())).unwrap();
        REGISTRY.register(Box::new(COLLABORATOR_RETRIES.clone())).unwrap();

        tracing::info!("Metrics registry initialized with {} collectors", REGISTRY.gather().len());
    });
}

/// Helper struct for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration_seconds(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Export metrics in Prometheus format
pub fn export_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
