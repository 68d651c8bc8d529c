//! Prometheus metrics for the engine.
//!
//! Counters live in a private registry; the host process decides how to
//! expose [`encode_metrics`] output.

use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Registry holding every engine metric.
static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Upload metrics
pub static UPLOADS_STORED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ibed_uploads_stored_total",
        "Total number of uploads that stored a new payload",
    )
    .expect("metric creation failed")
});

pub static UPLOADS_DEDUPLICATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ibed_uploads_deduplicated_total",
        "Total number of uploads answered by an existing record",
    )
    .expect("metric creation failed")
});

pub static BYTES_STORED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ibed_bytes_stored_total",
        "Total payload bytes written to the content store",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("ibed_upload_errors_total", "Total upload errors by error code"),
        &["code"],
    )
    .expect("metric creation failed")
});

// Read path
pub static VIEWS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ibed_views_total", "Total number of counted views")
        .expect("metric creation failed")
});

pub static DELETES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ibed_deletes_total", "Total number of deleted images")
        .expect("metric creation failed")
});

pub static SEARCHES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ibed_searches_total", "Total number of search queries")
        .expect("metric creation failed")
});

// Ranking refresh
pub static RANKING_REFRESHES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ibed_ranking_refreshes_total",
        "Total number of published ranking snapshots",
    )
    .expect("metric creation failed")
});

pub static RANKING_REFRESH_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ibed_ranking_refresh_failures_total",
        "Total number of failed ranking refresh ticks",
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the registry.
///
/// Idempotent; later calls are no-ops.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(UPLOADS_STORED.clone()),
            Box::new(UPLOADS_DEDUPLICATED.clone()),
            Box::new(BYTES_STORED.clone()),
            Box::new(UPLOAD_ERRORS.clone()),
            Box::new(VIEWS.clone()),
            Box::new(DELETES.clone()),
            Box::new(SEARCHES.clone()),
            Box::new(RANKING_REFRESHES.clone()),
            Box::new(RANKING_REFRESH_FAILURES.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric registration failed");
        }
    });
}

/// Render every registered metric in the text exposition format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Helper to record upload errors by code.
pub fn record_upload_error(code: &str) {
    UPLOAD_ERRORS.with_label_values(&[code]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent_and_encodes() {
        register_metrics();
        register_metrics();
        UPLOADS_STORED.inc();
        record_upload_error("unsupported_media");

        let text = encode_metrics().unwrap();
        assert!(text.contains("ibed_uploads_stored_total"));
        assert!(text.contains("ibed_upload_errors_total{code=\"unsupported_media\"}"));
    }
}
