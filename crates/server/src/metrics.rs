//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the snowsky server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Job and worker pool status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use snowsky_core::job::{JobFilter, JobStatus};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "snowsky_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snowsky_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "snowsky_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "snowsky_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "snowsky_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snowsky_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket clients dropped for falling behind.
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "snowsky_ws_lag_events_total",
        "WebSocket clients dropped after falling behind",
    )
    .unwrap()
});

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs by current status (collected dynamically).
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("snowsky_jobs_by_status", "Current job count by status"),
        &["status"],
    )
    .unwrap()
});

/// Worker slots started.
pub static POOL_SLOTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("snowsky_pool_slots", "Worker slots currently started").unwrap()
});

/// Jobs waiting in the queue.
pub static POOL_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("snowsky_pool_queued_jobs", "Jobs waiting for a worker slot").unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Jobs and pool
    registry
        .register(Box::new(JOBS_BY_STATUS.clone()))
        .unwrap();
    registry.register(Box::new(POOL_SLOTS.clone())).unwrap();
    registry.register(Box::new(POOL_QUEUED.clone())).unwrap();

    // Core metrics (jobs, post-processing, library)
    for metric in snowsky_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the pool and job registry.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.pool().status();
    POOL_SLOTS.set(status.slots as i64);
    POOL_QUEUED.set(status.queued_jobs as i64);

    let store = state.manager().store();
    for job_status in [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Done,
        JobStatus::Failed,
    ] {
        let filter = JobFilter::new().with_status(job_status);
        if let Ok(count) = store.count(&filter) {
            JOBS_BY_STATUS
                .with_label_values(&[job_status.as_str()])
                .set(count as i64);
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    static UUID: Lazy<Option<regex_lite::Regex>> = Lazy::new(|| {
        regex_lite::Regex::new(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        )
        .ok()
    });
    static NUMERIC: Lazy<Option<regex_lite::Regex>> =
        Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").ok());

    let mut result = path.to_string();
    if let Some(re) = UUID.as_ref() {
        result = re.replace_all(&result, "{id}").into_owned();
    }
    if let Some(re) = NUMERIC.as_ref() {
        result = re.replace_all(&result, "/{id}$1").into_owned();
    }
    // Cover paths are user content, not routes.
    if result.starts_with("/covers/") {
        result = "/covers/{path}".to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/download/jobs/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/download/jobs/{id}");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/download/jobs/12345";
        assert_eq!(normalize_path(path), "/api/v1/download/jobs/{id}");
    }

    #[test]
    fn test_normalize_path_covers() {
        let path = "/covers/Band/Album/cover.jpg";
        assert_eq!(normalize_path(path), "/covers/{path}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        // Access metrics to ensure they're initialized
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("snowsky_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Prometheus only outputs vec metrics that have a label set
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        WS_CONNECTIONS_ACTIVE.set(0);
        WS_CONNECTIONS_TOTAL.inc();
        JOBS_BY_STATUS.with_label_values(&["queued"]).set(0);
        POOL_SLOTS.set(0);
        snowsky_core::metrics::JOBS_SUBMITTED
            .with_label_values(&["single"])
            .inc_by(0);

        let output = encode_metrics();

        assert!(output.contains("snowsky_http_request_duration_seconds"));
        assert!(output.contains("snowsky_http_requests_in_flight"));
        assert!(output.contains("snowsky_ws_connections_active"));
        assert!(output.contains("snowsky_ws_connections_total"));
        assert!(output.contains("snowsky_jobs_by_status"));
        assert!(output.contains("snowsky_pool_slots"));
        assert!(output.contains("snowsky_jobs_submitted_total"));
        assert!(output.contains("snowsky_library_scans_total"));
    }
}
