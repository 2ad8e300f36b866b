//! Prometheus metrics for the Darkroom server.
//!
//! This module provides:
//! - HTTP request metrics (count, latency)
//! - Cache metrics (hit/miss rates, tag invalidations)
//! - Watch lifecycle metrics (webhook events, renewals)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Cache metrics
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_ENTRIES: &str = "cache_entries";
    pub const CACHE_TAG_INVALIDATIONS_TOTAL: &str = "cache_tag_invalidations_total";
    pub const CACHE_TAG_EVICTIONS_TOTAL: &str = "cache_tag_evictions_total";

    // Watch lifecycle metrics
    pub const WEBHOOK_EVENTS_TOTAL: &str = "webhook_events_total";
    pub const WATCH_RENEWALS_TOTAL: &str = "watch_renewals_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// This should be called once at server startup.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Use install_recorder() for pull-based metrics (we serve /metrics ourselves)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let status_class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string(),
        "status_class" => status_class.to_string()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a cache hit.
pub fn record_cache_hit(tier: &str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier.to_string()).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Set the number of cache entries.
pub fn set_cache_entries(tier: &str, count: usize) {
    gauge!(names::CACHE_ENTRIES, "tier" => tier.to_string()).set(count as f64);
}

/// Record a tag invalidation and how many entries it evicted.
pub fn record_tag_invalidation(evicted: u64) {
    counter!(names::CACHE_TAG_INVALIDATIONS_TOTAL).increment(1);
    counter!(names::CACHE_TAG_EVICTIONS_TOTAL).increment(evicted);
}

/// Record an incoming webhook event by outcome
/// (`scheduled`, `sync`, `unknown_channel`, `unknown_state`,
/// `missing_headers`, `lookup_failed`).
pub fn record_webhook_event(outcome: &str) {
    counter!(names::WEBHOOK_EVENTS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

/// Record a watch renewal attempt.
pub fn record_watch_renewal(outcome: &str) {
    counter!(names::WATCH_RENEWALS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}
