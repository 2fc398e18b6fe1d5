//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the dialer server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Campaign progress gauges (collected from the controller on scrape)
//!
//! Campaign engine counters live in `dialer_core::metrics` and are registered here.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use dialer_core::CampaignStatus;

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
            "dialer_http_request_duration_seconds",
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
        Opts::new("dialer_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dialer_http_requests_in_flight",
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
        "dialer_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dialer_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dialer_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dialer_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Campaign Metrics (collected dynamically)
// =============================================================================

/// Campaign running state (1 = running, 0 otherwise).
pub static CAMPAIGN_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dialer_campaign_running",
        "Whether a campaign is running (1) or not (0)",
    )
    .unwrap()
});

/// Queue cursor of the current run.
pub static CAMPAIGN_CURSOR: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("dialer_campaign_cursor", "Queue position of the engaged target").unwrap()
});

/// Queue length of the current run.
pub static CAMPAIGN_LENGTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("dialer_campaign_length", "Number of targets in the current queue").unwrap()
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

    // Campaign
    registry
        .register(Box::new(CAMPAIGN_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(CAMPAIGN_CURSOR.clone()))
        .unwrap();
    registry
        .register(Box::new(CAMPAIGN_LENGTH.clone()))
        .unwrap();

    // Core metrics (dials, calls, dispositions, advances)
    for metric in dialer_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update the campaign gauges
/// with the controller's latest published state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let campaign = state.controller().status();
    CAMPAIGN_RUNNING.set(if campaign.status == CampaignStatus::Running {
        1
    } else {
        0
    });
    CAMPAIGN_CURSOR.set(campaign.cursor as i64);
    CAMPAIGN_LENGTH.set(campaign.length as i64);
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/campaigns/550e8400-e29b-41d4-a716-446655440000/activity";
        assert_eq!(normalize_path(path), "/api/v1/campaigns/{id}/activity");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/targets/12345";
        assert_eq!(normalize_path(path), "/api/v1/targets/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/campaign/status";
        assert_eq!(normalize_path(path), "/api/v1/campaign/status");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("dialer_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        // Prometheus only outputs labelled metrics that have been touched
        dialer_core::metrics::DIALS
            .with_label_values(&["issued"])
            .inc_by(0);
        CAMPAIGN_RUNNING.set(0);
        WS_CONNECTIONS_ACTIVE.set(0);

        let output = encode_metrics();

        assert!(output.contains("dialer_campaign_running"));
        assert!(output.contains("dialer_ws_connections_active"));
        assert!(output.contains("dialer_dials_total"));
        assert!(output.contains("dialer_activity_write_failures_total"));
    }
}
