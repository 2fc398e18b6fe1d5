//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Campaign runs (starts, completions, aborts)
//! - Call flow (dials, terminations, advances, skips)
//! - Activity logging (dispositions, write failures)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Campaign Metrics
// =============================================================================

/// Campaign runs by outcome.
pub static CAMPAIGNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dialer_campaigns_total", "Total campaign runs by outcome"),
        &["outcome"], // "started", "completed", "stopped", "aborted"
    )
    .unwrap()
});

/// Cursor advances by trigger.
pub static ADVANCES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dialer_advances_total", "Total queue advances by trigger"),
        &["trigger"], // "automatic", "manual", "confirm", "skip"
    )
    .unwrap()
});

/// Targets skipped without a connected call.
pub static TARGETS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dialer_targets_skipped_total", "Total targets skipped"),
        &["reason"], // "do_not_call", "dial_failed"
    )
    .unwrap()
});

// =============================================================================
// Call Metrics
// =============================================================================

/// Dial attempts by result.
pub static DIALS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dialer_dials_total", "Total dial attempts"),
        &["result"], // "issued", "failed", "line_unavailable"
    )
    .unwrap()
});

/// Calls ended by termination reason.
pub static CALLS_ENDED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dialer_calls_ended_total", "Total calls ended"),
        &["reason"], // "completed", "rejected", "failed", "cancelled"
    )
    .unwrap()
});

/// Talk time of answered calls in seconds.
pub static CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("dialer_call_duration_seconds", "Talk time of answered calls")
            .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Activity Metrics
// =============================================================================

/// Dispositions recorded by category.
pub static DISPOSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dialer_dispositions_total", "Total dispositions recorded"),
        &["category"],
    )
    .unwrap()
});

/// Activity records that could not be persisted.
pub static ACTIVITY_WRITE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dialer_activity_write_failures_total",
        "Total activity records lost to persistence failures",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Campaign
        Box::new(CAMPAIGNS.clone()),
        Box::new(ADVANCES.clone()),
        Box::new(TARGETS_SKIPPED.clone()),
        // Calls
        Box::new(DIALS.clone()),
        Box::new(CALLS_ENDED.clone()),
        Box::new(CALL_DURATION.clone()),
        // Activity
        Box::new(DISPOSITIONS.clone()),
        Box::new(ACTIVITY_WRITE_FAILURES.clone()),
    ]
}
