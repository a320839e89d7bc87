//! Prometheus metrics for the Caden sync client.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Stream poll outcomes.
/// Labels: stream, outcome (updated/cached/rate_limited/failed/discarded)
pub static STREAM_FETCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "caden_stream_fetch_total",
        "Stream poll outcomes",
        &["stream", "outcome"]
    )
    .unwrap()
});

/// Current retry delay per stream.
pub static STREAM_BACKOFF_MS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "caden_stream_backoff_ms",
        "Current rate-limit retry delay in milliseconds",
        &["stream"]
    )
    .unwrap()
});

/// Remote fetch latency.
pub static STREAM_FETCH_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "caden_stream_fetch_latency_ms",
        "Remote fetch latency in milliseconds",
        &["stream"],
        vec![10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap()
});

/// Liquidation pipeline outcomes.
/// Labels: outcome (submitted/confirmed/failed)
pub static LIQUIDATION_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "caden_liquidation_total",
        "Liquidation instruction outcomes",
        &["outcome"]
    )
    .unwrap()
});

/// Last evaluated health ratio per account.
pub static ACCOUNT_HEALTH_BPS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "caden_account_health_bps",
        "Last evaluated health ratio in basis points",
        &["account"]
    )
    .unwrap()
});

/// Metric recording facade.
pub struct Metrics;

impl Metrics {
    pub fn stream_outcome(stream: &str, outcome: &str) {
        STREAM_FETCH_TOTAL
            .with_label_values(&[stream, outcome])
            .inc();
    }

    pub fn stream_backoff(stream: &str, delay_ms: f64) {
        STREAM_BACKOFF_MS.with_label_values(&[stream]).set(delay_ms);
    }

    pub fn stream_fetch_latency(stream: &str, latency_ms: f64) {
        STREAM_FETCH_LATENCY_MS
            .with_label_values(&[stream])
            .observe(latency_ms);
    }

    pub fn liquidation(outcome: &str) {
        LIQUIDATION_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn account_health(account: &str, health_bps: f64) {
        ACCOUNT_HEALTH_BPS
            .with_label_values(&[account])
            .set(health_bps);
    }

    /// Drop the health gauge of an account that is no longer watched.
    pub fn forget_account(account: &str) {
        let _ = ACCOUNT_HEALTH_BPS.remove_label_values(&[account]);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_metrics() {
        Metrics::stream_outcome("market", "updated");
        Metrics::liquidation("submitted");
        Metrics::account_health("Acct1", 9500.0);

        let text = Metrics::render().unwrap();
        assert!(text.contains("caden_stream_fetch_total"));
        assert!(text.contains("caden_liquidation_total"));
        assert!(text.contains("caden_account_health_bps"));
    }

    #[test]
    fn test_forget_account() {
        Metrics::account_health("Gone1", 100.0);
        Metrics::forget_account("Gone1");
        Metrics::forget_account("NeverSeen");

        let text = Metrics::render().unwrap();
        assert!(!text.contains("Gone1"));
    }
}
