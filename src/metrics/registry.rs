//! Global metrics registry
//!
//! Defines all Prometheus metrics used in the application.

use once_cell::sync::Lazy;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use tracing::error;

/// Global metrics instance
pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Application metrics container
pub struct Metrics {
    /// Internal Prometheus registry
    registry: Registry,

    // ===== Redirect metrics =====
    /// Total number of `/out` responses by status code
    pub redirects_total: CounterVec,
    /// Redirects served by a fallback tier (raw, home)
    pub redirect_fallbacks_total: CounterVec,

    // ===== Click metrics =====
    /// Clicks accepted by the sink, by affiliate source
    pub affiliate_clicks_total: CounterVec,
    /// Click records lost to sink errors or panics
    pub click_log_failures_total: Counter,

    // ===== System metrics =====
    /// Server uptime in seconds
    pub uptime_seconds: Gauge,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let redirects_total = CounterVec::new(
            Opts::new(
                "outlinker_redirects_total",
                "Total number of /out responses by status",
            ),
            &["status"],
        )
        .expect("Failed to create redirects_total metric");

        let redirect_fallbacks_total = CounterVec::new(
            Opts::new(
                "outlinker_redirect_fallbacks_total",
                "Redirects served by a fallback tier",
            ),
            &["tier"],
        )
        .expect("Failed to create redirect_fallbacks_total metric");

        let affiliate_clicks_total = CounterVec::new(
            Opts::new(
                "outlinker_affiliate_clicks_total",
                "Logged affiliate clicks by source",
            ),
            &["source"],
        )
        .expect("Failed to create affiliate_clicks_total metric");

        let click_log_failures_total = Counter::new(
            "outlinker_click_log_failures_total",
            "Click records that could not be logged",
        )
        .expect("Failed to create click_log_failures_total metric");

        let uptime_seconds = Gauge::new("outlinker_uptime_seconds", "Server uptime in seconds")
            .expect("Failed to create uptime_seconds metric");

        // Register all metrics
        registry
            .register(Box::new(redirects_total.clone()))
            .expect("Failed to register redirects_total");
        registry
            .register(Box::new(redirect_fallbacks_total.clone()))
            .expect("Failed to register redirect_fallbacks_total");
        registry
            .register(Box::new(affiliate_clicks_total.clone()))
            .expect("Failed to register affiliate_clicks_total");
        registry
            .register(Box::new(click_log_failures_total.clone()))
            .expect("Failed to register click_log_failures_total");
        registry
            .register(Box::new(uptime_seconds.clone()))
            .expect("Failed to register uptime_seconds");

        Self {
            registry,
            redirects_total,
            redirect_fallbacks_total,
            affiliate_clicks_total,
            click_log_failures_total,
            uptime_seconds,
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
