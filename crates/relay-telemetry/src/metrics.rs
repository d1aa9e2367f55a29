//! Prometheus metrics for the channel registry.
//!
//! All metrics follow the naming convention: `relay_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., messages_published_total)
//! - **Gauge**: Value that can go up or down (e.g., callbacks_inflight)
//! - **Histogram**: Distribution of values (e.g., callback_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PUBLISH PATH
    // =========================================================================

    /// Messages accepted into a channel queue
    pub static ref MESSAGES_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_messages_published_total", "Messages accepted into a channel queue"),
        &["channel"]
    ).expect("metric creation failed");

    /// Publishes rejected, by error kind
    pub static ref PUBLISH_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_publish_rejected_total", "Publishes rejected by the registry"),
        &["channel", "reason"]  // reason: one of REJECT_REASONS
    ).expect("metric creation failed");

    // =========================================================================
    // LISTENER LOOPS
    // =========================================================================

    /// Callbacks that outlived their listener timeout
    pub static ref CALLBACK_TIMEOUTS: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_callback_timeouts_total", "Callbacks that exceeded their timeout"),
        &["channel"]
    ).expect("metric creation failed");

    /// Callbacks that panicked
    pub static ref CALLBACK_PANICS: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_callback_panics_total", "Callbacks that panicked"),
        &["channel"]
    ).expect("metric creation failed");

    /// Callback tasks currently running, including detached ones
    pub static ref CALLBACKS_INFLIGHT: IntGaugeVec = IntGaugeVec::new(
        Opts::new("relay_callbacks_inflight", "Callback tasks currently running"),
        &["channel"]
    ).expect("metric creation failed");

    /// Callback run time, for callbacks that finished
    pub static ref CALLBACK_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "relay_callback_duration_seconds",
            "Time spent inside listener callbacks"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("valid buckets")),
        &["channel"]
    ).expect("metric creation failed");

    /// Listener loops registered and not yet told to stop
    pub static ref LISTENERS_ACTIVE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("relay_listeners_active", "Listener loops currently registered"),
        &["channel"]
    ).expect("metric creation failed");

    // =========================================================================
    // REGISTRY
    // =========================================================================

    /// Live channels
    pub static ref CHANNELS_ACTIVE: IntGauge = IntGauge::new(
        "relay_channels_active",
        "Channels currently registered"
    ).expect("metric creation failed");
}

/// Handle proving the metrics are registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; later calls are no-ops.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Publish
        Box::new(MESSAGES_PUBLISHED.clone()),
        Box::new(PUBLISH_REJECTED.clone()),
        // Listeners
        Box::new(CALLBACK_TIMEOUTS.clone()),
        Box::new(CALLBACK_PANICS.clone()),
        Box::new(CALLBACKS_INFLIGHT.clone()),
        Box::new(CALLBACK_DURATION.clone()),
        Box::new(LISTENERS_ACTIVE.clone()),
        // Registry
        Box::new(CHANNELS_ACTIVE.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Every `reason` label `PUBLISH_REJECTED` is written with.
pub const REJECT_REASONS: [&str; 7] = [
    "already_exists",
    "not_found",
    "no_subscribers",
    "full",
    "type_not_allowed",
    "invalid_capacity",
    "no_runtime",
];

/// `channel` label for rejections against names with no live channel, so
/// arbitrary names cannot grow the label set.
pub const UNKNOWN_CHANNEL: &str = "_unknown";

/// Drop the labelled series of a channel that no longer exists.
///
/// In-flight and duration series are kept: detached callbacks may still be
/// running and would recreate them on completion.
pub fn forget_channel(channel: &str) {
    for reason in REJECT_REASONS {
        let _ = PUBLISH_REJECTED.remove_label_values(&[channel, reason]);
    }
    let _ = MESSAGES_PUBLISHED.remove_label_values(&[channel]);
    let _ = CALLBACK_TIMEOUTS.remove_label_values(&[channel]);
    let _ = CALLBACK_PANICS.remove_label_values(&[channel]);
    let _ = LISTENERS_ACTIVE.remove_label_values(&[channel]);
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: prometheus::Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &prometheus::Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
    ($histogram:expr, $labels:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram.with_label_values($labels))
    };
}
