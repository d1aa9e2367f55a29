//! # Relay Telemetry
//!
//! Logging and metrics for the channel registry.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` pipeline (pretty or JSON) plus the
//!   [`LogSink`] collaborator the registry writes its lifecycle lines to
//! - **Metrics**: Prometheus counters and gauges for publishes, rejections,
//!   listener loops, and in-flight callbacks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("Failed to init telemetry");
//!
//!     // Registry log lines and metrics are now being collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_SERVICE_NAME` | `relay` | Service name in the startup line |
//! | `RELAY_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `RELAY_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `RELAY_JSON_LOGS` | `false` | JSON log format |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::{parse_flag, TelemetryConfig};
pub use logging::{LogLevel, LogSink, MemorySink, TracingSink};
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, CALLBACKS_INFLIGHT, CALLBACK_DURATION,
    CALLBACK_PANICS, CALLBACK_TIMEOUTS, CHANNELS_ACTIVE, LISTENERS_ACTIVE, MESSAGES_PUBLISHED,
    PUBLISH_REJECTED, REJECT_REASONS, UNKNOWN_CHANNEL,
};
pub use tracing_setup::{build_filter, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first, they never depend on the subscriber
    let metrics_handle = register_metrics()?;

    let tracing_guard = tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
