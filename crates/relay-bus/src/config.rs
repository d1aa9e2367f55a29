//! # Registry Configuration
//!
//! Tunables for channel teardown and listener dispatch. Loadable from the
//! environment or from JSON.

use std::env;
use std::time::Duration;

use relay_telemetry::parse_flag;
use serde::{Deserialize, Serialize};

use crate::{DEFAULT_GRACE_PERIOD_MS, DEFAULT_LISTENER_TIMEOUT_MS};

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Upper bound on how long `destroy_channel` waits for listener loops to
    /// exit before aborting them.
    pub grace_period_ms: u64,

    /// Callback timeout used by `subscribe_default`.
    pub listener_timeout_ms: u64,

    /// Cap on concurrently running callbacks per channel, detached ones
    /// included. `None` means unbounded.
    pub max_inflight_callbacks: Option<usize>,

    /// Whether lifecycle lines reach the log sink.
    pub verbose: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            listener_timeout_ms: DEFAULT_LISTENER_TIMEOUT_MS,
            max_inflight_callbacks: None,
            verbose: true,
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RELAY_GRACE_PERIOD_MS`: Destroy grace period (default: 200)
    /// - `RELAY_LISTENER_TIMEOUT_MS`: Default callback timeout (default: 300)
    /// - `RELAY_MAX_INFLIGHT`: Per-channel callback cap (default: unbounded)
    /// - `RELAY_VERBOSE`: Emit lifecycle log lines (default: true)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            grace_period_ms: env::var("RELAY_GRACE_PERIOD_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.grace_period_ms),

            listener_timeout_ms: env::var("RELAY_LISTENER_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.listener_timeout_ms),

            max_inflight_callbacks: env::var("RELAY_MAX_INFLIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0),

            verbose: env::var("RELAY_VERBOSE")
                .map(|v| parse_flag(&v, defaults.verbose))
                .unwrap_or(defaults.verbose),
        }
    }

    /// Parse configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn listener_timeout(&self) -> Duration {
        Duration::from_millis(self.listener_timeout_ms)
    }

    #[must_use]
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_max_inflight_callbacks(mut self, limit: usize) -> Self {
        self.max_inflight_callbacks = Some(limit).filter(|n| *n > 0);
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
