//! Leveled log sinks.
//!
//! The registry reports its lifecycle as plain leveled text lines through a
//! [`LogSink`]. The default sink, [`TracingSink`], forwards each line to the
//! matching `tracing` macro so it lands in whatever subscriber
//! [`crate::init_telemetry`] installed. [`MemorySink`] keeps lines in memory
//! for assertions.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Three-letter tag used in plain-text renderings.
    pub fn tag(&self) -> &'static str {
        match self {
            LogLevel::Info => "INF",
            LogLevel::Warn => "WRN",
            LogLevel::Error => "ERR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Receiver of leveled text lines.
pub trait LogSink: Send + Sync {
    /// Record one line.
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards lines to `tracing` under the `relay` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => tracing::info!(target: "relay", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "relay", "{message}"),
            LogLevel::Error => tracing::error!(target: "relay", "{message}"),
        }
    }
}

/// Keeps every line in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all lines recorded so far.
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().clone()
    }

    /// Lines at `level`, text only.
    pub fn lines_at(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// True if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, m)| m.contains(needle))
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}

/// Helper to create structured log entries with a `channel` field.
#[macro_export]
macro_rules! channel_event {
    (info, $channel:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            channel = %$channel,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $channel:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            channel = %$channel,
            $($($field)*,)?
            $msg
        )
    };

    (error, $channel:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            channel = %$channel,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $channel:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            channel = %$channel,
            $($($field)*,)?
            $msg
        )
    };
}
