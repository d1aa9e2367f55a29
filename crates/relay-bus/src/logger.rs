//! Verbose-gated front for the registry's [`LogSink`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use relay_telemetry::{LogLevel, LogSink};

/// Shared by the registry and every listener loop it spawns.
pub(crate) struct BusLogger {
    verbose: AtomicBool,
    sink: Arc<dyn LogSink>,
}

impl BusLogger {
    pub(crate) fn new(sink: Arc<dyn LogSink>, verbose: bool) -> Self {
        Self {
            verbose: AtomicBool::new(verbose),
            sink,
        }
    }

    pub(crate) fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    pub(crate) fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    /// Formats only when verbose.
    pub(crate) fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if !self.is_verbose() {
            return;
        }
        self.sink.log(level, &args.to_string());
    }

    pub(crate) fn info(&self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Info, args);
    }

    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Warn, args);
    }

    pub(crate) fn error(&self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Error, args);
    }
}
