//! # Error Types
//!
//! Errors returned synchronously by registry operations.

use thiserror::Error;

/// Errors from channel registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// A live channel with this name already exists.
    #[error("channel {channel} already exists")]
    AlreadyExists { channel: String },

    /// No live channel with this name.
    #[error("channel {channel} not found")]
    NotFound { channel: String },

    /// Publish attempted while no listener is attached.
    #[error("channel {channel} has no subscribers")]
    NoSubscribers { channel: String },

    /// The channel queue is at capacity.
    #[error("channel {channel} is full (capacity {capacity})")]
    Full { channel: String, capacity: usize },

    /// The payload type is not in the channel's allow-list.
    #[error("payload type {type_name} is not allowed on channel {channel}")]
    TypeNotAllowed {
        channel: String,
        type_name: &'static str,
    },

    /// Capacity must be at least one.
    #[error("channel {channel} must have a capacity of at least 1")]
    InvalidCapacity { channel: String },

    /// Listener loops can only be spawned from inside a tokio runtime.
    #[error("subscribing to {channel} requires a running tokio runtime")]
    NoRuntime { channel: String },
}

impl BusError {
    /// Short, stable label for this error kind (used as a metric label).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BusError::AlreadyExists { .. } => "already_exists",
            BusError::NotFound { .. } => "not_found",
            BusError::NoSubscribers { .. } => "no_subscribers",
            BusError::Full { .. } => "full",
            BusError::TypeNotAllowed { .. } => "type_not_allowed",
            BusError::InvalidCapacity { .. } => "invalid_capacity",
            BusError::NoRuntime { .. } => "no_runtime",
        }
    }

    /// The channel the failed operation targeted.
    #[must_use]
    pub fn channel(&self) -> &str {
        match self {
            BusError::AlreadyExists { channel }
            | BusError::NotFound { channel }
            | BusError::NoSubscribers { channel }
            | BusError::Full { channel, .. }
            | BusError::TypeNotAllowed { channel, .. }
            | BusError::InvalidCapacity { channel }
            | BusError::NoRuntime { channel } => channel,
        }
    }

    /// `NotFound` for `channel`.
    #[must_use]
    pub fn not_found(channel: &str) -> Self {
        BusError::NotFound {
            channel: channel.to_string(),
        }
    }
}
