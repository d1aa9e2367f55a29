//! # Relay Bus - Named-Channel Publish/Subscribe Registry
//!
//! In-process message channels with bounded queues, payload type allow-lists
//! and timeout-bounded listener callbacks.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐                      ┌──────────────────┐
//! │  Publisher   │   publish(name, v)   │ ChannelDefinition│
//! │              │ ───────────────────→ │  [bounded queue] │
//! └──────────────┘   Envelope{seq, tag} └────────┬─────────┘
//!                                                │  competing dequeue
//!                          ┌─────────────────────┼──────────────────┐
//!                          ▼                     ▼                  ▼
//!                   ┌────────────┐        ┌────────────┐     ┌────────────┐
//!                   │ Listener 0 │        │ Listener 1 │ ... │ Listener N │
//!                   └────────────┘        └────────────┘     └────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Sequence numbers per channel lifetime start at 0, never repeat and have
//!   no gaps among accepted publishes.
//! - The queue never holds more than `capacity` envelopes; a publish into a
//!   full queue fails with `Full` instead of blocking.
//! - Every envelope is delivered to exactly one listener loop.
//! - A slow callback delays its own loop by at most its timeout.
//! - `destroy_channel` returns within the grace period plus scheduling slack.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use relay_bus::{payload_types, Registry};
//!
//! # async fn demo() -> Result<(), relay_bus::BusError> {
//! let registry = Registry::new();
//! registry.init_channel("orders", 16, payload_types![u64])?;
//! registry.subscribe_fn("orders", Duration::from_millis(300), |envelope| {
//!     println!("order {:?}", envelope.downcast_ref::<u64>());
//!     false
//! })?;
//! let envelope = registry.publish("orders", 42_u64)?;
//! assert_eq!(envelope.sequence(), 0);
//! registry.destroy_channel("orders").await?;
//! # Ok(())
//! # }
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod channel;
pub mod config;
pub mod listener;
mod logger;
mod publisher;
pub mod registry;
mod subscriber;

pub use channel::{ChannelDefinition, ChannelStats};
pub use config::BusConfig;
pub use listener::{AsyncFnListener, FnListener, Listener, ListenerId};
pub use registry::{Registry, RegistryBuilder};

// Re-export the envelope vocabulary so callers need only this crate.
pub use relay_types::{
    payload_types, BusError, CallerLabel, Envelope, NoTags, Payload, PayloadType, TagSource,
    UuidTags,
};

/// How long `destroy_channel` waits for listener loops to exit.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 200;

/// Callback timeout used by `subscribe_default`.
pub const DEFAULT_LISTENER_TIMEOUT_MS: u64 = 300;
