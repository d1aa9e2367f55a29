//! # Message Envelope
//!
//! The immutable wrapper for every message that travels through a channel.
//!
//! ## Properties
//!
//! - **Sequencing**: `sequence` is unique and strictly increasing within one
//!   channel lifetime, starting at 0.
//! - **Tagging**: `tag` is an optional caller- or source-supplied identifier.
//! - **Sharing**: the payload sits behind an `Arc`, so cloning an envelope never
//!   copies the payload.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::payload::{Payload, PayloadType};

/// A sequenced message as delivered to listeners.
#[derive(Clone)]
pub struct Envelope {
    /// Optional identifier supplied at publish time.
    tag: Option<String>,

    /// Position of this message in its channel's lifetime.
    sequence: u64,

    /// Name of the channel the message was published to.
    channel: Arc<str>,

    /// The message body.
    payload: Payload,
}

impl Envelope {
    /// Build an envelope. Normally only the registry does this, while holding
    /// the channel's sequence lock.
    pub fn new(
        channel: Arc<str>,
        sequence: u64,
        tag: Option<String>,
        payload: Payload,
    ) -> Self {
        Self {
            tag,
            sequence,
            channel,
            payload,
        }
    }

    /// The tag, if one was supplied.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// The per-channel sequence number.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The raw payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The concrete payload type.
    #[must_use]
    pub fn payload_type(&self) -> PayloadType {
        self.payload.kind()
    }

    /// Borrow the payload as a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("channel", &self.channel)
            .field("sequence", &self.sequence)
            .field("tag", &self.tag)
            .field("payload", &self.payload.kind())
            .finish()
    }
}
