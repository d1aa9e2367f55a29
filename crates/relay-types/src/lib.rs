//! # Relay Types
//!
//! Value types shared by the channel registry and its users.
//!
//! ## Contents
//!
//! - **Envelope**: the immutable, sequenced wrapper delivered to listeners.
//! - **Payload / PayloadType**: type-erased payloads and the exact-type
//!   discriminators channels use as allow-lists.
//! - **BusError**: every error a registry operation can return.
//! - **CallerLabel / TagSource**: publish diagnostics collaborators.

pub mod caller;
pub mod envelope;
pub mod errors;
pub mod payload;

pub use caller::{CallerLabel, NoTags, TagSource, UuidTags};
pub use envelope::Envelope;
pub use errors::BusError;
pub use payload::{Payload, PayloadType};
