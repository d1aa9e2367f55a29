//! # Publish Diagnostics Collaborators
//!
//! - [`CallerLabel`]: human-readable origin of a publish, for log lines only.
//! - [`TagSource`]: supplies a tag when the publisher did not give one.

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

use uuid::Uuid;

/// Opaque label identifying who published a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerLabel(Cow<'static, str>);

impl CallerLabel {
    /// Label for callers that did not identify themselves.
    pub const UNKNOWN: CallerLabel = CallerLabel(Cow::Borrowed("unknown"));

    /// Label from an explicit name.
    pub fn new(label: impl Into<Cow<'static, str>>) -> Self {
        Self(label.into())
    }

    /// Label from a source location (`file:line`).
    #[must_use]
    pub fn from_location(location: &Location<'_>) -> Self {
        Self(Cow::Owned(format!(
            "{}:{}",
            location.file(),
            location.line()
        )))
    }

    /// Label for the caller of the function this is invoked from.
    ///
    /// Only meaningful when every function between the real caller and this
    /// one is annotated with `#[track_caller]`.
    #[track_caller]
    #[must_use]
    pub fn here() -> Self {
        Self::from_location(Location::caller())
    }

    /// The label text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for CallerLabel {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for CallerLabel {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

/// Supplies tags for messages published without one.
pub trait TagSource: Send + Sync {
    /// Returns the tag for the next message on `channel`, or `None` to leave
    /// it untagged.
    fn next_tag(&self, channel: &str) -> Option<String>;
}

/// Never tags. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTags;

impl TagSource for NoTags {
    fn next_tag(&self, _channel: &str) -> Option<String> {
        None
    }
}

/// Tags every untagged message with a random UUID v4.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidTags;

impl TagSource for UuidTags {
    fn next_tag(&self, _channel: &str) -> Option<String> {
        Some(Uuid::new_v4().to_string())
    }
}
