//! # Publish Path
//!
//! Validation order for every publish:
//!
//! 1. channel lookup (`NotFound`)
//! 2. exact-type allow-list check (`TypeNotAllowed`), independent of listener
//!    and queue state
//! 3. under the channel's state lock: draining (`NotFound`), no listeners
//!    (`NoSubscribers`), queue at capacity (`Full`), then sequence reservation
//!    and enqueue
//!
//! A rejected publish never consumes a sequence number.

use std::any::Any;

use relay_telemetry::{channel_event, MESSAGES_PUBLISHED, PUBLISH_REJECTED, UNKNOWN_CHANNEL};
use relay_types::{BusError, CallerLabel, Envelope, Payload};

use crate::registry::Registry;

impl Registry {
    /// Publish an untagged value. The caller label is this call site.
    ///
    /// # Errors
    ///
    /// `NotFound`, `TypeNotAllowed`, `NoSubscribers` or `Full`.
    #[track_caller]
    pub fn publish<T>(&self, name: &str, value: T) -> Result<Envelope, BusError>
    where
        T: Any + Send + Sync,
    {
        self.publish_payload(name, Payload::new(value), None, CallerLabel::here())
    }

    /// Publish a tagged value. The caller label is this call site.
    #[track_caller]
    pub fn publish_with_tag<T>(
        &self,
        name: &str,
        value: T,
        tag: impl Into<String>,
    ) -> Result<Envelope, BusError>
    where
        T: Any + Send + Sync,
    {
        self.publish_payload(
            name,
            Payload::new(value),
            Some(tag.into()),
            CallerLabel::here(),
        )
    }

    /// Publish with an explicit caller label, for adapters that forward on
    /// behalf of someone else.
    pub fn publish_as<T>(
        &self,
        name: &str,
        value: T,
        tag: Option<String>,
        caller: impl Into<CallerLabel>,
    ) -> Result<Envelope, BusError>
    where
        T: Any + Send + Sync,
    {
        self.publish_payload(name, Payload::new(value), tag, caller.into())
    }

    /// Publish an already type-erased payload.
    pub fn publish_payload(
        &self,
        name: &str,
        payload: Payload,
        tag: Option<String>,
        caller: CallerLabel,
    ) -> Result<Envelope, BusError> {
        match self.try_publish(name, payload, tag) {
            Ok(envelope) => {
                MESSAGES_PUBLISHED.with_label_values(&[name]).inc();
                channel_event!(
                    debug,
                    name,
                    "Message published",
                    sequence = envelope.sequence(),
                    caller = %caller
                );
                match envelope.tag() {
                    Some(tag) => self.logger.info(format_args!(
                        "{name} published msg#{} <{tag}> by [{caller}]",
                        envelope.sequence()
                    )),
                    None => self.logger.info(format_args!(
                        "{name} published msg#{} by [{caller}]",
                        envelope.sequence()
                    )),
                }
                Ok(envelope)
            }
            Err(e) => {
                let label = match e {
                    BusError::NotFound { .. } => UNKNOWN_CHANNEL,
                    _ => name,
                };
                PUBLISH_REJECTED.with_label_values(&[label, e.kind()]).inc();
                self.logger
                    .error(format_args!("{name} pub failed: {e} by [{caller}]"));
                Err(e)
            }
        }
    }

    fn try_publish(
        &self,
        name: &str,
        payload: Payload,
        tag: Option<String>,
    ) -> Result<Envelope, BusError> {
        let channel = self.lookup(name)?;
        channel.check_type(&payload)?;
        let tag = tag.or_else(|| self.tag_source.next_tag(name));
        channel.enqueue(payload, tag)
    }
}
