//! # Listener Loop
//!
//! One task per `subscribe` call.
//!
//! ```text
//!            ┌──────────── cancelled ─────────────► exit (queue not drained)
//!            │
//!  wait ─────┤
//!            │
//!            └── envelope ──► spawn callback task ──► race(callback, timer, cancel)
//!                                                        │
//!                 true  ──► release listener, exit  ◄────┤
//!                 false ──► wait                    ◄────┤
//!                 panic ──► log, wait               ◄────┤
//!                 timer ──► log, detach callback, wait ◄─┘
//! ```
//!
//! A callback that loses the race to the timer is never stopped. It keeps
//! running in the background and its result is discarded. Detached callbacks
//! are counted per channel and, when `max_inflight_callbacks` is set, the loop
//! waits for a free slot before starting the next one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay_telemetry::{
    channel_event, time_histogram, CALLBACKS_INFLIGHT, CALLBACK_DURATION, CALLBACK_PANICS,
    CALLBACK_TIMEOUTS, LISTENERS_ACTIVE,
};
use relay_types::Envelope;
use tokio_util::sync::CancellationToken;

use crate::channel::ChannelDefinition;
use crate::listener::{Listener, ListenerId};
use crate::logger::BusLogger;

/// What the loop does after one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Continue,
    Unsubscribe,
    Cancelled,
}

pub(crate) struct ListenerLoop {
    pub(crate) id: ListenerId,
    pub(crate) channel: Arc<ChannelDefinition>,
    pub(crate) listener: Arc<dyn Listener>,
    pub(crate) timeout: Duration,
    pub(crate) cancel: CancellationToken,
    pub(crate) logger: Arc<BusLogger>,
}

impl ListenerLoop {
    pub(crate) async fn run(self) {
        let name = self.channel.name();
        self.logger.info(format_args!("{name} sub started ({})", self.id));

        loop {
            // Cancellation is checked first, so a cancelled loop never takes
            // another envelope off the queue.
            let envelope = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.next_envelope() => match next {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            match envelope.tag() {
                Some(tag) => self.logger.info(format_args!(
                    "{name} received msg#{} <{tag}>",
                    envelope.sequence()
                )),
                None => self
                    .logger
                    .info(format_args!("{name} received msg#{}", envelope.sequence())),
            }

            match self.dispatch(envelope).await {
                Outcome::Continue => {}
                Outcome::Cancelled => break,
                Outcome::Unsubscribe => {
                    if let Some((_, remaining)) = self.channel.release_listener(self.id) {
                        LISTENERS_ACTIVE
                            .with_label_values(&[name])
                            .set(i64::try_from(remaining).unwrap_or(i64::MAX));
                        self.logger.info(format_args!(
                            "{name} lost a listener (listener count: {remaining})"
                        ));
                    }
                    return;
                }
            }
        }

        self.logger.info(format_args!("{name} is closing ({})", self.id));
    }

    /// Waits for the shared receiver, then for the next envelope.
    async fn next_envelope(&self) -> Option<Envelope> {
        let mut receiver = self.channel.receiver().lock().await;
        receiver.recv().await
    }

    /// Runs the callback as its own task and races it against the timeout and
    /// the cancellation signal.
    async fn dispatch(&self, envelope: Envelope) -> Outcome {
        let name = self.channel.name();
        let sequence = envelope.sequence();

        let permit = match self.channel.inflight_limit() {
            Some(limit) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Outcome::Cancelled,
                permit = Arc::clone(limit).acquire_owned() => permit.ok(),
            },
            None => None,
        };

        let guard = InflightGuard::enter(&self.channel);
        let listener = Arc::clone(&self.listener);
        let mut callback = tokio::spawn(async move {
            let _permit = permit;
            let _timer = time_histogram!(CALLBACK_DURATION, &[guard.channel()]);
            let unsubscribe = listener.on_message(envelope).await;
            drop(guard);
            unsubscribe
        });

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Outcome::Cancelled,
            result = tokio::time::timeout(self.timeout, &mut callback) => match result {
                Ok(Ok(true)) => Outcome::Unsubscribe,
                Ok(Ok(false)) => Outcome::Continue,
                Ok(Err(e)) if e.is_panic() => {
                    CALLBACK_PANICS.with_label_values(&[name]).inc();
                    self.logger.error(format_args!(
                        "{name} listener panicked on msg#{sequence}"
                    ));
                    Outcome::Continue
                }
                Ok(Err(_)) => Outcome::Continue,
                Err(_elapsed) => {
                    let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                    CALLBACK_TIMEOUTS.with_label_values(&[name]).inc();
                    channel_event!(
                        debug,
                        name,
                        "Callback detached after timeout",
                        sequence = sequence,
                        timeout_ms = timeout_ms
                    );
                    self.logger.warn(format_args!(
                        "{name} listener timed out on msg#{sequence} after {timeout_ms}ms"
                    ));
                    Outcome::Continue
                }
            },
        }
    }
}

/// Counts one running callback for as long as it lives.
///
/// Dropped when the callback finishes or unwinds, even if the loop has
/// already moved on.
struct InflightGuard {
    counter: Arc<AtomicUsize>,
    channel: Arc<str>,
}

impl InflightGuard {
    fn enter(channel: &ChannelDefinition) -> Self {
        let counter = Arc::clone(channel.inflight_counter());
        counter.fetch_add(1, Ordering::AcqRel);
        CALLBACKS_INFLIGHT
            .with_label_values(&[channel.name()])
            .inc();
        Self {
            counter,
            channel: Arc::clone(channel.label()),
        }
    }

    fn channel(&self) -> &str {
        &self.channel
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
        CALLBACKS_INFLIGHT
            .with_label_values(&[self.channel()])
            .dec();
    }
}
