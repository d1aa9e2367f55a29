//! # Listeners
//!
//! Callbacks attached to a channel with `subscribe`.
//!
//! A listener returns `true` to unsubscribe and `false` to keep listening.
//! Every invocation runs as its own task, so a listener must be `Send + Sync`
//! and may be invoked concurrently with itself when earlier invocations
//! outlive their timeout.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use relay_types::Envelope;
use serde::Serialize;

/// Identifies one listener loop within its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// A channel callback.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Handle one envelope. Return `true` to unsubscribe.
    async fn on_message(&self, envelope: Envelope) -> bool;
}

/// Adapts a blocking closure. Each call runs on tokio's blocking pool, so the
/// closure may sleep or do synchronous I/O.
pub struct FnListener<F> {
    f: Arc<F>,
}

impl<F> FnListener<F>
where
    F: Fn(Envelope) -> bool + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<F> Listener for FnListener<F>
where
    F: Fn(Envelope) -> bool + Send + Sync + 'static,
{
    async fn on_message(&self, envelope: Envelope) -> bool {
        let f = Arc::clone(&self.f);
        match tokio::task::spawn_blocking(move || f(envelope)).await {
            Ok(unsubscribe) => unsubscribe,
            // Surface the closure's panic on this task so the loop sees it.
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => false,
        }
    }
}

/// Adapts a closure returning a future.
pub struct AsyncFnListener<F> {
    f: F,
}

impl<F, Fut> AsyncFnListener<F>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Listener for AsyncFnListener<F>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn on_message(&self, envelope: Envelope) -> bool {
        (self.f)(envelope).await
    }
}
