//! # Channel Registry
//!
//! Owns every live [`ChannelDefinition`] and their lifecycle.
//!
//! ## Channel Lifetime
//!
//! ```text
//! [Uninitialized] ──init──→ [Active] ──destroy──→ [Draining] ──joined──→ [Removed]
//! ```
//!
//! A later `init_channel` with the same name starts a fresh lifetime whose
//! sequence numbers begin at 0 again.
//!
//! ## Locking
//!
//! The name → definition map sits behind one reader/writer lock. Lookups
//! (publish, subscribe, stats) take the read side; `init_channel` and the
//! final removal in `destroy_channel` take the write side. The write lock is
//! never held while waiting for listener loops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use relay_telemetry::metrics::forget_channel;
use relay_telemetry::{LogSink, TracingSink, CHANNELS_ACTIVE, LISTENERS_ACTIVE};
use relay_types::{BusError, Envelope, NoTags, PayloadType, TagSource};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::channel::{ChannelDefinition, ChannelStats, ListenerHandle};
use crate::config::BusConfig;
use crate::listener::{FnListener, Listener, ListenerId};
use crate::logger::BusLogger;
use crate::subscriber::ListenerLoop;

/// The channel registry.
///
/// Normally built once at startup and shared behind an `Arc`. Tests build as
/// many independent registries as they like.
///
/// Metric series are process-global and labelled by channel name only.
/// Registries that each hold a channel with the same name report into the
/// same series, and destroying the channel in one of them removes the series
/// for both. Channels, queues and listeners are never shared.
pub struct Registry {
    channels: RwLock<HashMap<String, Arc<ChannelDefinition>>>,
    pub(crate) logger: Arc<BusLogger>,
    pub(crate) tag_source: Arc<dyn TagSource>,
    config: BusConfig,
}

/// Builder for [`Registry`] with non-default collaborators.
pub struct RegistryBuilder {
    config: BusConfig,
    sink: Arc<dyn LogSink>,
    tag_source: Arc<dyn TagSource>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Where lifecycle lines go. Defaults to [`TracingSink`].
    #[must_use]
    pub fn log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Supplies tags for untagged publishes. Defaults to [`NoTags`].
    #[must_use]
    pub fn tag_source(mut self, source: impl TagSource + 'static) -> Self {
        self.tag_source = Arc::new(source);
        self
    }

    #[must_use]
    pub fn build(self) -> Registry {
        Registry {
            channels: RwLock::new(HashMap::new()),
            logger: Arc::new(BusLogger::new(self.sink, self.config.verbose)),
            tag_source: self.tag_source,
            config: self.config,
        }
    }
}

impl Registry {
    /// Registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        Self::builder().config(config).build()
    }

    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            config: BusConfig::default(),
            sink: Arc::new(TracingSink),
            tag_source: Arc::new(NoTags),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Create a channel.
    ///
    /// # Errors
    ///
    /// - `InvalidCapacity` if `capacity` is 0
    /// - `AlreadyExists` if a channel with this name is live or draining
    pub fn init_channel(
        &self,
        name: &str,
        capacity: usize,
        allowed_types: impl IntoIterator<Item = PayloadType>,
    ) -> Result<(), BusError> {
        if capacity == 0 {
            let err = BusError::InvalidCapacity {
                channel: name.to_string(),
            };
            self.logger.error(format_args!("{name} init failed: {err}"));
            return Err(err);
        }

        {
            let mut channels = self.channels.write();
            if channels.contains_key(name) {
                drop(channels);
                let err = BusError::AlreadyExists {
                    channel: name.to_string(),
                };
                self.logger.error(format_args!("{name} init failed: {err}"));
                return Err(err);
            }

            let definition = ChannelDefinition::new(
                name,
                capacity,
                allowed_types,
                self.config.max_inflight_callbacks,
            );
            channels.insert(name.to_string(), Arc::new(definition));
        }

        CHANNELS_ACTIVE.inc();
        self.logger
            .info(format_args!("{name} initialized (capacity {capacity})"));
        Ok(())
    }

    /// Tear a channel down.
    ///
    /// Cancels every listener loop, waits for them to exit (bounded by the
    /// configured grace period), then removes the channel. Loops still running
    /// when the grace period ends are aborted and logged. Queued envelopes are
    /// dropped. Callbacks already running keep running until they finish.
    ///
    /// # Errors
    ///
    /// `NotFound` if no such channel exists or another destroy is already
    /// draining it.
    pub async fn destroy_channel(&self, name: &str) -> Result<(), BusError> {
        let channel = self.lookup(name)?;
        let Some(handles) = channel.begin_drain() else {
            return Err(BusError::not_found(name));
        };

        if !handles.is_empty() {
            self.logger.info(format_args!(
                "{name} is closing (listener count: {})",
                handles.len()
            ));
        }
        LISTENERS_ACTIVE.with_label_values(&[name]).set(0);

        // One cancel reaches every listener: their tokens are children of this
        channel.shutdown_token().cancel();
        self.join_listeners(name, handles).await;

        {
            let mut channels = self.channels.write();
            if channels
                .get(name)
                .is_some_and(|current| Arc::ptr_eq(current, &channel))
            {
                channels.remove(name);
            }
        }

        CHANNELS_ACTIVE.dec();
        forget_channel(name);
        self.logger.info(format_args!("{name} destroyed"));
        Ok(())
    }

    async fn join_listeners(&self, name: &str, handles: Vec<ListenerHandle>) {
        if handles.is_empty() {
            return;
        }

        let grace = self.config.grace_period();
        let mut joins: Vec<JoinHandle<()>> = handles.into_iter().map(|h| h.join).collect();

        if tokio::time::timeout(grace, join_all(joins.iter_mut()))
            .await
            .is_ok()
        {
            return;
        }

        let stuck: Vec<&JoinHandle<()>> = joins.iter().filter(|j| !j.is_finished()).collect();
        self.logger.error(format_args!(
            "{name} still has {} listener loop(s) running after {}ms grace period, aborting",
            stuck.len(),
            grace.as_millis()
        ));
        for join in stuck {
            join.abort();
        }
    }

    /// Destroy every channel. Call once at process end.
    pub async fn shutdown(&self) {
        let names = self.channel_names();
        let results = join_all(names.iter().map(|name| self.destroy_channel(name))).await;

        for (name, result) in names.iter().zip(results) {
            // NotFound: someone else destroyed it first
            if let Err(e) = result {
                if !matches!(e, BusError::NotFound { .. }) {
                    self.logger
                        .error(format_args!("{name} shutdown failed: {e}"));
                }
            }
        }
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Find a channel.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent.
    pub fn lookup(&self, name: &str) -> Result<Arc<ChannelDefinition>, BusError> {
        self.channels
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BusError::not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.read().contains_key(name)
    }

    /// Live channel names, sorted.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// Snapshot of one channel.
    pub fn channel_stats(&self, name: &str) -> Result<ChannelStats, BusError> {
        self.lookup(name).map(|channel| channel.stats())
    }

    /// Snapshots of every channel, sorted by name.
    pub fn stats(&self) -> Vec<ChannelStats> {
        let channels: Vec<Arc<ChannelDefinition>> =
            self.channels.read().values().cloned().collect();
        let mut stats: Vec<ChannelStats> = channels.iter().map(|c| c.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    // =========================================================================
    // VERBOSITY
    // =========================================================================

    /// Toggle lifecycle log lines for all subsequent operations.
    pub fn set_verbose(&self, verbose: bool) {
        self.logger.set_verbose(verbose);
        if verbose {
            self.logger.info(format_args!("verbose mode enabled"));
        } else {
            self.logger.info(format_args!("verbose mode disabled"));
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.logger.is_verbose()
    }

    // =========================================================================
    // SUBSCRIBE
    // =========================================================================

    /// Attach a listener loop to a channel.
    ///
    /// Several listeners on one channel compete for its queue: every envelope
    /// goes to exactly one of them.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the channel does not exist or is being destroyed
    /// - `NoRuntime` if called outside a tokio runtime
    pub fn subscribe<L: Listener>(
        &self,
        name: &str,
        timeout: Duration,
        listener: L,
    ) -> Result<ListenerId, BusError> {
        let result = self.spawn_listener(name, timeout, Arc::new(listener));
        if let Err(e) = &result {
            self.logger.error(format_args!("{name} sub failed: {e}"));
        }
        result
    }

    /// [`subscribe`](Self::subscribe) with a blocking closure.
    pub fn subscribe_fn<F>(&self, name: &str, timeout: Duration, f: F) -> Result<ListenerId, BusError>
    where
        F: Fn(Envelope) -> bool + Send + Sync + 'static,
    {
        self.subscribe(name, timeout, FnListener::new(f))
    }

    /// [`subscribe`](Self::subscribe) with the configured default timeout.
    pub fn subscribe_default<L: Listener>(
        &self,
        name: &str,
        listener: L,
    ) -> Result<ListenerId, BusError> {
        self.subscribe(name, self.config.listener_timeout(), listener)
    }

    /// Stop one listener loop without touching the others.
    ///
    /// # Errors
    ///
    /// `NotFound` if the channel does not exist or the listener is no longer
    /// registered on it.
    pub fn unsubscribe(&self, name: &str, id: ListenerId) -> Result<(), BusError> {
        let channel = self.lookup(name)?;
        let (handle, remaining) = channel
            .release_listener(id)
            .ok_or_else(|| BusError::not_found(name))?;
        handle.cancel.cancel();

        LISTENERS_ACTIVE
            .with_label_values(&[name])
            .set(i64::try_from(remaining).unwrap_or(i64::MAX));
        self.logger.info(format_args!(
            "{name} lost a listener (listener count: {remaining})"
        ));
        Ok(())
    }

    fn spawn_listener(
        &self,
        name: &str,
        timeout: Duration,
        listener: Arc<dyn Listener>,
    ) -> Result<ListenerId, BusError> {
        let runtime = Handle::try_current().map_err(|_| BusError::NoRuntime {
            channel: name.to_string(),
        })?;
        let channel = self.lookup(name)?;

        let (id, count) = channel.register_listener(|id, cancel| {
            let listener_loop = ListenerLoop {
                id,
                channel: Arc::clone(&channel),
                listener,
                timeout,
                cancel,
                logger: Arc::clone(&self.logger),
            };
            runtime.spawn(listener_loop.run())
        })?;

        LISTENERS_ACTIVE
            .with_label_values(&[name])
            .set(i64::try_from(count).unwrap_or(i64::MAX));
        if count > 1 {
            self.logger.warn(format_args!(
                "{name} already has listeners (listener count: {count})"
            ));
        }
        Ok(id)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Registry {
    /// Listener loops hold their channel alive; without this they would
    /// outlive a registry dropped without `shutdown`.
    fn drop(&mut self) {
        for channel in self.channels.get_mut().values() {
            channel.shutdown_token().cancel();
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("channels", &self.channel_names())
            .field("verbose", &self.is_verbose())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
