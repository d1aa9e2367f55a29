//! # Channel Definition
//!
//! Per-channel state owned by the [`Registry`](crate::Registry).
//!
//! ## Locking
//!
//! - The bounded queue (`tokio::sync::mpsc`) is safe for concurrent use on its
//!   own. Its single receiver is shared by the competing listener loops behind
//!   an async mutex.
//! - Everything else that changes after creation (sequence counter, listener
//!   set, draining flag) sits behind one `parking_lot::Mutex`, never held
//!   across an `.await`.
//! - The whole check-then-enqueue sequence of a publish runs under that mutex,
//!   so two publishers can neither share a sequence number nor both pass the
//!   capacity check and overflow the queue.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use relay_types::{BusError, Envelope, Payload, PayloadType};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::listener::ListenerId;

/// Receiver end shared by every listener loop of one channel.
pub(crate) type SharedReceiver = Arc<AsyncMutex<mpsc::Receiver<Envelope>>>;

/// A registered listener loop.
pub(crate) struct ListenerHandle {
    /// Child of the channel's shutdown token.
    pub(crate) cancel: CancellationToken,
    pub(crate) join: JoinHandle<()>,
}

struct ChannelState {
    next_sequence: u64,
    next_listener_id: u64,
    draining: bool,
    listeners: HashMap<ListenerId, ListenerHandle>,
}

/// One named, bounded channel.
pub struct ChannelDefinition {
    name: Arc<str>,
    capacity: usize,
    allowed: HashSet<PayloadType>,
    sender: mpsc::Sender<Envelope>,
    receiver: SharedReceiver,
    state: Mutex<ChannelState>,

    /// Cancelling this stops every listener loop of the channel.
    shutdown: CancellationToken,

    /// Callback tasks currently running, detached ones included.
    inflight: Arc<AtomicUsize>,
    inflight_limit: Option<Arc<Semaphore>>,
}

impl ChannelDefinition {
    /// `capacity` must be non-zero; the registry checks this before calling.
    pub(crate) fn new(
        name: &str,
        capacity: usize,
        allowed: impl IntoIterator<Item = PayloadType>,
        max_inflight_callbacks: Option<usize>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            name: Arc::from(name),
            capacity,
            allowed: allowed.into_iter().collect(),
            sender,
            receiver: Arc::new(AsyncMutex::new(receiver)),
            state: Mutex::new(ChannelState {
                next_sequence: 0,
                next_listener_id: 0,
                draining: false,
                listeners: HashMap::new(),
            }),
            shutdown: CancellationToken::new(),
            inflight: Arc::new(AtomicUsize::new(0)),
            inflight_limit: max_inflight_callbacks.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of queued envelopes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Envelopes currently queued and not yet taken by a listener loop.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Listener loops registered and not yet told to stop.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Sequence number the next accepted publish will receive.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.state.lock().next_sequence
    }

    /// Callback tasks currently running.
    #[must_use]
    pub fn inflight_callbacks(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// True once `destroy_channel` has started tearing this channel down.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.state.lock().draining
    }

    /// Exact-type allow-list membership.
    #[must_use]
    pub fn allows(&self, kind: PayloadType) -> bool {
        self.allowed.contains(&kind)
    }

    /// The allow-list, sorted by type name.
    #[must_use]
    pub fn allowed_types(&self) -> Vec<PayloadType> {
        let mut types: Vec<PayloadType> = self.allowed.iter().copied().collect();
        types.sort_by_key(|t| t.name());
        types
    }

    /// Point-in-time snapshot.
    #[must_use]
    pub fn stats(&self) -> ChannelStats {
        let (listener_count, next_sequence, draining) = {
            let state = self.state.lock();
            (state.listeners.len(), state.next_sequence, state.draining)
        };
        ChannelStats {
            name: self.name.to_string(),
            capacity: self.capacity,
            depth: self.depth(),
            listener_count,
            next_sequence,
            inflight_callbacks: self.inflight_callbacks(),
            draining,
            allowed_types: self.allowed_types().iter().map(PayloadType::name).collect(),
        }
    }

    pub(crate) fn label(&self) -> &Arc<str> {
        &self.name
    }

    pub(crate) fn receiver(&self) -> &SharedReceiver {
        &self.receiver
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn inflight_counter(&self) -> &Arc<AtomicUsize> {
        &self.inflight
    }

    pub(crate) fn inflight_limit(&self) -> Option<&Arc<Semaphore>> {
        self.inflight_limit.as_ref()
    }

    pub(crate) fn check_type(&self, payload: &Payload) -> Result<(), BusError> {
        if self.allows(payload.kind()) {
            Ok(())
        } else {
            Err(BusError::TypeNotAllowed {
                channel: self.name.to_string(),
                type_name: payload.kind().name(),
            })
        }
    }

    /// Listener check, capacity check, sequence reservation and enqueue, as
    /// one critical section.
    ///
    /// The sequence counter only advances when the envelope was actually
    /// queued, so accepted messages carry gap-free numbers.
    pub(crate) fn enqueue(
        &self,
        payload: Payload,
        tag: Option<String>,
    ) -> Result<Envelope, BusError> {
        let mut state = self.state.lock();

        if state.draining {
            return Err(BusError::not_found(&self.name));
        }
        if state.listeners.is_empty() {
            return Err(BusError::NoSubscribers {
                channel: self.name.to_string(),
            });
        }
        if self.depth() >= self.capacity {
            return Err(self.full());
        }

        let envelope = Envelope::new(Arc::clone(&self.name), state.next_sequence, tag, payload);
        match self.sender.try_send(envelope.clone()) {
            Ok(()) => {
                state.next_sequence += 1;
                Ok(envelope)
            }
            Err(TrySendError::Full(_)) => Err(self.full()),
            Err(TrySendError::Closed(_)) => Err(BusError::not_found(&self.name)),
        }
    }

    /// Registers a listener and spawns its loop via `spawn`, under the state
    /// lock. Returns the new id and the listener count including it.
    pub(crate) fn register_listener(
        &self,
        spawn: impl FnOnce(ListenerId, CancellationToken) -> JoinHandle<()>,
    ) -> Result<(ListenerId, usize), BusError> {
        let mut state = self.state.lock();
        if state.draining {
            return Err(BusError::not_found(&self.name));
        }

        let id = ListenerId::new(state.next_listener_id);
        state.next_listener_id += 1;

        let cancel = self.shutdown.child_token();
        let join = spawn(id, cancel.clone());
        state.listeners.insert(id, ListenerHandle { cancel, join });

        Ok((id, state.listeners.len()))
    }

    /// Removes a listener. Returns its handle and the remaining count, or
    /// `None` if it was already removed (unsubscribed or drained).
    pub(crate) fn release_listener(&self, id: ListenerId) -> Option<(ListenerHandle, usize)> {
        let mut state = self.state.lock();
        let handle = state.listeners.remove(&id)?;
        Some((handle, state.listeners.len()))
    }

    /// Marks the channel draining and takes every listener handle. `None` if
    /// another destroy got here first.
    pub(crate) fn begin_drain(&self) -> Option<Vec<ListenerHandle>> {
        let mut state = self.state.lock();
        if state.draining {
            return None;
        }
        state.draining = true;
        Some(state.listeners.drain().map(|(_, handle)| handle).collect())
    }

    fn full(&self) -> BusError {
        BusError::Full {
            channel: self.name.to_string(),
            capacity: self.capacity,
        }
    }
}

impl std::fmt::Debug for ChannelDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelDefinition")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("allowed", &self.allowed_types())
            .finish_non_exhaustive()
    }
}

/// Serializable snapshot of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub name: String,
    pub capacity: usize,
    pub depth: usize,
    pub listener_count: usize,
    pub next_sequence: u64,
    pub inflight_callbacks: usize,
    pub draining: bool,
    pub allowed_types: Vec<&'static str>,
}
