//! Listener registry and dispatch for buffer notifications.
//!
//! The bus is owned by a [`BoundedBuffer`](crate::buffer::BoundedBuffer).
//! Emission happens on the worker thread that completed a transaction, after
//! the buffer lock is released, so a listener may call back into the buffer
//! without deadlocking. The listener list is copied under a read lock and the
//! listeners are invoked outside it, so registration from inside a listener
//! is also safe.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver};
use parking_lot::RwLock;

use super::listener::{ChannelListener, EventListener};
use super::types::BufferEvent;

// ---------------------------------------------------------------------------
// ListenerId
// ---------------------------------------------------------------------------

static LISTENER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Handle returned on registration; used to unregister.
#[derive(Clone)]
pub struct ListenerId {
    /// Human-readable name, used in log messages.
    pub name: String,
    id: u64,
}

impl ListenerId {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: LISTENER_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({}:{})", self.id, self.name)
    }
}

impl PartialEq for ListenerId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for ListenerId {}

impl std::hash::Hash for ListenerId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    listener: Arc<dyn EventListener>,
}

/// Thread-safe set of listeners for one buffer.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<ListenerEntry>>,
    shutting_down: AtomicBool,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("shutting_down", &self.is_shut_down())
            .finish()
    }
}

impl EventBus {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn register(
        &self,
        name: impl Into<String>,
        listener: impl EventListener + 'static,
    ) -> ListenerId {
        self.register_arc(name, Arc::new(listener))
    }

    /// Register a listener the caller keeps a handle to.
    pub fn register_arc(
        &self,
        name: impl Into<String>,
        listener: Arc<dyn EventListener>,
    ) -> ListenerId {
        let id = ListenerId::new(name);
        self.listeners.write().push(ListenerEntry {
            id: id.clone(),
            listener,
        });
        tracing::debug!(listener = ?id, "registered buffer listener");
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unregister(&self, id: &ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|entry| entry.id != *id);
        listeners.len() != before
    }

    /// Subscribe through an unbounded channel.
    ///
    /// Dropping the receiver closes the subscription; it is pruned on the
    /// next emission.
    pub fn subscribe(&self) -> (ListenerId, Receiver<BufferEvent>) {
        let (sender, receiver) = unbounded();
        let id = self.register("channel", ChannelListener::new(sender));
        (id, receiver)
    }

    /// Number of registered listeners, subscriptions included.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver an event to every listener.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still receive the event and the emitting worker carries on.
    pub fn emit(&self, event: &BufferEvent) {
        if self.is_shut_down() {
            tracing::trace!(sequence = event.sequence(), "event bus shut down, dropping event");
            return;
        }

        let entries: Vec<ListenerEntry> = self.listeners.read().clone();
        if entries.is_empty() {
            return;
        }

        let mut saw_closed = false;
        for entry in &entries {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                entry.listener.on_event(event);
            }));
            if let Err(panic) = result {
                tracing::error!(
                    listener = ?entry.id,
                    payload = panic_message(panic.as_ref()),
                    "buffer listener panicked"
                );
            }
            saw_closed |= entry.listener.is_closed();
        }

        if saw_closed {
            self.listeners.write().retain(|entry| {
                let keep = !entry.listener.is_closed();
                if !keep {
                    tracing::debug!(listener = ?entry.id, "pruning closed buffer listener");
                }
                keep
            });
        }
    }

    /// Drop every listener and ignore later emissions.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.listeners.write().clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
