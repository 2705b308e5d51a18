//! Listener trait for buffer notifications.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::Sender;

use super::types::{Activity, BufferEvent};
use crate::buffer::BufferSnapshot;

/// Receives the buffer's two notification feeds.
///
/// Both methods default to no-ops so implementors pick the feed they need.
/// They run on the worker thread that completed the transaction, after the
/// buffer's lock has been released; they should return quickly.
pub trait EventListener: Send + Sync {
    /// Called with a copy of the slot array after every successful
    /// transaction.
    fn on_buffer_state(&self, _snapshot: &BufferSnapshot) {}

    /// Called after every successful transaction with a description of it.
    fn on_activity(&self, _activity: &Activity) {}

    /// A closed listener is dropped from the bus after the next emission.
    fn is_closed(&self) -> bool {
        false
    }

    /// Route an event to the matching feed.
    fn on_event(&self, event: &BufferEvent) {
        match event {
            BufferEvent::State(snapshot) => self.on_buffer_state(snapshot),
            BufferEvent::Activity(activity) => self.on_activity(activity),
        }
    }
}

/// Forwards every event into a crossbeam channel.
///
/// Once the receiving side is dropped the listener reports itself closed.
pub struct ChannelListener {
    sender: Sender<BufferEvent>,
    closed: AtomicBool,
}

impl ChannelListener {
    pub fn new(sender: Sender<BufferEvent>) -> Self {
        Self {
            sender,
            closed: AtomicBool::new(false),
        }
    }

    fn forward(&self, event: BufferEvent) {
        if self.sender.send(event).is_err() {
            self.closed.store(true, Ordering::Release);
        }
    }
}

impl EventListener for ChannelListener {
    fn on_buffer_state(&self, snapshot: &BufferSnapshot) {
        self.forward(BufferEvent::State(snapshot.clone()));
    }

    fn on_activity(&self, activity: &Activity) {
        self.forward(BufferEvent::Activity(activity.clone()));
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
