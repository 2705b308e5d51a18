//! Notifications published by the bounded buffer.
//!
//! Every successful produce or consume yields two events: a copy of the slot
//! array ([`BufferEvent::State`]) and a description of the transaction
//! ([`BufferEvent::Activity`]). Listeners receive them through an
//! [`EventBus`], either by implementing [`EventListener`] or by subscribing
//! to a channel.

/// Listener registry and dispatch.
pub mod event_bus;

/// Listener trait and the channel-backed listener.
pub mod listener;

/// Event payloads.
pub mod types;

pub use event_bus::{EventBus, ListenerId};
pub use listener::{ChannelListener, EventListener};
pub use types::{Activity, BufferEvent, WorkerRole};
