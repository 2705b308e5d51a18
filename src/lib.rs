//! # bounded-buffer
//!
//! Bounded-buffer synchronization for any number of producer and consumer
//! threads sharing a fixed array of slots.
//!
//! The core is [`BoundedBuffer`]: two counting semaphores admit producers
//! while free slots remain and consumers while filled slots remain, a mutex
//! serializes access to the slot array, and every successful transaction is
//! published to listeners as a slot snapshot plus an activity record.
//! Around it sit thin worker loops, a run supervisor, and a console front
//! end.

pub mod buffer;
pub mod cli;
pub mod events;
pub mod render;
pub mod run;
pub mod utilities;
pub mod workers;

pub use buffer::{AdmissionTokens, BoundedBuffer, BufferSnapshot, BufferStats, ItemId, WorkerId};
pub use events::{Activity, BufferEvent, EventBus, EventListener, ListenerId, WorkerRole};
pub use run::{Run, RunSummary};
pub use utilities::config::RunConfig;
pub use utilities::errors::{BufferError, ConfigError, RunError};
pub use workers::{Consumer, Producer, StopToken, WorkerReport};
