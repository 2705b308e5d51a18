//! Notification payloads published by the bounded buffer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::buffer::{BufferSnapshot, ItemId, WorkerId};

/// Which side of the buffer a worker sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    Producer,
    Consumer,
}

impl WorkerRole {
    /// Past-tense verb for the role's transaction.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Producer => "produced",
            Self::Consumer => "consumed",
        }
    }

    /// Lowercase label, used in thread names and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Consumer => "consumer",
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => write!(f, "Producer"),
            Self::Consumer => write!(f, "Consumer"),
        }
    }
}

/// One successful produce or consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Sequence of the transaction; matches the snapshot emitted with it.
    pub sequence: u64,
    pub role: WorkerRole,
    pub worker_id: WorkerId,
    pub item: ItemId,
    /// Slot index written or cleared.
    pub slot: usize,
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    /// Build a record stamped with the current time.
    pub fn new(
        sequence: u64,
        role: WorkerRole,
        worker_id: WorkerId,
        item: ItemId,
        slot: usize,
    ) -> Self {
        Self {
            sequence,
            role,
            worker_id,
            item,
            slot,
            timestamp: Utc::now(),
        }
    }

    /// Human-readable line, e.g. `"Producer 1 produced 3"`.
    pub fn description(&self) -> String {
        format!(
            "{} {} {} {}",
            self.role,
            self.worker_id,
            self.role.verb(),
            self.item
        )
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Everything the buffer publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BufferEvent {
    /// The slot array changed; carries a copy of it.
    State(BufferSnapshot),
    /// A worker completed a transaction.
    Activity(Activity),
}

impl BufferEvent {
    pub fn sequence(&self) -> u64 {
        match self {
            Self::State(snapshot) => snapshot.sequence,
            Self::Activity(activity) => activity.sequence,
        }
    }
}
