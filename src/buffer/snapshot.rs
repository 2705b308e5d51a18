//! Point-in-time views of a bounded buffer.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ItemId;

/// Owned copy of the slot array, taken inside the buffer's critical section.
///
/// `sequence` numbers successful transactions on one buffer starting at 1, so
/// a listener receiving snapshots from several threads can tell which one is
/// newest. A snapshot taken before any transaction has sequence 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSnapshot {
    pub sequence: u64,
    pub slots: Vec<Option<ItemId>>,
}

impl BufferSnapshot {
    /// Number of slots, occupied or not.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Items currently held, in slot order.
    pub fn items(&self) -> Vec<ItemId> {
        self.slots.iter().flatten().copied().collect()
    }
}

/// Renders as `[1, 2, -]`, with `-` for an empty slot.
impl fmt::Display for BufferSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, slot) in self.slots.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            match slot {
                Some(item) => write!(f, "{}", item)?,
                None => write!(f, "-")?,
            }
        }
        write!(f, "]")
    }
}

/// Admission permits available at one instant.
///
/// The two counts are read one after the other, so while a transaction is in
/// flight their sum can be one short of capacity per in-flight operation. At
/// quiescent points `free + filled == capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionTokens {
    pub free: usize,
    pub filled: usize,
}

impl AdmissionTokens {
    /// Sum of both counts; equals the capacity when no transaction is in flight.
    pub fn total(&self) -> usize {
        self.free + self.filled
    }
}

/// Counters read together in one critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStats {
    pub capacity: usize,
    /// Item ids handed out so far.
    pub claimed: u64,
    /// Items written into a slot so far.
    pub placed: u64,
    /// Items removed from a slot so far.
    pub consumed: u64,
    /// Slots currently holding an item.
    pub occupied: usize,
}
