//! The bounded buffer: a fixed array of slots shared by producers and
//! consumers.
//!
//! # Discipline
//!
//! - Two counting [`Semaphore`]s gate entry: `free` counts empty slots,
//!   `filled` counts occupied ones. A producer takes a `free` permit before
//!   touching the array and hands a `filled` permit back afterwards; a
//!   consumer does the opposite.
//! - One mutex guards the slot array and its counters. It is only held for a
//!   linear scan and is never held while waiting on a semaphore, so waiting
//!   producers and consumers cannot deadlock each other.
//! - Placement and removal are first-fit: the lowest-index empty (or
//!   occupied) slot wins. Items are not delivered in FIFO order.
//! - Each successful transaction takes a snapshot inside the critical section
//!   and publishes it, together with an [`Activity`], after the lock is
//!   released.
//!
//! # Saturation
//!
//! Item ids come from a counter starting at 1 that stops at the capacity:
//! over the buffer's whole lifetime at most `capacity` items are produced.
//! Once the counter is exhausted [`BoundedBuffer::produce`] is a no-op that
//! neither blocks nor notifies, while consumers keep draining what is left.

mod semaphore;
mod snapshot;

pub use semaphore::Semaphore;
pub use snapshot::{AdmissionTokens, BufferSnapshot, BufferStats};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::events::{Activity, BufferEvent, EventBus, WorkerRole};
use crate::utilities::config::DEFAULT_CAPACITY;
use crate::utilities::errors::{BufferError, ConfigError};

/// Identifier of a produced item. The first item is 1.
pub type ItemId = u64;

/// Identity label of a producer or consumer.
pub type WorkerId = usize;

// ---------------------------------------------------------------------------
// Slot state (guarded by the buffer mutex)
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SlotState {
    slots: Vec<Option<ItemId>>,
    next_item: ItemId,
    sequence: u64,
    placed: u64,
    consumed: u64,
}

impl SlotState {
    fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            next_item: 1,
            sequence: 0,
            placed: 0,
            consumed: 0,
        }
    }

    fn is_saturated(&self) -> bool {
        self.next_item > self.slots.len() as ItemId
    }

    fn claim(&mut self) -> Option<ItemId> {
        if self.is_saturated() {
            return None;
        }
        let item = self.next_item;
        self.next_item += 1;
        Some(item)
    }

    fn place(&mut self, item: ItemId) -> Option<usize> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(item);
        self.placed += 1;
        Some(index)
    }

    fn take(&mut self) -> Option<(usize, ItemId)> {
        let index = self.slots.iter().position(Option::is_some)?;
        let item = self.slots[index].take()?;
        self.consumed += 1;
        Some((index, item))
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            sequence: self.sequence,
            slots: self.slots.clone(),
        }
    }

    fn stats(&self) -> BufferStats {
        BufferStats {
            capacity: self.slots.len(),
            claimed: self.next_item - 1,
            placed: self.placed,
            consumed: self.consumed,
            occupied: self.slots.iter().filter(|slot| slot.is_some()).count(),
        }
    }
}

// ---------------------------------------------------------------------------
// BoundedBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity slot array with semaphore admission control and change
/// notifications.
///
/// Share it between threads with an `Arc`.
#[derive(Debug)]
pub struct BoundedBuffer {
    capacity: usize,
    state: Mutex<SlotState>,
    free: Semaphore,
    filled: Semaphore,
    events: Arc<EventBus>,
}

impl Default for BoundedBuffer {
    /// A buffer of [`DEFAULT_CAPACITY`] slots with its own event bus.
    fn default() -> Self {
        Self::build(DEFAULT_CAPACITY, Arc::new(EventBus::new()))
    }
}

impl BoundedBuffer {
    /// Create a buffer with `capacity` slots and a fresh event bus.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        Self::with_event_bus(capacity, Arc::new(EventBus::new()))
    }

    /// Create a buffer that publishes on an existing event bus.
    pub fn with_event_bus(capacity: usize, events: Arc<EventBus>) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity { capacity });
        }
        Ok(Self::build(capacity, events))
    }

    fn build(capacity: usize, events: Arc<EventBus>) -> Self {
        Self {
            capacity,
            state: Mutex::new(SlotState::new(capacity)),
            free: Semaphore::new(capacity),
            filled: Semaphore::new(0),
            events,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The bus on which this buffer publishes.
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Claim the next item id and place it in the first empty slot.
    ///
    /// Blocks while the buffer is full. Returns `Ok(None)` without blocking
    /// or notifying once the item counter is exhausted.
    pub fn produce(&self, producer_id: WorkerId) -> Result<Option<ItemId>, BufferError> {
        let claimed = self.state.lock().claim();
        let Some(item) = claimed else {
            tracing::trace!(producer_id, "item counter saturated, nothing to produce");
            return Ok(None);
        };
        tracing::debug!(producer_id, item, "claimed item");

        self.free.acquire();
        let placed = {
            let mut state = self.state.lock();
            state.place(item).map(|slot| {
                let sequence = state.next_sequence();
                (slot, sequence, state.snapshot())
            })
        };
        let Some((slot, sequence, snapshot)) = placed else {
            self.free.release();
            tracing::error!(producer_id, item, "free permit granted but no empty slot found");
            return Err(BufferError::SlotAccounting {
                operation: "produce",
                capacity: self.capacity,
            });
        };
        self.filled.release();

        tracing::debug!(producer_id, item, slot, sequence, "placed item");
        self.publish(
            snapshot,
            Activity::new(sequence, WorkerRole::Producer, producer_id, item, slot),
        );
        Ok(Some(item))
    }

    /// Remove the item in the first occupied slot, blocking while the buffer
    /// is empty.
    pub fn consume(&self, consumer_id: WorkerId) -> Result<ItemId, BufferError> {
        self.filled.acquire();
        self.take_admitted(consumer_id)
    }

    /// Like [`consume`](Self::consume), but give up after `timeout`.
    ///
    /// Returns `Ok(None)` if no item became available in time; nothing is
    /// changed or published in that case.
    pub fn consume_timeout(
        &self,
        consumer_id: WorkerId,
        timeout: Duration,
    ) -> Result<Option<ItemId>, BufferError> {
        if !self.filled.acquire_timeout(timeout) {
            tracing::trace!(consumer_id, ?timeout, "no item available before timeout");
            return Ok(None);
        }
        self.take_admitted(consumer_id).map(Some)
    }

    /// Second half of a consume, once a `filled` permit is held.
    fn take_admitted(&self, consumer_id: WorkerId) -> Result<ItemId, BufferError> {
        let taken = {
            let mut state = self.state.lock();
            state.take().map(|(slot, item)| {
                let sequence = state.next_sequence();
                (slot, item, sequence, state.snapshot())
            })
        };
        let Some((slot, item, sequence, snapshot)) = taken else {
            self.filled.release();
            tracing::error!(consumer_id, "filled permit granted but no occupied slot found");
            return Err(BufferError::SlotAccounting {
                operation: "consume",
                capacity: self.capacity,
            });
        };
        self.free.release();

        tracing::debug!(consumer_id, item, slot, sequence, "removed item");
        self.publish(
            snapshot,
            Activity::new(sequence, WorkerRole::Consumer, consumer_id, item, slot),
        );
        Ok(item)
    }

    fn publish(&self, snapshot: BufferSnapshot, activity: Activity) {
        self.events.emit(&BufferEvent::State(snapshot));
        self.events.emit(&BufferEvent::Activity(activity));
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Copy of the slot array as of now.
    pub fn snapshot(&self) -> BufferSnapshot {
        self.state.lock().snapshot()
    }

    /// Counters read in one critical section.
    pub fn stats(&self) -> BufferStats {
        self.state.lock().stats()
    }

    /// Admission permits currently available. See [`AdmissionTokens`] for
    /// when the two counts add up to the capacity.
    pub fn tokens(&self) -> AdmissionTokens {
        AdmissionTokens {
            free: self.free.available(),
            filled: self.filled.available(),
        }
    }

    /// Whether every item id has been claimed.
    pub fn is_saturated(&self) -> bool {
        self.state.lock().is_saturated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventListener;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    fn drain_states(rx: &crossbeam::channel::Receiver<BufferEvent>) -> Vec<String> {
        rx.try_iter()
            .filter_map(|event| match event {
                BufferEvent::State(snapshot) => Some(snapshot.to_string()),
                BufferEvent::Activity(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = BoundedBuffer::new(0).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCapacity { capacity: 0 }));
    }

    #[test]
    fn test_default_capacity() {
        let buffer = BoundedBuffer::default();
        assert_eq!(buffer.capacity(), 20);
        assert_eq!(buffer.tokens(), AdmissionTokens { free: 20, filled: 0 });
        assert!(buffer.snapshot().is_empty());
        assert_eq!(buffer.snapshot().sequence, 0);
    }

    #[test]
    fn test_capacity_three_trace() {
        let buffer = BoundedBuffer::new(3).unwrap();
        let (_id, rx) = buffer.event_bus().subscribe();

        assert_eq!(buffer.produce(1).unwrap(), Some(1));
        assert_eq!(buffer.produce(1).unwrap(), Some(2));
        assert_eq!(buffer.produce(1).unwrap(), Some(3));
        assert_eq!(drain_states(&rx), vec!["[1, -, -]", "[1, 2, -]", "[1, 2, 3]"]);
        assert_eq!(buffer.tokens(), AdmissionTokens { free: 0, filled: 3 });

        // Counter exhausted: further claims are no-ops.
        assert_eq!(buffer.produce(1).unwrap(), None);
        assert!(rx.try_recv().is_err());

        assert_eq!(buffer.consume(1).unwrap(), 1);
        assert_eq!(drain_states(&rx), vec!["[-, 2, 3]"]);

        assert_eq!(buffer.consume(1).unwrap(), 2);
        assert_eq!(buffer.consume(1).unwrap(), 3);
        assert_eq!(drain_states(&rx), vec!["[-, -, 3]", "[-, -, -]"]);

        assert!(buffer.snapshot().is_empty());
        assert_eq!(buffer.tokens(), AdmissionTokens { free: 3, filled: 0 });
    }

    #[test]
    fn test_activity_feed_describes_each_transaction() {
        let buffer = BoundedBuffer::new(2).unwrap();
        let (_id, rx) = buffer.event_bus().subscribe();

        buffer.produce(4).unwrap();
        buffer.consume(7).unwrap();

        let activities: Vec<Activity> = rx
            .try_iter()
            .filter_map(|event| match event {
                BufferEvent::Activity(activity) => Some(activity),
                BufferEvent::State(_) => None,
            })
            .collect();
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].description(), "Producer 4 produced 1");
        assert_eq!(activities[0].sequence, 1);
        assert_eq!(activities[1].description(), "Consumer 7 consumed 1");
        assert_eq!(activities[1].sequence, 2);
        assert_eq!(activities[1].slot, 0);
    }

    #[test]
    fn test_saturation_is_a_silent_no_op() {
        let buffer = BoundedBuffer::new(5).unwrap();
        for expected in 1..=5 {
            assert_eq!(buffer.produce(1).unwrap(), Some(expected));
        }
        assert!(buffer.is_saturated());

        let (_id, rx) = buffer.event_bus().subscribe();
        assert_eq!(buffer.produce(1).unwrap(), None);
        assert!(rx.try_recv().is_err());
        assert_eq!(buffer.snapshot().occupied(), 5);
        assert_eq!(buffer.stats().claimed, 5);
    }

    #[test]
    fn test_saturated_producer_does_not_block_when_full() {
        let buffer = Arc::new(BoundedBuffer::new(2).unwrap());
        buffer.produce(1).unwrap();
        buffer.produce(1).unwrap();

        // The buffer is full and the counter exhausted; this must return.
        let worker = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.produce(2))
        };
        assert_eq!(worker.join().unwrap().unwrap(), None);
    }

    #[test]
    fn test_first_fit_reuses_lowest_slot() {
        let buffer = BoundedBuffer::new(4).unwrap();
        buffer.produce(1).unwrap();
        buffer.produce(1).unwrap();
        buffer.produce(1).unwrap();
        assert_eq!(buffer.consume(1).unwrap(), 1);
        assert_eq!(buffer.snapshot().to_string(), "[-, 2, 3, -]");

        assert_eq!(buffer.produce(1).unwrap(), Some(4));
        assert_eq!(buffer.snapshot().to_string(), "[4, 2, 3, -]");

        // Removal is by slot order, not by item age.
        assert_eq!(buffer.consume(1).unwrap(), 4);
    }

    #[test]
    fn test_consume_timeout_on_empty_buffer() {
        let buffer = BoundedBuffer::new(2).unwrap();
        let (_id, rx) = buffer.event_bus().subscribe();

        let got = buffer.consume_timeout(1, Duration::from_millis(20)).unwrap();
        assert_eq!(got, None);
        assert!(rx.try_recv().is_err());
        assert_eq!(buffer.tokens(), AdmissionTokens { free: 2, filled: 0 });
    }

    #[test]
    fn test_consume_timeout_accepts_unbounded_wait() {
        let buffer = BoundedBuffer::new(2).unwrap();
        assert_eq!(buffer.produce(1).unwrap(), Some(1));

        let got = buffer.consume_timeout(1, Duration::MAX).unwrap();
        assert_eq!(got, Some(1));
        assert_eq!(buffer.tokens(), AdmissionTokens { free: 2, filled: 0 });
    }

    #[test]
    fn test_blocked_consumer_wakes_on_produce() {
        let buffer = Arc::new(BoundedBuffer::new(2).unwrap());
        let consumer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.consume(1))
        };

        thread::sleep(Duration::from_millis(20));
        buffer.produce(1).unwrap();

        assert_eq!(consumer.join().unwrap().unwrap(), 1);
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn test_listener_may_read_buffer_during_emit() {
        struct Reader {
            buffer: parking_lot::Mutex<Option<Arc<BoundedBuffer>>>,
            seen: AtomicUsize,
        }

        impl EventListener for Reader {
            fn on_buffer_state(&self, snapshot: &BufferSnapshot) {
                if let Some(buffer) = self.buffer.lock().as_ref() {
                    // Would deadlock if emission happened under the slot lock.
                    let current = buffer.snapshot();
                    assert!(current.sequence >= snapshot.sequence);
                    self.seen.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let buffer = Arc::new(BoundedBuffer::new(2).unwrap());
        let reader = Arc::new(Reader {
            buffer: parking_lot::Mutex::new(Some(Arc::clone(&buffer))),
            seen: AtomicUsize::new(0),
        });
        buffer.event_bus().register_arc("reader", reader.clone());

        buffer.produce(1).unwrap();
        buffer.consume(1).unwrap();
        assert_eq!(reader.seen.load(Ordering::SeqCst), 2);

        // Break the Arc cycle.
        reader.buffer.lock().take();
    }

    #[test]
    fn test_single_producer_single_consumer_threads_run_to_exhaustion() {
        let buffer = Arc::new(BoundedBuffer::new(3).unwrap());

        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut produced = Vec::new();
                while let Some(item) = buffer.produce(1).unwrap() {
                    produced.push(item);
                }
                produced
            })
        };
        let consumer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || (0..3).map(|_| buffer.consume(1).unwrap()).collect::<Vec<_>>())
        };

        assert_eq!(producer.join().unwrap(), vec![1, 2, 3]);
        assert_eq!(consumer.join().unwrap(), vec![1, 2, 3]);
        assert!(buffer.snapshot().is_empty());
        assert_eq!(buffer.tokens(), AdmissionTokens { free: 3, filled: 0 });
    }

    /// Many producers and consumers against one buffer. Every snapshot must
    /// be internally consistent and the items must be conserved.
    #[test]
    fn test_concurrent_stress_preserves_invariants() {
        const CAPACITY: usize = 256;
        const PRODUCERS: usize = 8;
        const CONSUMERS: usize = 8;

        struct Checker {
            capacity: usize,
            violation: AtomicBool,
            states: AtomicUsize,
        }

        impl EventListener for Checker {
            fn on_buffer_state(&self, snapshot: &BufferSnapshot) {
                let items = snapshot.items();
                let unique: HashSet<_> = items.iter().copied().collect();
                let bad_len = snapshot.capacity() != self.capacity;
                let bad_items = unique.len() != items.len()
                    || items.iter().any(|&item| item == 0 || item > self.capacity as ItemId);
                if bad_len || bad_items {
                    self.violation.store(true, Ordering::SeqCst);
                }
                self.states.fetch_add(1, Ordering::SeqCst);
            }
        }

        let buffer = Arc::new(BoundedBuffer::new(CAPACITY).unwrap());
        let checker = Arc::new(Checker {
            capacity: CAPACITY,
            violation: AtomicBool::new(false),
            states: AtomicUsize::new(0),
        });
        buffer.event_bus().register_arc("checker", checker.clone());

        let consumed_count = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicBool::new(false));

        let sampler = {
            let buffer = Arc::clone(&buffer);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut samples = 0usize;
                while !done.load(Ordering::SeqCst) {
                    let stats = buffer.stats();
                    assert!(stats.occupied <= CAPACITY);
                    assert_eq!(stats.occupied as u64, stats.placed - stats.consumed);
                    assert!(stats.placed <= stats.claimed);
                    assert!(buffer.tokens().total() <= CAPACITY);
                    samples += 1;
                    thread::yield_now();
                }
                samples
            })
        };

        let producers: Vec<_> = (1..=PRODUCERS)
            .map(|id| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    let mut produced = Vec::new();
                    while let Some(item) = buffer.produce(id).unwrap() {
                        produced.push(item);
                        thread::yield_now();
                    }
                    produced
                })
            })
            .collect();

        let consumers: Vec<_> = (1..=CONSUMERS)
            .map(|id| {
                let buffer = Arc::clone(&buffer);
                let consumed_count = Arc::clone(&consumed_count);
                thread::spawn(move || {
                    let mut consumed = Vec::new();
                    while consumed_count.load(Ordering::SeqCst) < CAPACITY {
                        if let Some(item) = buffer
                            .consume_timeout(id, Duration::from_millis(10))
                            .unwrap()
                        {
                            consumed.push(item);
                            consumed_count.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    consumed
                })
            })
            .collect();

        let mut produced = Vec::new();
        for handle in producers {
            let items = handle.join().unwrap();
            // Each producer sees strictly increasing ids.
            assert!(items.windows(2).all(|pair| pair[0] < pair[1]));
            produced.extend(items);
        }
        let mut consumed = Vec::new();
        for handle in consumers {
            consumed.extend(handle.join().unwrap());
        }
        done.store(true, Ordering::SeqCst);
        assert!(sampler.join().unwrap() > 0);

        let expected: Vec<ItemId> = (1..=CAPACITY as ItemId).collect();
        produced.sort_unstable();
        consumed.sort_unstable();
        assert_eq!(produced, expected);
        assert_eq!(consumed, expected);

        assert!(!checker.violation.load(Ordering::SeqCst));
        assert_eq!(checker.states.load(Ordering::SeqCst), 2 * CAPACITY);

        let stats = buffer.stats();
        assert_eq!(stats.claimed, CAPACITY as u64);
        assert_eq!(stats.placed, CAPACITY as u64);
        assert_eq!(stats.consumed, CAPACITY as u64);
        assert_eq!(stats.occupied, 0);
        assert_eq!(
            buffer.tokens(),
            AdmissionTokens {
                free: CAPACITY,
                filled: 0
            }
        );
        assert_eq!(buffer.snapshot().sequence, 2 * CAPACITY as u64);
    }
}
