//! Producer and consumer workers.
//!
//! A worker is an identity plus a pacing interval, looping over one buffer
//! operation until its [`StopToken`] fires. Workers never detect exhaustion
//! themselves: a producer keeps calling `produce` after saturation (each call
//! a no-op), and a consumer keeps waiting for items that may never come.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::buffer::{BoundedBuffer, ItemId, WorkerId};
use crate::events::WorkerRole;
use crate::utilities::errors::BufferError;

// ---------------------------------------------------------------------------
// StopToken
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StopState {
    stopped: Mutex<bool>,
    changed: Condvar,
}

/// Shared cancellation flag.
///
/// Clones observe the same flag. Sleeping through [`StopToken::sleep`] ends
/// early as soon as the token is stopped.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<StopState>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal every holder of this token and wake all sleepers.
    pub fn stop(&self) {
        let mut stopped = self.inner.stopped.lock();
        *stopped = true;
        self.inner.changed.notify_all();
    }

    /// Whether [`StopToken::stop`] has been called on any clone.
    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock()
    }

    /// Sleep for up to `duration`. Returns `true` if the token is stopped.
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut stopped = self.inner.stopped.lock();
        if !*stopped && !duration.is_zero() {
            // Spurious wakeups are tolerated: the worker loop re-checks.
            self.inner.changed.wait_for(&mut stopped, duration);
        }
        *stopped
    }

    /// Block until the token is stopped.
    pub fn wait(&self) {
        let mut stopped = self.inner.stopped.lock();
        while !*stopped {
            self.inner.changed.wait(&mut stopped);
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerReport
// ---------------------------------------------------------------------------

/// What one worker did before it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub role: WorkerRole,
    pub worker_id: WorkerId,
    /// Items placed (producer) or removed (consumer), in order.
    pub items: Vec<ItemId>,
}

impl WorkerReport {
    fn new(role: WorkerRole, worker_id: WorkerId) -> Self {
        Self {
            role,
            worker_id,
            items: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// Calls [`BoundedBuffer::produce`] once per interval.
#[derive(Debug, Clone)]
pub struct Producer {
    pub id: WorkerId,
    pub interval: Duration,
}

impl Producer {
    pub fn new(id: WorkerId, interval: Duration) -> Self {
        Self { id, interval }
    }

    /// Run until `stop` fires.
    pub fn run(
        &self,
        buffer: &BoundedBuffer,
        stop: &StopToken,
    ) -> Result<WorkerReport, BufferError> {
        let mut report = WorkerReport::new(WorkerRole::Producer, self.id);
        tracing::debug!(producer_id = self.id, "producer started");

        while !stop.is_stopped() {
            if let Some(item) = buffer.produce(self.id)? {
                report.items.push(item);
            }
            if stop.sleep(self.interval) {
                break;
            }
        }

        tracing::debug!(producer_id = self.id, produced = report.items.len(), "producer stopped");
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Calls [`BoundedBuffer::consume`] once per interval.
///
/// The wait for an item is cut into `poll` sized slices so the stop token is
/// seen even while the buffer stays empty.
#[derive(Debug, Clone)]
pub struct Consumer {
    pub id: WorkerId,
    pub interval: Duration,
    pub poll: Duration,
}

impl Consumer {
    pub fn new(id: WorkerId, interval: Duration, poll: Duration) -> Self {
        Self { id, interval, poll }
    }

    /// Run until `stop` fires.
    pub fn run(
        &self,
        buffer: &BoundedBuffer,
        stop: &StopToken,
    ) -> Result<WorkerReport, BufferError> {
        let mut report = WorkerReport::new(WorkerRole::Consumer, self.id);
        tracing::debug!(consumer_id = self.id, "consumer started");

        'pacing: while !stop.sleep(self.interval) {
            loop {
                if let Some(item) = buffer.consume_timeout(self.id, self.poll)? {
                    report.items.push(item);
                    break;
                }
                if stop.is_stopped() {
                    break 'pacing;
                }
            }
        }

        tracing::debug!(consumer_id = self.id, consumed = report.items.len(), "consumer stopped");
        Ok(report)
    }
}
