//! Counting semaphore used for buffer admission control.
//!
//! A semaphore holds a number of permits. [`Semaphore::acquire`] takes one,
//! blocking while none are available; [`Semaphore::release`] returns one and
//! wakes a single waiter. The bounded buffer keeps two of them: one counting
//! free slots and one counting filled slots.
//!
//! The permit count lives behind its own lock, distinct from the lock that
//! guards the slot array, so a thread can wait here without holding the slot
//! lock.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Counting semaphore built on a mutex-protected counter and a condition
/// variable.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Take one permit, blocking until one is available.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Take one permit, waiting at most `timeout`.
    ///
    /// Returns `false` if the deadline passed with no permit available; the
    /// count is left untouched in that case. A timeout too large to express
    /// as a deadline waits without one.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.acquire();
            return true;
        };
        let mut permits = self.permits.lock();
        while *permits == 0 {
            if self.available.wait_until(&mut permits, deadline).timed_out() {
                // A release may have landed right at the deadline.
                if *permits == 0 {
                    return false;
                }
                break;
            }
        }
        *permits -= 1;
        true
    }

    /// Return one permit and wake one waiter.
    pub fn release(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.available.notify_one();
    }

    /// Number of permits available at this instant.
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}
