//! Logical Clock
//!
//! Lamport counter used to order updates from content servers that share
//! no wall clock.
//!
//! ## Classification
//! A received stamp greater than local time is causally after everything the
//! server has seen, so the clock merges it. Anything else (equal, or behind)
//! cannot be told apart from a concurrent event with a scalar counter, so
//! the clock ticks and reports `Concurrent`, leaving the tie to the payload.

use parking_lot::Mutex;

/// How a received stamp relates to local logical time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrdering {
    /// No causal order could be established from the stamp
    Concurrent,

    /// The stamp is ahead of local time
    After,
}

/// Thread-safe Lamport clock
///
/// Every operation runs under the internal mutex. Arithmetic saturates so
/// the value never decreases, even for a hostile `u64::MAX` stamp.
#[derive(Debug, Default)]
pub struct LogicalClock {
    time: Mutex<u64>,
}

impl LogicalClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock at the given time
    pub fn starting_at(time: u64) -> Self {
        Self {
            time: Mutex::new(time),
        }
    }

    /// Advance for a local event, returning the new time
    pub fn tick(&self) -> u64 {
        let mut time = self.time.lock();
        *time = time.saturating_add(1);
        *time
    }

    /// Fold in a stamp known to be causally after local state
    pub fn merge(&self, received: u64) -> u64 {
        let mut time = self.time.lock();
        *time = (*time).max(received).saturating_add(1);
        *time
    }

    /// Classify a received stamp and advance local time accordingly
    pub fn classify(&self, received: u64) -> ClockOrdering {
        let mut time = self.time.lock();
        if received <= *time {
            *time = time.saturating_add(1);
            ClockOrdering::Concurrent
        } else {
            *time = received.saturating_add(1);
            ClockOrdering::After
        }
    }

    /// Current time, without advancing
    pub fn peek(&self) -> u64 {
        *self.time.lock()
    }
}
