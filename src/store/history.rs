//! Per-source bounded history
//!
//! Most-recent-first ring of the observations one content server submitted.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::{Observation, SourceId};

/// Bounded, most-recent-first history for one source
///
/// `last_seen` (wall-clock millis) is the only staleness signal; it is
/// refreshed by accepted updates, discarded updates and heartbeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHistory {
    source_id: SourceId,
    entries: VecDeque<Observation>,
    capacity: usize,
    last_seen: u64,
}

impl SourceHistory {
    /// Create an empty history
    pub fn new(source_id: SourceId, capacity: usize, now: u64) -> Self {
        Self {
            source_id,
            entries: VecDeque::with_capacity(capacity),
            capacity,
            last_seen: now,
        }
    }

    /// Insert at the front, dropping the oldest entry past capacity
    pub fn push(&mut self, observation: Observation, now: u64) {
        debug_assert_eq!(observation.source_id, self.source_id);
        self.entries.push_front(observation);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
        self.touch(now);
    }

    /// Refresh liveness; never moves `last_seen` backwards
    pub fn touch(&mut self, now: u64) {
        self.last_seen = self.last_seen.max(now);
    }

    /// Silent for strictly longer than `threshold_ms`
    pub fn is_stale(&self, now: u64, threshold_ms: u64) -> bool {
        now.saturating_sub(self.last_seen) > threshold_ms
    }

    /// Change capacity, truncating the oldest entries if needed
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.entries.truncate(capacity);
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&Observation> {
        self.entries.front()
    }

    /// Entries, most recent first
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.entries.iter()
    }
}
