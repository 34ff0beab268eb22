//! Aggregation store
//!
//! Per-source histories plus the per-station projection, and the conflict
//! policy that decides whether an incoming observation replaces what a
//! station currently shows.
//!
//! Not internally synchronized: the engine owns the store behind one mutex.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::clock::ClockOrdering;

use super::{Observation, SourceHistory, SourceId};

/// Result of applying one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Accepted; first accepted write from a source with no history
    Created,

    /// Accepted from a source already known
    Updated,

    /// Superseded by what the station already shows
    Discarded,
}

impl ApplyOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, ApplyOutcome::Discarded)
    }
}

/// What an eviction removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub source_id: SourceId,

    /// Whether the source had a history
    pub existed: bool,

    /// Stations whose projection entry belonged to the source
    pub stations_removed: Vec<String>,
}

/// The parts of the store one `apply` can change, as they were before it
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    source_id: SourceId,
    history: Option<SourceHistory>,
    station_id: String,
    projected: Option<Observation>,
}

impl StoreSnapshot {
    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    /// The source's history before the update (None if it was unknown)
    pub fn history(&self) -> Option<&SourceHistory> {
        self.history.as_ref()
    }
}

/// In-memory aggregation state
#[derive(Debug)]
pub struct AggregationStore {
    /// One bounded history per known source
    histories: HashMap<SourceId, SourceHistory>,

    /// Authoritative observation per station
    projection: BTreeMap<String, Observation>,

    /// Capacity given to new histories
    capacity: usize,

    /// Silence (ms) after which a source is stale
    staleness_ms: u64,
}

impl AggregationStore {
    /// Create an empty store
    pub fn new(capacity: usize, staleness_ms: u64) -> Self {
        Self {
            histories: HashMap::new(),
            projection: BTreeMap::new(),
            capacity,
            staleness_ms,
        }
    }

    /// Rebuild a store from persisted state
    ///
    /// Histories are trimmed to `capacity`. Projection entries whose source
    /// has no history are dropped.
    pub fn restore(
        capacity: usize,
        staleness_ms: u64,
        histories: impl IntoIterator<Item = SourceHistory>,
        projection: impl IntoIterator<Item = Observation>,
    ) -> Self {
        let mut store = Self::new(capacity, staleness_ms);

        for mut history in histories {
            history.set_capacity(capacity);
            store.histories.insert(history.source_id(), history);
        }

        for observation in projection {
            if !store.histories.contains_key(&observation.source_id) {
                warn!(
                    station = %observation.station_id,
                    source = %observation.source_id,
                    "Dropping projection entry with no owning source"
                );
                continue;
            }
            store
                .projection
                .insert(observation.station_id.clone(), observation);
        }

        store
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Apply an observation under the conflict policy
    ///
    /// - station not projected yet: accept
    /// - `After`: accept
    /// - `Concurrent`: accept only if strictly later in event time
    ///
    /// A discarded update from a known source still counts as liveness.
    pub fn apply(
        &mut self,
        observation: Observation,
        ordering: ClockOrdering,
        now: u64,
    ) -> ApplyOutcome {
        let source_id = observation.source_id;
        let known = self.histories.contains_key(&source_id);

        let accept = match self.projection.get(&observation.station_id) {
            None => true,
            Some(current) => {
                ordering == ClockOrdering::After || observation.event_time > current.event_time
            }
        };

        if !accept {
            if let Some(history) = self.histories.get_mut(&source_id) {
                history.touch(now);
            }
            debug!(
                source = %source_id,
                station = %observation.station_id,
                "Discarded superseded observation"
            );
            return ApplyOutcome::Discarded;
        }

        let capacity = self.capacity;
        self.projection
            .insert(observation.station_id.clone(), observation.clone());
        self.histories
            .entry(source_id)
            .or_insert_with(|| SourceHistory::new(source_id, capacity, now))
            .push(observation, now);

        if known {
            ApplyOutcome::Updated
        } else {
            ApplyOutcome::Created
        }
    }

    /// Capture what an `apply` for this source and station may change
    pub fn snapshot(&self, source_id: SourceId, station_id: &str) -> StoreSnapshot {
        StoreSnapshot {
            source_id,
            history: self.histories.get(&source_id).cloned(),
            station_id: station_id.to_string(),
            projected: self.projection.get(station_id).cloned(),
        }
    }

    /// Put back the state captured by `snapshot`
    pub fn rollback(&mut self, snapshot: StoreSnapshot) {
        match snapshot.history {
            Some(history) => {
                self.histories.insert(snapshot.source_id, history);
            }
            None => {
                self.histories.remove(&snapshot.source_id);
            }
        }
        match snapshot.projected {
            Some(observation) => {
                self.projection.insert(snapshot.station_id, observation);
            }
            None => {
                self.projection.remove(&snapshot.station_id);
            }
        }
    }

    /// Refresh liveness without touching data; false for an unknown source
    pub fn heartbeat(&mut self, source_id: SourceId, now: u64) -> bool {
        match self.histories.get_mut(&source_id) {
            Some(history) => {
                history.touch(now);
                true
            }
            None => false,
        }
    }

    /// Remove a source and every projection entry it owns (idempotent)
    pub fn evict(&mut self, source_id: SourceId) -> Eviction {
        let existed = self.histories.remove(&source_id).is_some();

        let stations_removed: Vec<String> = self
            .projection
            .iter()
            .filter(|(_, observation)| observation.source_id == source_id)
            .map(|(station, _)| station.clone())
            .collect();
        for station in &stations_removed {
            self.projection.remove(station);
        }

        Eviction {
            source_id,
            existed,
            stations_removed,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Sources silent for longer than the staleness threshold
    pub fn stale_sources(&self, now: u64) -> Vec<SourceId> {
        let mut stale: Vec<SourceId> = self
            .histories
            .values()
            .filter(|history| history.is_stale(now, self.staleness_ms))
            .map(|history| history.source_id())
            .collect();
        stale.sort();
        stale
    }

    pub fn latest_for_station(&self, station_id: &str) -> Option<&Observation> {
        self.projection.get(station_id)
    }

    /// Projected observation with the greatest event time
    ///
    /// Equal event times resolve to the lexicographically smallest station id.
    pub fn latest_overall(&self) -> Option<&Observation> {
        self.projection.values().max_by(|a, b| {
            a.event_time
                .cmp(&b.event_time)
                .then_with(|| b.station_id.cmp(&a.station_id))
        })
    }

    pub fn history(&self, source_id: SourceId) -> Option<&SourceHistory> {
        self.histories.get(&source_id)
    }

    pub fn contains_source(&self, source_id: SourceId) -> bool {
        self.histories.contains_key(&source_id)
    }

    /// Station projection in station-id order
    pub fn projection(&self) -> &BTreeMap<String, Observation> {
        &self.projection
    }

    pub fn histories(&self) -> impl Iterator<Item = &SourceHistory> {
        self.histories.values()
    }

    pub fn source_count(&self) -> usize {
        self.histories.len()
    }

    pub fn station_count(&self) -> usize {
        self.projection.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn staleness_ms(&self) -> u64 {
        self.staleness_ms
    }
}
