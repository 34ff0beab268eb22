//! Engine Module
//!
//! The aggregation engine that coordinates all components.
//!
//! ## Responsibilities
//! - Own the logical clock, the aggregation store and persistence
//! - Classify each submission against the clock and apply the conflict policy
//! - Persist accepted updates before they are acknowledged
//! - Evict stale or departing sources and reclaim their files
//! - Reload the last persisted state on startup

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{ClockOrdering, LogicalClock};
use crate::config::Config;
use crate::error::{HubError, Result};
use crate::persist::PersistenceManager;
use crate::store::{
    AggregationStore, ApplyOutcome, Eviction, Observation, SourceId, StoreSnapshot,
};

/// Result of one accepted-or-discarded submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub outcome: ApplyOutcome,
    pub ordering: ClockOrdering,
    pub station_id: String,
}

/// What one retention sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sources evicted from memory
    pub evicted: Vec<SourceId>,

    /// Evicted sources whose file could not be reclaimed
    pub failed: Vec<SourceId>,

    /// The projection file was deleted because nothing is left
    pub projection_removed: bool,
}

/// The aggregation engine
///
/// ## Concurrency Model
///
/// - `clock`: internal mutex, one critical section per operation
/// - `store`: one coarse mutex; persistence writes happen while it is held so
///   on-disk order matches in-memory order
///
/// Lock order is clock before store. The clock lock is released before the
/// store lock is taken, and callers peek the clock only after the store guard
/// is dropped.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Server-wide Lamport clock
    clock: LogicalClock,

    /// Histories and projection
    store: Mutex<AggregationStore>,

    /// On-disk copy of the store
    persistence: PersistenceManager,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config and create the data directory
    /// 2. Load persisted histories and projection (bad files are skipped)
    /// 3. Give every reloaded source a fresh staleness window
    /// 4. Rebuild the store, dropping orphaned projection entries
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let persistence = PersistenceManager::open(&config.data_dir, config.sync_strategy)?;
        let mut loaded = persistence.load(config.history_capacity)?;

        let now = now_millis();
        for history in &mut loaded.histories {
            history.touch(now);
        }

        let store = AggregationStore::restore(
            config.history_capacity,
            config.staleness_threshold.as_millis() as u64,
            loaded.histories,
            loaded.projection,
        );

        info!(
            data_dir = %config.data_dir.display(),
            sources = store.source_count(),
            stations = store.station_count(),
            "Engine opened"
        );

        Ok(Self {
            config,
            clock: LogicalClock::new(),
            store: Mutex::new(store),
            persistence,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    // =========================================================================
    // Submissions
    // =========================================================================

    /// Decode and submit one observation payload
    ///
    /// A missing clock stamp is treated as 0.
    pub fn submit(
        &self,
        source_id: SourceId,
        stamp: Option<u64>,
        body: &[u8],
    ) -> Result<SubmitReceipt> {
        let observation = Observation::from_payload(source_id, body)?;
        self.submit_observation(observation, stamp)
    }

    /// Classify, apply and persist an observation
    ///
    /// Persistence completes before this returns. If either file cannot be
    /// written the update is rolled back, in memory and on disk, and the
    /// error is returned.
    pub fn submit_observation(
        &self,
        observation: Observation,
        stamp: Option<u64>,
    ) -> Result<SubmitReceipt> {
        let source_id = observation.source_id;
        let station_id = observation.station_id.clone();

        let ordering = self.clock.classify(stamp.unwrap_or(0));
        let now = now_millis();

        let mut store = self.store.lock();
        let snapshot = store.snapshot(source_id, &station_id);
        let outcome = store.apply(observation, ordering, now);

        if outcome.is_accepted() {
            if let Err(e) = self.persist_accepted(&store, &snapshot) {
                warn!(
                    source = %source_id,
                    station = %station_id,
                    error = %e,
                    "Failed to persist observation, rolling back"
                );
                store.rollback(snapshot);
                return Err(e);
            }
        }
        drop(store);

        debug!(
            source = %source_id,
            station = %station_id,
            ?ordering,
            ?outcome,
            "Applied observation"
        );

        Ok(SubmitReceipt {
            outcome,
            ordering,
            station_id,
        })
    }

    /// Refresh a source's liveness
    ///
    /// Fails with `NotFound` for a source the store does not know.
    pub fn heartbeat(&self, source_id: SourceId) -> Result<()> {
        let known = self.store.lock().heartbeat(source_id, now_millis());
        if known {
            Ok(())
        } else {
            Err(HubError::NotFound(format!("source {}", source_id)))
        }
    }

    /// Evict a source immediately (idempotent)
    pub fn shutdown_source(&self, source_id: SourceId) -> Result<Eviction> {
        let mut store = self.store.lock();
        let eviction = store.evict(source_id);

        if eviction.existed {
            self.persistence.remove_source(source_id)?;
            self.persistence.sync_projection(store.projection())?;
            info!(
                source = %source_id,
                stations = eviction.stations_removed.len(),
                "Source shut down"
            );
        }

        Ok(eviction)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Latest observation for a station
    pub fn latest(&self, station_id: &str) -> Option<Observation> {
        self.store.lock().latest_for_station(station_id).cloned()
    }

    /// Latest observation across all stations
    pub fn latest_overall(&self) -> Option<Observation> {
        self.store.lock().latest_overall().cloned()
    }

    /// Number of observations held for a source (None if unknown)
    pub fn history_len(&self, source_id: SourceId) -> Option<usize> {
        self.store.lock().history(source_id).map(|history| history.len())
    }

    /// Observations held for a source, most recent first
    pub fn history(&self, source_id: SourceId) -> Vec<Observation> {
        self.store
            .lock()
            .history(source_id)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn source_count(&self) -> usize {
        self.store.lock().source_count()
    }

    pub fn station_count(&self) -> usize {
        self.store.lock().station_count()
    }

    // =========================================================================
    // Retention
    // =========================================================================

    /// Evict every stale source as of now
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(now_millis())
    }

    /// Evict every source stale as of `now` (wall-clock millis)
    ///
    /// A failure reclaiming one file is logged and recorded; it does not
    /// stop the rest of the sweep.
    pub fn sweep_at(&self, now: u64) -> SweepReport {
        let mut report = SweepReport::default();
        let mut store = self.store.lock();

        for source_id in store.stale_sources(now) {
            let eviction = store.evict(source_id);
            info!(
                source = %source_id,
                stations = eviction.stations_removed.len(),
                "Evicted stale source"
            );
            if let Err(e) = self.persistence.remove_source(source_id) {
                warn!(source = %source_id, error = %e, "Failed to reclaim source file");
                report.failed.push(source_id);
            }
            report.evicted.push(source_id);
        }

        if !report.evicted.is_empty() {
            if store.projection().is_empty() {
                match self.persistence.remove_projection() {
                    Ok(removed) => report.projection_removed = removed,
                    Err(e) => warn!(error = %e, "Failed to remove projection file"),
                }
            } else if let Err(e) = self.persistence.write_projection(store.projection()) {
                warn!(error = %e, "Failed to rewrite projection file");
            }
        }

        report
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Write the source's history, then the projection
    ///
    /// If the projection write fails the source file is put back to its
    /// previous content so both files keep describing the same state.
    fn persist_accepted(&self, store: &AggregationStore, snapshot: &StoreSnapshot) -> Result<()> {
        let source_id = snapshot.source_id();
        if let Some(history) = store.history(source_id) {
            self.persistence.write_source(history)?;
        }

        if let Err(e) = self.persistence.write_projection(store.projection()) {
            let restored = match snapshot.history() {
                Some(previous) => self.persistence.write_source(previous).map(|_| ()),
                None => self.persistence.remove_source(source_id).map(|_| ()),
            };
            if let Err(restore_err) = restored {
                warn!(source = %source_id, error = %restore_err, "Failed to restore source file");
            }
            return Err(e);
        }

        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }
}

/// Wall-clock milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
