//! Store Module
//!
//! In-memory aggregation state.
//!
//! ## Responsibilities
//! - Bounded per-source history (most recent first)
//! - Per-station projection of the authoritative observation
//! - Conflict policy between concurrently arriving updates
//! - Staleness detection and eviction
//!
//! ## Data Structure Choice
//! - `HashMap<SourceId, SourceHistory>`: sources are only looked up by id
//! - `BTreeMap<String, Observation>`: stable station order for persistence
//!   and tie-breaking

mod aggregate;
mod history;
mod observation;

pub use aggregate::{AggregationStore, ApplyOutcome, Eviction, StoreSnapshot};
pub use history::SourceHistory;
pub use observation::{
    event_time_millis, parse_record, zone_offset, Observation, SourceId, FIELD_LOCAL_TIME,
    FIELD_STATION_ID, FIELD_TIME_ZONE,
};
