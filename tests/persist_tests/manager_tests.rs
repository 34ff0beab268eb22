//! Tests for PersistenceManager
//!
//! These tests verify:
//! - Directory layout on open
//! - Write / load of histories and the projection
//! - Skip-and-warn handling of bad files
//! - File reclamation

use std::collections::BTreeMap;
use std::fs;

use tempfile::TempDir;
use weatherhub::config::SyncStrategy;
use weatherhub::persist::{encode_projection, PersistenceManager};
use weatherhub::store::{Observation, SourceHistory, SourceId};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_manager() -> (TempDir, PersistenceManager) {
    let temp_dir = TempDir::new().unwrap();
    let manager = PersistenceManager::open(temp_dir.path(), SyncStrategy::EveryWrite).unwrap();
    (temp_dir, manager)
}

fn observation(source_id: SourceId, station: &str, event_time: i64) -> Observation {
    Observation {
        source_id,
        station_id: station.to_string(),
        payload: format!("{{\n  \"id\": \"{}\"\n}}", station),
        event_time,
    }
}

fn history_with(source_id: SourceId, stations: &[&str]) -> SourceHistory {
    let mut history = SourceHistory::new(source_id, 20, 1_000);
    for (i, station) in stations.iter().enumerate() {
        history.push(observation(source_id, station, i as i64), 1_000);
    }
    history
}

fn projection_of(entries: &[Observation]) -> BTreeMap<String, Observation> {
    entries
        .iter()
        .map(|o| (o.station_id.clone(), o.clone()))
        .collect()
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_open_creates_sources_dir() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("hub");

    let manager = PersistenceManager::open(&data_dir, SyncStrategy::OsBuffered).unwrap();

    assert!(data_dir.join("sources").is_dir());
    assert_eq!(manager.projection_path(), data_dir.join("stations.weather"));
}

#[test]
fn test_source_path_uses_uuid() {
    let (temp, manager) = setup_temp_manager();
    let id = SourceId::parse("5b0f6c2e-8d1e-4a51-9f5a-3c0a2b7d9e11").unwrap();

    assert_eq!(
        manager.source_path(id),
        temp.path()
            .join("sources")
            .join("5b0f6c2e-8d1e-4a51-9f5a-3c0a2b7d9e11.weather")
    );
}

// =============================================================================
// Write / Load Tests
// =============================================================================

#[test]
fn test_load_empty_dir() {
    let (_temp, manager) = setup_temp_manager();
    let state = manager.load(20).unwrap();

    assert!(state.histories.is_empty());
    assert!(state.projection.is_empty());
    assert_eq!(state.skipped, 0);
}

#[test]
fn test_write_then_load() {
    let (_temp, manager) = setup_temp_manager();
    let a = SourceId::new_random();
    let history = history_with(a, &["X1", "X2"]);
    let projection = projection_of(&[observation(a, "X1", 0), observation(a, "X2", 1)]);

    assert!(manager.write_source(&history).unwrap());
    manager.write_projection(&projection).unwrap();

    let state = manager.load(20).unwrap();
    assert_eq!(state.histories, vec![history]);
    assert_eq!(state.projection.len(), 2);
    assert_eq!(state.projection[0].station_id, "X1");
}

#[test]
fn test_write_source_reports_creation_once() {
    let (_temp, manager) = setup_temp_manager();
    let history = history_with(SourceId::new_random(), &["X1"]);

    assert!(manager.write_source(&history).unwrap());
    assert!(!manager.write_source(&history).unwrap());
}

#[test]
fn test_overwrite_replaces_whole_record() {
    let (_temp, manager) = setup_temp_manager();
    let a = SourceId::new_random();

    manager.write_source(&history_with(a, &["X1", "X2", "X3"])).unwrap();
    manager.write_source(&history_with(a, &["Y1"])).unwrap();

    let state = manager.load(20).unwrap();
    assert_eq!(state.histories.len(), 1);
    assert_eq!(state.histories[0].len(), 1);
    assert_eq!(state.histories[0].latest().unwrap().station_id, "Y1");
}

#[test]
fn test_load_truncates_to_capacity() {
    let (_temp, manager) = setup_temp_manager();
    let a = SourceId::new_random();
    manager
        .write_source(&history_with(a, &["A", "B", "C", "D"]))
        .unwrap();

    let state = manager.load(2).unwrap();
    let stations: Vec<&str> = state.histories[0]
        .iter()
        .map(|o| o.station_id.as_str())
        .collect();
    assert_eq!(stations, vec!["D", "C"]);
}

#[test]
fn test_no_temp_files_left_behind() {
    let (temp, manager) = setup_temp_manager();
    let a = SourceId::new_random();
    manager.write_source(&history_with(a, &["X1"])).unwrap();
    manager
        .write_projection(&projection_of(&[observation(a, "X1", 0)]))
        .unwrap();

    let leftovers: Vec<_> = fs::read_dir(temp.path().join("sources"))
        .unwrap()
        .chain(fs::read_dir(temp.path()).unwrap())
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "found {:?}", leftovers);
}

// =============================================================================
// Skip-and-Warn Tests
// =============================================================================

#[test]
fn test_load_skips_bad_files() {
    let (temp, manager) = setup_temp_manager();
    let sources = temp.path().join("sources");
    let good = SourceId::new_random();
    manager.write_source(&history_with(good, &["X1"])).unwrap();

    // Unparsable name
    fs::write(sources.join("not-a-uuid.weather"), b"whatever").unwrap();
    // Wrong extension
    fs::write(sources.join(format!("{}.json", SourceId::new_random())), b"{}").unwrap();
    // Garbage content under a valid name
    fs::write(
        sources.join(format!("{}.weather", SourceId::new_random())),
        b"garbage",
    )
    .unwrap();

    let state = manager.load(20).unwrap();
    assert_eq!(state.histories.len(), 1);
    assert_eq!(state.histories[0].source_id(), good);
    assert_eq!(state.skipped, 3);
}

#[test]
fn test_load_skips_record_filed_under_other_source() {
    let (_temp, manager) = setup_temp_manager();
    let real = SourceId::new_random();
    let impostor = SourceId::new_random();
    manager.write_source(&history_with(real, &["X1"])).unwrap();

    fs::rename(manager.source_path(real), manager.source_path(impostor)).unwrap();

    let state = manager.load(20).unwrap();
    assert!(state.histories.is_empty());
    assert_eq!(state.skipped, 1);
}

#[test]
fn test_load_skips_wrong_record_kind() {
    let (_temp, manager) = setup_temp_manager();
    let a = SourceId::new_random();
    let bytes = encode_projection(&[observation(a, "X1", 0)]).unwrap();
    fs::write(manager.source_path(a), bytes).unwrap();

    let state = manager.load(20).unwrap();
    assert!(state.histories.is_empty());
    assert_eq!(state.skipped, 1);
}

#[test]
fn test_load_skips_corrupt_projection() {
    let (_temp, manager) = setup_temp_manager();
    let a = SourceId::new_random();
    manager
        .write_projection(&projection_of(&[observation(a, "X1", 0)]))
        .unwrap();

    let mut bytes = fs::read(manager.projection_path()).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x5A;
    fs::write(manager.projection_path(), bytes).unwrap();

    let state = manager.load(20).unwrap();
    assert!(state.projection.is_empty());
    assert_eq!(state.skipped, 1);
}

#[test]
fn test_load_removes_leftover_temp_files() {
    let (temp, manager) = setup_temp_manager();
    let tmp = temp
        .path()
        .join("sources")
        .join(format!("{}.weather.tmp", SourceId::new_random()));
    fs::write(&tmp, b"partial").unwrap();

    let state = manager.load(20).unwrap();
    assert_eq!(state.skipped, 0);
    assert!(!tmp.exists());
}

// =============================================================================
// Reclamation Tests
// =============================================================================

#[test]
fn test_remove_source_is_idempotent() {
    let (_temp, manager) = setup_temp_manager();
    let a = SourceId::new_random();
    manager.write_source(&history_with(a, &["X1"])).unwrap();

    assert!(manager.remove_source(a).unwrap());
    assert!(!manager.remove_source(a).unwrap());
    assert!(!manager.source_path(a).exists());
}

#[test]
fn test_sync_projection_deletes_when_empty() {
    let (_temp, manager) = setup_temp_manager();
    let a = SourceId::new_random();

    manager
        .sync_projection(&projection_of(&[observation(a, "X1", 0)]))
        .unwrap();
    assert!(manager.projection_path().exists());

    manager.sync_projection(&BTreeMap::new()).unwrap();
    assert!(!manager.projection_path().exists());
    assert!(!manager.remove_projection().unwrap());
}
