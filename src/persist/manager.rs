//! Persistence Manager
//!
//! Owns the on-disk copy of the aggregation state.
//!
//! ## Responsibilities
//! - Discover and decode record files on startup
//! - Overwrite a source's file with its full history after each accepted update
//! - Overwrite the projection file with the full projection
//! - Reclaim files of evicted sources

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::SyncStrategy;
use crate::error::Result;
use crate::store::{Observation, SourceHistory, SourceId};

use super::format;

/// State recovered from disk
#[derive(Debug, Default)]
pub struct LoadedState {
    pub histories: Vec<SourceHistory>,
    pub projection: Vec<Observation>,

    /// Files that could not be used
    pub skipped: usize,
}

/// Reads and writes record files under the data directory
///
/// Holds no mutable state; callers serialize writes (the engine does so
/// under its store lock).
#[derive(Debug)]
pub struct PersistenceManager {
    /// Root data directory
    data_dir: PathBuf,

    /// One history file per source
    sources_dir: PathBuf,

    /// Single projection file
    projection_path: PathBuf,

    sync_strategy: SyncStrategy,
}

impl PersistenceManager {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const SOURCES_DIR: &'static str = "sources";
    const PROJECTION_FILENAME: &'static str = "stations.weather";
    const RECORD_EXTENSION: &'static str = "weather";
    const TEMP_EXTENSION: &'static str = "tmp";

    /// Open or create the directory layout
    pub fn open(data_dir: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let sources_dir = data_dir.join(Self::SOURCES_DIR);
        fs::create_dir_all(&sources_dir)?;

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            projection_path: data_dir.join(Self::PROJECTION_FILENAME),
            sources_dir,
            sync_strategy,
        })
    }

    /// Decode everything on disk
    ///
    /// Unusable files are skipped with a warning and never fail the load.
    /// Histories longer than `capacity` are truncated.
    pub fn load(&self, capacity: usize) -> Result<LoadedState> {
        let mut state = LoadedState::default();

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&self.sources_dir)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            if path.extension().is_some_and(|ext| ext == Self::TEMP_EXTENSION) {
                debug!(path = %path.display(), "Removing leftover temporary file");
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
                }
                continue;
            }

            match self.load_source(&path) {
                Ok(mut history) => {
                    history.set_capacity(capacity);
                    state.histories.push(history);
                }
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "Skipping source file");
                    state.skipped += 1;
                }
            }
        }

        match fs::read(&self.projection_path) {
            Ok(bytes) => match format::decode_projection(&bytes) {
                Ok(projection) => state.projection = projection,
                Err(e) => {
                    warn!(path = %self.projection_path.display(), error = %e, "Skipping projection file");
                    state.skipped += 1;
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.projection_path.display(), error = %e, "Skipping projection file");
                state.skipped += 1;
            }
        }

        info!(
            sources = state.histories.len(),
            stations = state.projection.len(),
            skipped = state.skipped,
            "Loaded persisted state"
        );

        Ok(state)
    }

    /// Overwrite a source's file with its full history
    ///
    /// Returns true if the file did not exist before.
    pub fn write_source(&self, history: &SourceHistory) -> Result<bool> {
        let path = self.source_path(history.source_id());
        let created = !path.exists();
        let bytes = format::encode_history(history)?;
        self.write_atomic(&path, &bytes)?;
        Ok(created)
    }

    /// Overwrite the projection file
    pub fn write_projection(&self, projection: &BTreeMap<String, Observation>) -> Result<()> {
        let bytes = format::encode_projection(projection.values())?;
        self.write_atomic(&self.projection_path, &bytes)
    }

    /// Write the projection, or delete its file when the projection is empty
    pub fn sync_projection(&self, projection: &BTreeMap<String, Observation>) -> Result<()> {
        if projection.is_empty() {
            self.remove_projection()?;
            Ok(())
        } else {
            self.write_projection(projection)
        }
    }

    /// Delete a source's file; a missing file is not an error
    ///
    /// Returns true if a file was removed.
    pub fn remove_source(&self, source_id: SourceId) -> Result<bool> {
        remove_if_exists(&self.source_path(source_id))
    }

    /// Delete the projection file; a missing file is not an error
    pub fn remove_projection(&self) -> Result<bool> {
        remove_if_exists(&self.projection_path)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn projection_path(&self) -> &Path {
        &self.projection_path
    }

    /// Path of the history file for a source
    pub fn source_path(&self, source_id: SourceId) -> PathBuf {
        self.sources_dir
            .join(format!("{}.{}", source_id, Self::RECORD_EXTENSION))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Decode a source file, checking it against its name
    fn load_source(&self, path: &Path) -> std::result::Result<SourceHistory, String> {
        if !path.extension().is_some_and(|ext| ext == Self::RECORD_EXTENSION) {
            return Err("unexpected extension".to_string());
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source_id = SourceId::parse(&stem).map_err(|e| e.to_string())?;

        let bytes = fs::read(path).map_err(|e| e.to_string())?;
        let history = format::decode_history(&bytes).map_err(|e| e.to_string())?;

        if history.source_id() != source_id {
            return Err(format!(
                "record belongs to {}, file is named for {}",
                history.source_id(),
                source_id
            ));
        }
        Ok(history)
    }

    /// Write to a sibling temporary file, then rename over the target
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp_path = path.with_extension(format!(
            "{}.{}",
            Self::RECORD_EXTENSION,
            Self::TEMP_EXTENSION
        ));

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(bytes)?;
            if self.sync_strategy == SyncStrategy::EveryWrite {
                file.sync_all()?;
            }
        }

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
