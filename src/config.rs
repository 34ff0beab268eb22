//! Configuration for weatherhub
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HubError, Result};

/// Main configuration for a weatherhub aggregation server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── stations.weather     (station projection)
    ///     └── sources/             (one history file per content server)
    pub data_dir: PathBuf,

    /// Sync strategy: whether to fsync record files before they replace the old copy
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Aggregation Configuration
    // -------------------------------------------------------------------------
    /// Number of observations retained per content server
    pub history_capacity: usize,

    /// A source with no traffic for longer than this is evicted
    pub staleness_threshold: Duration,

    /// How often the retention sweeper runs
    pub sweep_interval: Duration,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Worker pool size (max concurrently served connections)
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

/// Record file sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync every record file before renaming it into place (safest, slowest)
    EveryWrite,

    /// Leave flushing to the OS; the rename is still atomic
    OsBuffered,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./weatherhub_data"),
            sync_strategy: SyncStrategy::EveryWrite,
            history_capacity: 20,
            staleness_threshold: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(15),
            listen_addr: "127.0.0.1:4567".to_string(),
            max_connections: 10,
            read_timeout_ms: 30_000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(HubError::Config("history_capacity must be at least 1".to_string()));
        }
        if self.max_connections == 0 {
            return Err(HubError::Config("max_connections must be at least 1".to_string()));
        }
        if self.sweep_interval.is_zero() {
            return Err(HubError::Config("sweep_interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the record sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the per-source history capacity
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    /// Set the staleness threshold
    pub fn staleness_threshold(mut self, threshold: Duration) -> Self {
        self.config.staleness_threshold = threshold;
        self
    }

    /// Set the retention sweep period
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the worker pool size
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
