//! Configuration for segkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, SegKvError};

/// Main configuration for a segkv store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the segment files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── segment-0
    ///     ├── segment-1
    ///     └── ...
    pub data_dir: PathBuf,

    /// Size (in bytes) at which the active segment is rotated
    pub max_segment_size: u64,

    /// Sync strategy: how often to fsync the active segment
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Write Serializer Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the write request queue (`None` = unbounded)
    pub write_queue_capacity: Option<usize>,
}

/// Segment sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced appends (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./segkv_data"),
            max_segment_size: 10 * 1024 * 1024, // 10 MB
            sync_strategy: SyncStrategy::EveryWrite,
            write_queue_capacity: Some(1024),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(SegKvError::Config(
                "max_segment_size must be greater than zero".to_string(),
            ));
        }
        if self.write_queue_capacity == Some(0) {
            return Err(SegKvError::Config(
                "write_queue_capacity must be greater than zero".to_string(),
            ));
        }
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(SegKvError::Config(
                "sync count must be greater than zero".to_string(),
            ));
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
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the segment rotation threshold (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the write queue capacity (`None` for an unbounded queue)
    pub fn write_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.config.write_queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
