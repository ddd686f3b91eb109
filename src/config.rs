//! Configuration for HareDB
//!
//! Centralized configuration with sensible defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Initial table contents: table name → record id → payload
pub type SeedData = BTreeMap<String, BTreeMap<u64, Vec<u8>>>;

/// Main configuration for a file-backed datastore
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all table files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── contacts.json          (one file per table)
    ///     └── contacts.json.compact  (only while a compaction is running)
    pub data_dir: PathBuf,

    /// File extension identifying table files inside `data_dir`
    pub extension: String,

    /// How often table files are fsynced
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Seed Configuration
    // -------------------------------------------------------------------------
    /// Records loaded into tables that do not exist yet at open time
    pub seed: SeedData,
}

/// Table file sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every mutation (safest, slowest)
    EveryWrite,

    /// fsync on close and after compaction only
    OnClose,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./hare_data"),
            extension: "json".to_string(),
            sync_strategy: SyncStrategy::OnClose,
            seed: SeedData::new(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all table files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the table file extension (without the leading dot)
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.config.extension = ext.into();
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Replace the whole seed dataset
    pub fn seed(mut self, seed: SeedData) -> Self {
        self.config.seed = seed;
        self
    }

    /// Add one seed record
    pub fn seed_record(
        mut self,
        table: impl Into<String>,
        id: u64,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        self.config
            .seed
            .entry(table.into())
            .or_default()
            .insert(id, payload.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
