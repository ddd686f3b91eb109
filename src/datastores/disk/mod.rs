//! File-backed Datastore
//!
//! One newline-delimited file per table under the configured data directory.
//!
//! ## Responsibilities
//! - Discover table files on open and rebuild each offset index by scanning
//! - Append new records; never disturb existing offsets
//! - Update in place when the encoded line keeps its length, otherwise
//!   tombstone the old line and append the new one
//! - Tombstone deleted records in place
//! - Reclaim tombstoned space on explicit compaction
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ 1\t{"id":1,"name":"A"}\n                 │  live line, index → (0, 23)
//! │ XXXXXXXXXXXXXXXXXXXXXXXX\n               │  tombstone, no index entry
//! │ 3\t{"id":3,"name":"C"}\n                 │  live line
//! │ 2\t{"id":2,"name":"Bigger"}\n            │  record 2 relocated by a grown update
//! └──────────────────────────────────────────┘
//! ```
//!
//! There is no persisted index: the file is authoritative, and the next open
//! recovers purely by rescanning it.

mod line;
mod table;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::datastore::{check_id, Datastore};
use crate::error::{HareError, Result};

use table::{DiskTable, COMPACT_SUFFIX};

/// Space accounting for one table file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableStats {
    /// Number of live records (index entries)
    pub live_records: u64,
    /// Number of tombstoned lines still in the file
    pub tombstones: u64,
    /// Bytes occupied by tombstoned lines
    pub tombstone_bytes: u64,
    /// Total file size in bytes
    pub file_size: u64,
}

impl TableStats {
    /// Fraction of the file occupied by tombstones (0.0 for an empty file)
    pub fn tombstone_ratio(&self) -> f64 {
        if self.file_size == 0 {
            0.0
        } else {
            self.tombstone_bytes as f64 / self.file_size as f64
        }
    }
}

/// Outcome of compacting one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    pub live_records: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

impl CompactionStats {
    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before - self.bytes_after
    }
}

/// Datastore that persists each table as a line-oriented file
///
/// ## Concurrency:
/// - `tables`: registry lock; held briefly to find a table, and for the
///   whole of create/remove/close
/// - each `DiskTable`: shared lock for `ids`/`last_id`/`read_rec`, exclusive
///   lock for insert/update/delete/compact
pub struct Disk {
    config: Config,
    tables: RwLock<HashMap<String, Arc<RwLock<DiskTable>>>>,
}

impl Disk {
    /// Open or create a datastore in `config.data_dir`
    ///
    /// On startup:
    /// 1. Create the data directory if it doesn't exist
    /// 2. Open every file with the configured extension as a table
    /// 3. Scan each file to rebuild its offset index
    /// 4. Create and populate seeded tables that don't exist yet
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let mut tables = HashMap::new();

        for entry in fs::read_dir(&config.data_dir)? {
            let entry = entry?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            if let Some(name) = table_name_from_path(&path, &config.extension) {
                let table = DiskTable::open(&name, &path, config.sync_strategy)?;
                let stats = table.stats();
                tracing::info!(
                    "Opened table {:?}: {} records, {} tombstones, {} bytes",
                    name,
                    stats.live_records,
                    stats.tombstones,
                    stats.file_size
                );
                tables.insert(name, Arc::new(RwLock::new(table)));
            } else if path.extension().is_some_and(|ext| ext == COMPACT_SUFFIX) {
                tracing::warn!(
                    "Ignoring leftover compaction file {}",
                    path.display()
                );
            }
        }

        let disk = Self {
            config,
            tables: RwLock::new(tables),
        };
        disk.apply_seed()?;

        Ok(disk)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Rewrite a table's file without its tombstones
    ///
    /// Holds the table's exclusive lock for the whole rewrite.
    pub fn compact(&self, table: &str) -> Result<CompactionStats> {
        let handle = self.table(table)?;
        let mut guard = handle.write();
        Self::check_open(&guard, table)?;
        guard.compact()
    }

    /// Compact every table, one at a time
    pub fn compact_all(&self) -> Result<Vec<(String, CompactionStats)>> {
        let mut results = Vec::new();
        for name in self.table_names() {
            match self.compact(&name) {
                Ok(stats) => results.push((name, stats)),
                // Removed after the names were listed
                Err(HareError::TableNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// Space accounting for a table
    pub fn stats(&self, table: &str) -> Result<TableStats> {
        let handle = self.table(table)?;
        let guard = handle.read();
        Self::check_open(&guard, table)?;
        Ok(guard.stats())
    }

    /// Path of the file backing `table` (whether or not it exists)
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.{}", table, self.config.extension))
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn apply_seed(&self) -> Result<()> {
        for (table, records) in &self.config.seed {
            if self.table_exists(table) {
                continue;
            }

            self.create_table(table)?;
            for (&id, rec) in records {
                self.insert_rec(table, id, rec)?;
            }
            tracing::debug!("Seeded table {:?} with {} records", table, records.len());
        }
        Ok(())
    }

    fn table(&self, table: &str) -> Result<Arc<RwLock<DiskTable>>> {
        self.tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| HareError::table_not_found(table))
    }

    /// A handle cloned out of the registry may outlive a concurrent
    /// remove/close
    fn check_open(table: &DiskTable, name: &str) -> Result<()> {
        if table.is_closed() {
            return Err(HareError::table_not_found(name));
        }
        Ok(())
    }
}

impl Datastore for Disk {
    fn create_table(&self, table: &str) -> Result<()> {
        validate_table_name(table)?;

        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Err(HareError::table_exists(table));
        }

        let path = self.table_path(table);
        let created = DiskTable::create(table, &path, self.config.sync_strategy)?;
        tables.insert(table.to_string(), Arc::new(RwLock::new(created)));

        tracing::debug!("Created table {:?} at {}", table, path.display());
        Ok(())
    }

    fn remove_table(&self, table: &str) -> Result<()> {
        let mut tables = self.tables.write();
        let handle = tables
            .get(table)
            .cloned()
            .ok_or_else(|| HareError::table_not_found(table))?;

        {
            let mut guard = handle.write();
            guard.destroy()?;
            tracing::debug!("Removed table {:?} ({})", table, guard.path().display());
        }
        tables.remove(table);

        Ok(())
    }

    fn table_exists(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn ids(&self, table: &str) -> Result<Vec<u64>> {
        let handle = self.table(table)?;
        let guard = handle.read();
        Self::check_open(&guard, table)?;
        Ok(guard.ids())
    }

    fn last_id(&self, table: &str) -> Result<u64> {
        let handle = self.table(table)?;
        let guard = handle.read();
        Self::check_open(&guard, table)?;
        Ok(guard.last_id())
    }

    fn insert_rec(&self, table: &str, id: u64, rec: &[u8]) -> Result<()> {
        let handle = self.table(table)?;
        let mut guard = handle.write();
        Self::check_open(&guard, table)?;
        check_id(id)?;
        guard.insert(id, rec)
    }

    fn read_rec(&self, table: &str, id: u64) -> Result<Vec<u8>> {
        let handle = self.table(table)?;
        let guard = handle.read();
        Self::check_open(&guard, table)?;
        guard.read(id)
    }

    fn update_rec(&self, table: &str, id: u64, rec: &[u8]) -> Result<()> {
        let handle = self.table(table)?;
        let mut guard = handle.write();
        Self::check_open(&guard, table)?;
        guard.update(id, rec)
    }

    fn delete_rec(&self, table: &str, id: u64) -> Result<()> {
        let handle = self.table(table)?;
        let mut guard = handle.write();
        Self::check_open(&guard, table)?;
        guard.delete(id)
    }

    fn close(&self) -> Result<()> {
        let mut tables = self.tables.write();

        let mut first_err = None;
        for (name, handle) in tables.drain() {
            if let Err(e) = handle.write().close() {
                tracing::error!("Failed to sync table {:?} on close: {}", name, e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Disk {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Error closing datastore: {}", e);
        }
    }
}

/// Table names become file stems, so they must not escape the data directory
fn validate_table_name(table: &str) -> Result<()> {
    let invalid = table.is_empty()
        || table == "."
        || table == ".."
        || table
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c == '\n');

    if invalid {
        return Err(HareError::InvalidTableName(table.to_string()));
    }
    Ok(())
}

/// "contacts.json" with extension "json" → Some("contacts")
///
/// Matches the whole `.{extension}` suffix, so multi-part extensions such as
/// "tbl.json" round-trip.
fn table_name_from_path(path: &Path, extension: &str) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(extension)?.strip_suffix('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_string())
}
