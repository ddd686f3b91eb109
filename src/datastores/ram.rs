//! In-memory Datastore
//!
//! Each table is a `BTreeMap<u64, Vec<u8>>` behind its own `RwLock`, so the
//! map already provides identifier lookup and no offset index is needed.
//!
//! ## Concurrency:
//! - `tables`: registry lock, held only long enough to find/add/remove a table
//! - each `RamTable`: shared for reads, exclusive for mutations

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::SeedData;
use crate::datastore::{check_id, Datastore};
use crate::error::{HareError, Result};

/// A single in-memory table
#[derive(Debug, Default)]
struct RamTable {
    records: BTreeMap<u64, Vec<u8>>,

    /// Running maximum of inserted ids, never decremented
    last_id: u64,
}

/// Datastore that keeps every table in process memory
#[derive(Debug, Default)]
pub struct Ram {
    tables: RwLock<HashMap<String, Arc<RwLock<RamTable>>>>,
}

impl Ram {
    /// Create an empty in-memory datastore
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a datastore pre-populated with `seed`
    pub fn with_seed(seed: SeedData) -> Result<Self> {
        let ram = Self::new();

        for (table, records) in seed {
            ram.create_table(&table)?;
            for (id, rec) in records {
                ram.insert_rec(&table, id, &rec)?;
            }
        }

        Ok(ram)
    }

    fn table(&self, table: &str) -> Result<Arc<RwLock<RamTable>>> {
        self.tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| HareError::table_not_found(table))
    }
}

impl Datastore for Ram {
    fn create_table(&self, table: &str) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Err(HareError::table_exists(table));
        }

        tables.insert(table.to_string(), Arc::default());
        tracing::debug!("Created in-memory table {:?}", table);

        Ok(())
    }

    fn remove_table(&self, table: &str) -> Result<()> {
        self.tables
            .write()
            .remove(table)
            .map(|_| tracing::debug!("Removed in-memory table {:?}", table))
            .ok_or_else(|| HareError::table_not_found(table))
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
        let table = self.table(table)?;
        let ids = table.read().records.keys().copied().collect();
        Ok(ids)
    }

    fn last_id(&self, table: &str) -> Result<u64> {
        let table = self.table(table)?;
        let last_id = table.read().last_id;
        Ok(last_id)
    }

    fn insert_rec(&self, table: &str, id: u64, rec: &[u8]) -> Result<()> {
        let handle = self.table(table)?;
        check_id(id)?;

        let mut guard = handle.write();
        if guard.records.contains_key(&id) {
            return Err(HareError::record_exists(table, id));
        }

        guard.records.insert(id, rec.to_vec());
        guard.last_id = guard.last_id.max(id);

        Ok(())
    }

    fn read_rec(&self, table: &str, id: u64) -> Result<Vec<u8>> {
        let handle = self.table(table)?;
        let guard = handle.read();

        guard
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| HareError::record_not_found(table, id))
    }

    fn update_rec(&self, table: &str, id: u64, rec: &[u8]) -> Result<()> {
        let handle = self.table(table)?;
        let mut guard = handle.write();

        match guard.records.get_mut(&id) {
            Some(existing) => {
                *existing = rec.to_vec();
                Ok(())
            }
            None => Err(HareError::record_not_found(table, id)),
        }
    }

    fn delete_rec(&self, table: &str, id: u64) -> Result<()> {
        let handle = self.table(table)?;
        let mut guard = handle.write();

        guard
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| HareError::record_not_found(table, id))
    }

    fn close(&self) -> Result<()> {
        self.tables.write().clear();
        Ok(())
    }
}
