//! Database Module
//!
//! Typed records on top of any [`Datastore`].
//!
//! ## Responsibilities
//! - Marshal records to compact JSON (one object per line on disk)
//! - Assign sequential ids from the datastore's last id
//! - Build queries by enumerating ids and reading each record

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::datastore::Datastore;
use crate::error::{HareError, Result};

/// A struct that can be stored in a table.
///
/// The id lives inside the record; [`Database::create`] assigns it.
pub trait Record: Serialize + DeserializeOwned {
    fn id(&self) -> u64;

    fn set_id(&mut self, id: u64);
}

/// Typed access to the tables of a datastore
pub struct Database<D: Datastore> {
    store: D,

    /// Serializes id assignment so concurrent creates never pick the same id
    create_lock: Mutex<()>,
}

impl<D: Datastore> Database<D> {
    pub fn new(store: D) -> Self {
        Self {
            store,
            create_lock: Mutex::new(()),
        }
    }

    /// The underlying datastore
    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn into_store(self) -> D {
        self.store
    }

    // =========================================================================
    // Table Management
    // =========================================================================

    pub fn create_table(&self, table: &str) -> Result<()> {
        self.store.create_table(table)
    }

    pub fn drop_table(&self, table: &str) -> Result<()> {
        self.store.remove_table(table)
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.store.table_exists(table)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.store.table_names()
    }

    pub fn close(&self) -> Result<()> {
        self.store.close()
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Insert `rec` under the next free id, write that id into `rec`, and
    /// return it.
    pub fn create<R: Record>(&self, table: &str, rec: &mut R) -> Result<u64> {
        let _guard = self.create_lock.lock();

        let id = self
            .store
            .last_id(table)?
            .checked_add(1)
            .ok_or_else(|| {
                HareError::InvalidRecord(format!("table {:?} has no ids left", table))
            })?;
        rec.set_id(id);

        let bytes = serde_json::to_vec(rec)?;
        self.store.insert_rec(table, id, &bytes)?;

        tracing::trace!("Created record {} in {:?}", id, table);
        Ok(id)
    }

    /// Load the record stored under `id`
    pub fn find<R: Record>(&self, table: &str, id: u64) -> Result<R> {
        let bytes = self.store.read_rec(table, id)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Overwrite the stored record whose id matches `rec.id()`
    pub fn update<R: Record>(&self, table: &str, rec: &R) -> Result<()> {
        let bytes = serde_json::to_vec(rec)?;
        self.store.update_rec(table, rec.id(), &bytes)
    }

    /// Delete the record stored under `id`
    pub fn destroy(&self, table: &str, id: u64) -> Result<()> {
        self.store.delete_rec(table, id)
    }

    /// All live ids, ascending
    pub fn ids(&self, table: &str) -> Result<Vec<u64>> {
        self.store.ids(table)
    }

    /// Records matching `predicate`, in id order, stopping after `limit`
    /// matches when one is given.
    pub fn query<R, F>(&self, table: &str, predicate: F, limit: Option<usize>) -> Result<Vec<R>>
    where
        R: Record,
        F: Fn(&R) -> bool,
    {
        let mut results = Vec::new();

        for id in self.store.ids(table)? {
            if limit.is_some_and(|max| results.len() >= max) {
                break;
            }

            // Deleted between listing and reading
            let rec: R = match self.find(table, id) {
                Ok(rec) => rec,
                Err(HareError::RecordNotFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            if predicate(&rec) {
                results.push(rec);
            }
        }

        Ok(results)
    }
}
