//! Datastore Contract
//!
//! The storage abstraction every backend implements: table management,
//! identifier enumeration, and per-record CRUD on opaque byte strings keyed by
//! integer identifier.
//!
//! ## Error Contract
//! Both backends report the same four conditions for the same situations:
//! - `TableNotFound` — any per-table operation on an unknown table
//! - `TableExists` — `create_table` on a known name
//! - `RecordNotFound` — read/update/delete of an absent id
//! - `RecordExists` — insert of an id already present
//!
//! ## Concurrency
//! All methods take `&self`. Implementations serialize mutations per table and
//! let reads of the same table proceed concurrently with each other.

use std::sync::Arc;

use crate::error::Result;

/// Table management and record CRUD over byte payloads.
pub trait Datastore: Send + Sync {
    /// Create an empty table.
    fn create_table(&self, table: &str) -> Result<()>;

    /// Destroy a table and its storage.
    fn remove_table(&self, table: &str) -> Result<()>;

    /// Whether a table with this name exists.
    fn table_exists(&self, table: &str) -> bool;

    /// Names of all known tables, sorted.
    fn table_names(&self) -> Vec<String>;

    /// All live record ids in the table, sorted ascending.
    fn ids(&self, table: &str) -> Result<Vec<u64>>;

    /// Highest id ever inserted into the table (0 if none).
    ///
    /// Deleting a record never lowers this value.
    fn last_id(&self, table: &str) -> Result<u64>;

    /// Store a new record under `id`.
    fn insert_rec(&self, table: &str, id: u64, rec: &[u8]) -> Result<()>;

    /// Fetch the payload stored under `id`.
    fn read_rec(&self, table: &str, id: u64) -> Result<Vec<u8>>;

    /// Replace the payload stored under `id`.
    fn update_rec(&self, table: &str, id: u64, rec: &[u8]) -> Result<()>;

    /// Remove the record stored under `id`.
    fn delete_rec(&self, table: &str, id: u64) -> Result<()>;

    /// Release all resources. Every later per-table call fails with
    /// `TableNotFound`. Calling it twice is fine.
    fn close(&self) -> Result<()>;
}

/// Forward the contract through a smart pointer so `Arc<dyn Datastore>` and
/// `Box<dyn Datastore>` can be handed to a `Database`
macro_rules! forward_datastore {
    ($ptr:ident) => {
        impl<D: Datastore + ?Sized> Datastore for $ptr<D> {
            fn create_table(&self, table: &str) -> Result<()> {
                (**self).create_table(table)
            }

            fn remove_table(&self, table: &str) -> Result<()> {
                (**self).remove_table(table)
            }

            fn table_exists(&self, table: &str) -> bool {
                (**self).table_exists(table)
            }

            fn table_names(&self) -> Vec<String> {
                (**self).table_names()
            }

            fn ids(&self, table: &str) -> Result<Vec<u64>> {
                (**self).ids(table)
            }

            fn last_id(&self, table: &str) -> Result<u64> {
                (**self).last_id(table)
            }

            fn insert_rec(&self, table: &str, id: u64, rec: &[u8]) -> Result<()> {
                (**self).insert_rec(table, id, rec)
            }

            fn read_rec(&self, table: &str, id: u64) -> Result<Vec<u8>> {
                (**self).read_rec(table, id)
            }

            fn update_rec(&self, table: &str, id: u64, rec: &[u8]) -> Result<()> {
                (**self).update_rec(table, id, rec)
            }

            fn delete_rec(&self, table: &str, id: u64) -> Result<()> {
                (**self).delete_rec(table, id)
            }

            fn close(&self) -> Result<()> {
                (**self).close()
            }
        }
    };
}

forward_datastore!(Arc);
forward_datastore!(Box);

/// Reject the reserved id 0.
pub(crate) fn check_id(id: u64) -> Result<()> {
    if id == 0 {
        return Err(crate::HareError::InvalidRecord(
            "record id 0 is reserved".to_string(),
        ));
    }
    Ok(())
}
