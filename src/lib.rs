//! # HareDB
//!
//! An embedded, file-backed record store with:
//! - One newline-delimited file per table
//! - An in-memory offset index rebuilt by scanning each file on open
//! - Tombstone-and-append updates that never shift other records
//! - Explicit, crash-safe compaction
//! - An in-memory backend behind the same interface
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Database<D: Datastore>                     │
//! │          (typed records, JSON, id assignment)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Datastore trait (bytes keyed by u64)
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────────┐
//!   │     Ram     │          │      Disk       │
//!   │  (BTreeMap) │          │ (file per table)│
//!   └─────────────┘          └────────┬────────┘
//!                                     │
//!                                     ▼
//!                            ┌─────────────────┐
//!                            │   DiskTable     │
//!                            │ offset index +  │
//!                            │ tombstones      │
//!                            └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod database;
pub mod datastore;
pub mod datastores;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, SeedData, SyncStrategy};
pub use database::{Database, Record};
pub use datastore::Datastore;
pub use datastores::disk::CompactionStats;
pub use datastores::{Disk, Ram, TableStats};
pub use error::{HareError, Result};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of HareDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
