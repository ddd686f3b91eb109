//! Datastore Backends
//!
//! Two interchangeable implementations of [`Datastore`](crate::Datastore):
//!
//! - [`Ram`] — tables held in process memory; nothing persists. Used for
//!   tests and ephemeral data.
//! - [`Disk`] — one line-oriented file per table, an in-memory offset index
//!   rebuilt by scanning each file at open, tombstone-and-append mutation and
//!   explicit compaction.

pub mod disk;
pub mod ram;

pub use disk::{Disk, TableStats};
pub use ram::Ram;
