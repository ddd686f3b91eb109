//! File-backed table
//!
//! Owns one table file, the offset index built by scanning it, and the
//! tombstone bookkeeping. All methods assume the caller holds the table lock:
//! `&self` methods under a shared lock, `&mut self` methods under an
//! exclusive one.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::{HareError, Result};

use super::line::{self, Line};
use super::{CompactionStats, TableStats};

/// Suffix appended to a table file's name while it is being compacted
pub(crate) const COMPACT_SUFFIX: &str = "compact";

/// Location of one live line in the table file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndexEntry {
    /// Byte offset of the first byte of the line
    pub offset: u64,
    /// Line length including the terminator
    pub len: u64,
}

pub(crate) struct DiskTable {
    name: String,
    path: PathBuf,
    file: File,

    /// id → line location, for every live line
    index: BTreeMap<u64, IndexEntry>,

    /// Highest id seen on a live line at open, or inserted since
    last_id: u64,

    /// Current length of the file; appends land here
    file_len: u64,

    tombstones: u64,
    tombstone_bytes: u64,

    sync_strategy: SyncStrategy,

    /// Set once the table is removed or the datastore closed. Handles cloned
    /// out of the registry before that point must not touch the file.
    closed: bool,

    /// Cut the next append short after this many bytes and fail it
    #[cfg(test)]
    fail_append_after: Option<usize>,
}

impl DiskTable {
    /// Create a new, empty table file. Fails with `TableExists` if the file
    /// is already there.
    pub fn create(name: &str, path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => HareError::table_exists(name),
                _ => HareError::Io(e),
            })?;

        Ok(Self::with_file(name, path, file, sync_strategy))
    }

    /// Open an existing table file and rebuild its index by scanning it
    pub fn open(name: &str, path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut table = Self::with_file(name, path, file, sync_strategy);
        table.scan()?;

        Ok(table)
    }

    fn with_file(name: &str, path: &Path, file: File, sync_strategy: SyncStrategy) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            file,
            index: BTreeMap::new(),
            last_id: 0,
            file_len: 0,
            tombstones: 0,
            tombstone_bytes: 0,
            sync_strategy,
            closed: false,
            #[cfg(test)]
            fail_append_after: None,
        }
    }

    // =========================================================================
    // Scan
    // =========================================================================

    /// Read the file once, front to back, and rebuild the offset index.
    ///
    /// Tombstones are counted and skipped. Any line that is neither a
    /// tombstone nor a well-formed live line fails the open, including an
    /// unterminated final line left by an interrupted append.
    fn scan(&mut self) -> Result<()> {
        let mut reader = BufReader::new(&self.file);
        reader.seek(SeekFrom::Start(0))?;

        let mut index = BTreeMap::new();
        let mut last_id = 0;
        let mut tombstones = 0;
        let mut tombstone_bytes = 0;
        let mut offset = 0u64;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let n = reader.read_until(line::TERMINATOR, &mut buf)?;
            if n == 0 {
                break;
            }
            let len = n as u64;

            match line::parse(&buf) {
                Ok(Line::Tombstone) => {
                    tombstones += 1;
                    tombstone_bytes += len;
                }
                Ok(Line::Live { id, .. }) => {
                    if index.insert(id, IndexEntry { offset, len }).is_some() {
                        return Err(HareError::corruption(
                            &self.name,
                            offset,
                            format!("duplicate record id {}", id),
                        ));
                    }
                    last_id = last_id.max(id);
                }
                Err(reason) => return Err(HareError::corruption(&self.name, offset, reason)),
            }

            offset += len;
        }

        self.index = index;
        self.last_id = last_id;
        self.file_len = offset;
        self.tombstones = tombstones;
        self.tombstone_bytes = tombstone_bytes;

        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ids(&self) -> Vec<u64> {
        self.index.keys().copied().collect()
    }

    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            live_records: self.index.len() as u64,
            tombstones: self.tombstones,
            tombstone_bytes: self.tombstone_bytes,
            file_size: self.file_len,
        }
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Append a new line for `id`
    pub fn insert(&mut self, id: u64, payload: &[u8]) -> Result<()> {
        if self.index.contains_key(&id) {
            return Err(HareError::record_exists(&self.name, id));
        }

        let encoded = line::encode(id, payload)?;
        let entry = self.append(&encoded)?;
        self.index.insert(id, entry);
        self.last_id = self.last_id.max(id);
        self.maybe_sync()?;

        tracing::trace!("Inserted record {} into {:?} at {}", id, self.name, entry.offset);
        Ok(())
    }

    /// Read the payload of `id`
    pub fn read(&self, id: u64) -> Result<Vec<u8>> {
        let entry = *self
            .index
            .get(&id)
            .ok_or_else(|| HareError::record_not_found(&self.name, id))?;

        let raw = self.read_line(entry)?;
        match line::parse(&raw) {
            Ok(Line::Live { id: found, payload }) if found == id => Ok(payload.to_vec()),
            Ok(_) => Err(HareError::corruption(
                &self.name,
                entry.offset,
                format!("index entry for record {} points at another line", id),
            )),
            Err(reason) => Err(HareError::corruption(&self.name, entry.offset, reason)),
        }
    }

    /// Overwrite `id` in place when the line length is unchanged, otherwise
    /// tombstone the old line and append the new one.
    pub fn update(&mut self, id: u64, payload: &[u8]) -> Result<()> {
        let entry = *self
            .index
            .get(&id)
            .ok_or_else(|| HareError::record_not_found(&self.name, id))?;

        let encoded = line::encode(id, payload)?;

        if encoded.len() as u64 == entry.len {
            self.write_at(entry.offset, &encoded)?;
        } else {
            self.bury(id, entry)?;
            let relocated = self.append(&encoded)?;
            self.index.insert(id, relocated);

            tracing::debug!(
                "Relocated record {} in {:?}: {}+{} -> {}+{}",
                id,
                self.name,
                entry.offset,
                entry.len,
                relocated.offset,
                relocated.len
            );
        }

        self.maybe_sync()
    }

    /// Tombstone the line of `id`
    pub fn delete(&mut self, id: u64) -> Result<()> {
        let entry = *self
            .index
            .get(&id)
            .ok_or_else(|| HareError::record_not_found(&self.name, id))?;

        self.bury(id, entry)?;
        self.maybe_sync()?;

        tracing::trace!("Deleted record {} from {:?}", id, self.name);
        Ok(())
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    /// Rewrite the file with live lines only, in their current order.
    ///
    /// The new content goes to a sibling file that is synced and then renamed
    /// over the table file, so an interrupted compaction leaves the original
    /// untouched. The index is swapped only after the rename succeeds.
    pub fn compact(&mut self) -> Result<CompactionStats> {
        let tmp_path = compaction_path(&self.path);
        let bytes_before = self.file_len;

        let result = self.write_compacted(&tmp_path);
        let (file, index, file_len) = match result {
            Ok(parts) => parts,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        // The renamed handle now refers to the table file
        self.file = file;
        self.index = index;
        self.file_len = file_len;
        self.tombstones = 0;
        self.tombstone_bytes = 0;

        sync_parent_dir(&self.path)?;

        let stats = CompactionStats {
            live_records: self.index.len() as u64,
            bytes_before,
            bytes_after: file_len,
        };

        tracing::info!(
            "Compacted {:?}: {} records, {} -> {} bytes",
            self.name,
            stats.live_records,
            stats.bytes_before,
            stats.bytes_after
        );

        Ok(stats)
    }

    fn write_compacted(&self, tmp_path: &Path) -> Result<(File, BTreeMap<u64, IndexEntry>, u64)> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(tmp_path)?;

        // Index order is by id; file order is by offset
        let mut live: Vec<(u64, IndexEntry)> =
            self.index.iter().map(|(&id, &entry)| (id, entry)).collect();
        live.sort_by_key(|(_, entry)| entry.offset);

        let mut writer = BufWriter::new(file);
        let mut index = BTreeMap::new();
        let mut offset = 0u64;

        for (id, entry) in live {
            let raw = self.read_line(entry)?;
            writer.write_all(&raw)?;
            index.insert(id, IndexEntry { offset, len: entry.len });
            offset += entry.len;
        }

        writer.flush()?;
        let file = writer.into_inner().map_err(|e| HareError::Io(e.into_error()))?;
        file.sync_all()?;

        Ok((file, index, offset))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush file contents to disk
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Sync and mark closed; later operations on this handle are refused
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sync()
    }

    /// Mark closed and delete the file
    pub fn destroy(&mut self) -> Result<()> {
        fs::remove_file(&self.path)?;
        self.closed = true;
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Replace the line at `entry` with a same-length tombstone and drop its
    /// index entry
    fn bury(&mut self, id: u64, entry: IndexEntry) -> Result<()> {
        self.write_at(entry.offset, &line::tombstone(entry.len as usize))?;
        self.index.remove(&id);
        self.tombstones += 1;
        self.tombstone_bytes += entry.len;
        Ok(())
    }

    /// Write `encoded` at the end of the file. A failed write is cut back
    /// off so the file still ends on a complete line.
    fn append(&mut self, encoded: &[u8]) -> Result<IndexEntry> {
        let entry = IndexEntry {
            offset: self.file_len,
            len: encoded.len() as u64,
        };

        if let Err(e) = self.write_tail(entry.offset, encoded) {
            if let Err(trunc) = self.file.set_len(self.file_len) {
                tracing::error!(
                    "Failed to truncate {:?} back to {} bytes: {}",
                    self.name,
                    self.file_len,
                    trunc
                );
            }
            return Err(e);
        }

        self.file_len += entry.len;
        Ok(entry)
    }

    #[cfg(not(test))]
    fn write_tail(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.write_at(offset, bytes)
    }

    #[cfg(test)]
    fn write_tail(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        match self.fail_append_after.take() {
            Some(n) => {
                self.write_at(offset, &bytes[..n.min(bytes.len())])?;
                Err(io::Error::new(ErrorKind::WriteZero, "short write").into())
            }
            None => self.write_at(offset, bytes),
        }
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    fn read_line(&self, entry: IndexEntry) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; entry.len as usize];
        read_exact_at(&self.file, &mut buf, entry.offset)?;
        Ok(buf)
    }

    fn maybe_sync(&self) -> Result<()> {
        if self.sync_strategy == SyncStrategy::EveryWrite {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

/// `contacts.json` → `contacts.json.compact`
pub(crate) fn compaction_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(COMPACT_SUFFIX);
    PathBuf::from(name)
}

/// Persist a rename by syncing the directory that holds `path`
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

/// Positional read; leaves the file cursor alone so shared readers don't race
#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
