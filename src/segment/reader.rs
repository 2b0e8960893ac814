//! Segment read side
//!
//! Holds a segment's index and serves point reads from its file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::entry::{Entry, LEN_PREFIX_SIZE};
use crate::error::{Result, SegKvError};

use super::{RecoveryResult, SegmentRecovery};

/// One segment file and its key → offset index
///
/// ## Concurrency:
/// - `index`: RwLock held only for the lookup or the insert, never across I/O
/// - `size`: Atomic, advanced by the writer after each append
/// - Reads open their own file handle, so readers never share a cursor
pub struct Segment {
    /// Numeric id parsed from the file name
    id: u64,

    /// Path to the segment file
    path: PathBuf,

    /// Key → byte offset of the key's latest frame
    index: RwLock<HashMap<String, u64>>,

    /// Bytes of complete frames in the file
    size: AtomicU64,
}

impl Segment {
    /// Create a segment over an empty file
    pub fn empty(id: u64, path: impl Into<PathBuf>) -> Self {
        Self::with_index(id, path, HashMap::new(), 0)
    }

    /// Create a segment from an already built index
    pub fn with_index(
        id: u64,
        path: impl Into<PathBuf>,
        index: HashMap<String, u64>,
        size: u64,
    ) -> Self {
        Self {
            id,
            path: path.into(),
            index: RwLock::new(index),
            size: AtomicU64::new(size),
        }
    }

    /// Load an existing segment file, replaying it to rebuild the index
    pub fn load(id: u64, path: &Path) -> Result<(Self, RecoveryResult)> {
        let (index, result) = SegmentRecovery::recover(path)?;

        tracing::debug!(
            segment = id,
            entries = result.entries_recovered,
            keys = index.len(),
            bytes = result.valid_bytes,
            "recovered segment"
        );

        let segment = Self::with_index(id, path, index, result.valid_bytes);
        Ok((segment, result))
    }

    /// Offset of the key's latest frame, if this segment holds the key
    pub fn lookup(&self, key: &str) -> Option<u64> {
        self.index.read().get(key).copied()
    }

    /// Look up and read a key's value
    ///
    /// Returns `Ok(None)` if the key is not in this segment.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let offset = match self.lookup(key) {
            Some(offset) => offset,
            None => return Ok(None),
        };

        let entry = self.read_entry_at(offset)?;
        if entry.key != key {
            return Err(SegKvError::CorruptFrame(format!(
                "{} at offset {}: expected key {:?}, found {:?}",
                self.path.display(),
                offset,
                key,
                entry.key
            )));
        }

        Ok(Some(entry.value))
    }

    /// Read and decode the frame starting at `offset`
    pub fn read_entry_at(&self, offset: u64) -> Result<Entry> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);

        let mut prefix = [0u8; LEN_PREFIX_SIZE];
        reader.read_exact(&mut prefix)?;
        let payload_len = u32::from_le_bytes(prefix) as usize;

        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload)?;

        Entry::decode_payload(&payload)
    }

    /// Record a frame appended at `offset`; `size` is the file length after it
    pub(crate) fn record(&self, key: String, offset: u64, size: u64) {
        self.index.write().insert(key, offset);
        self.size.store(size, Ordering::Release);
    }

    /// Get the segment id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the segment file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of complete frames in the file
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Number of distinct keys indexed
    pub fn key_count(&self) -> usize {
        self.index.read().len()
    }

    /// Whether the segment indexes any key
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }
}
