//! Segment Writer
//!
//! Appends frames to the active segment. Exactly one writer exists per store
//! and it is owned by the write serializer, so appends need no lock.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::config::SyncStrategy;
use crate::entry::Entry;
use crate::error::{Result, SegKvError};

use super::{segment_path, Segment, SEGMENT_FILE_MODE};

/// Append handle for the active segment
pub struct SegmentWriter {
    /// Segment whose index is updated after every append
    segment: Arc<Segment>,

    /// Append-only file handle
    file: File,

    /// Current end of the file
    offset: u64,

    /// When to fsync
    sync_strategy: SyncStrategy,

    /// Appends since the last fsync
    unsynced: usize,

    /// Set when a failed append could not be rolled back or an fsync failed
    poisoned: bool,
}

impl SegmentWriter {
    /// Create a brand new segment file with the given id
    ///
    /// Fails if the file already exists.
    pub fn create(dir: &Path, id: u64, sync_strategy: SyncStrategy) -> Result<Self> {
        let path = segment_path(dir, id);
        let file = open_options().create_new(true).open(&path)?;

        // Make the new directory entry durable
        if let Err(e) = File::open(dir).and_then(|dir_handle| dir_handle.sync_all()) {
            tracing::warn!(
                dir = %dir.display(),
                segment = id,
                error = %e,
                "failed to sync data directory after creating segment"
            );
        }

        Ok(Self {
            segment: Arc::new(Segment::empty(id, path)),
            file,
            offset: 0,
            sync_strategy,
            unsynced: 0,
            poisoned: false,
        })
    }

    /// Reopen a recovered segment for append
    pub fn reopen(segment: Arc<Segment>, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = open_options().open(segment.path())?;
        let offset = segment.size();

        Ok(Self {
            segment,
            file,
            offset,
            sync_strategy,
            unsynced: 0,
            poisoned: false,
        })
    }

    /// Append an entry, returning the offset its frame starts at
    ///
    /// The index is updated only after the whole frame is written, before any
    /// fsync, so it always matches the file contents. A failed
    /// write is rolled back by truncating the file to its previous length; if
    /// that also fails the writer refuses further appends.
    ///
    /// A failed fsync also poisons the writer. The frame that triggered it
    /// stays in the file and the index, so it may still be readable even
    /// though the append returned an error.
    pub fn append(&mut self, entry: &Entry) -> Result<u64> {
        if self.poisoned {
            return Err(SegKvError::WritesDisabled(format!(
                "segment {} is in an unknown state at offset {}",
                self.segment.id(),
                self.offset
            )));
        }

        let frame = entry.encode();
        if let Err(e) = self.file.write_all(&frame) {
            if let Err(rollback) = self.file.set_len(self.offset) {
                tracing::error!(
                    segment = self.segment.id(),
                    offset = self.offset,
                    error = %rollback,
                    "failed to roll back partial append"
                );
                self.poisoned = true;
            }
            return Err(e.into());
        }

        let offset = self.offset;
        self.offset += frame.len() as u64;
        self.unsynced += 1;
        self.segment.record(entry.key.clone(), offset, self.offset);

        let sync_due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if sync_due {
            self.sync()?;
        }

        tracing::trace!(
            segment = self.segment.id(),
            offset,
            len = frame.len(),
            "appended frame"
        );

        Ok(offset)
    }

    /// Force sync to disk
    ///
    /// On failure the durability of every unsynced frame is unknown, so the
    /// writer is poisoned.
    pub fn sync(&mut self) -> Result<()> {
        if self.unsynced == 0 {
            return Ok(());
        }

        if let Err(e) = self.file.sync_data() {
            tracing::error!(
                segment = self.segment.id(),
                unsynced = self.unsynced,
                error = %e,
                "fsync failed"
            );
            self.poisoned = true;
            return Err(e.into());
        }

        self.unsynced = 0;
        Ok(())
    }

    /// Current end of the file
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The segment this writer appends to
    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }

    /// Whether the writer refuses appends after a failed rollback or fsync
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}

fn open_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.append(true).create(false);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(SEGMENT_FILE_MODE);
    }

    options
}
