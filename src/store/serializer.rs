//! Write Serializer
//!
//! A single worker thread that owns the active segment's writer. `Store::put`
//! turns each call into a `WriteRequest` on a queue; the worker applies them
//! one at a time, in submission order, and answers each on its own response
//! channel.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::config::{Config, SyncStrategy};
use crate::entry::Entry;
use crate::error::{Result, SegKvError};
use crate::segment::SegmentWriter;

use super::db::StoreState;

/// A request for the write serializer
pub(crate) enum WriteRequest {
    /// Append an entry to the active segment
    Put {
        entry: Entry,
        resp: Sender<Result<()>>,
    },

    /// fsync the active segment
    Sync { resp: Sender<Result<()>> },
}

/// Exclusive owner of every mutation to the active segment
pub(crate) struct WriteSerializer {
    /// Writer for the active segment (`None` once writes are disabled)
    writer: Option<SegmentWriter>,

    /// Store bookkeeping, locked only to publish a new segment or a failure
    state: Arc<Mutex<StoreState>>,

    data_dir: PathBuf,
    max_segment_size: u64,
    sync_strategy: SyncStrategy,
}

impl WriteSerializer {
    pub(crate) fn new(writer: SegmentWriter, state: Arc<Mutex<StoreState>>, config: &Config) -> Self {
        Self {
            writer: Some(writer),
            state,
            data_dir: config.data_dir.clone(),
            max_segment_size: config.max_segment_size,
            sync_strategy: config.sync_strategy,
        }
    }

    /// Start the worker thread
    ///
    /// The thread exits once every sender for `requests` is dropped and the
    /// queue is drained; its result is the final sync of the active segment.
    pub(crate) fn spawn(self, requests: Receiver<WriteRequest>) -> io::Result<JoinHandle<Result<()>>> {
        thread::Builder::new()
            .name("segkv-writer".to_string())
            .spawn(move || self.run(requests))
    }

    fn run(mut self, requests: Receiver<WriteRequest>) -> Result<()> {
        for request in requests.iter() {
            match request {
                WriteRequest::Put { entry, resp } => {
                    let result = self.put(&entry);
                    // The caller may have given up waiting; nothing to do then
                    let _ = resp.send(result);
                }
                WriteRequest::Sync { resp } => {
                    let result = self.sync();
                    let _ = resp.send(result);
                }
            }
        }

        tracing::debug!("write queue closed, stopping serializer");

        match self.writer.take() {
            Some(mut writer) => writer.sync(),
            None => Ok(()),
        }
    }

    /// Append, then rotate if the active segment reached the threshold
    fn put(&mut self, entry: &Entry) -> Result<()> {
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => return Err(self.disabled()),
        };

        if let Err(e) = writer.append(entry) {
            if writer.is_poisoned() {
                let reason = format!("append to segment {} failed: {}", writer.segment().id(), e);
                self.disable(reason);
            }
            return Err(e);
        }

        if writer.offset() >= self.max_segment_size {
            self.rotate()?;
        }

        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => return Err(self.disabled()),
        };

        if let Err(e) = writer.sync() {
            if writer.is_poisoned() {
                let reason = format!("sync of segment {} failed: {}", writer.segment().id(), e);
                self.disable(reason);
            }
            return Err(e);
        }

        Ok(())
    }

    /// Close the active segment and start the next one
    ///
    /// On failure the store is left without an active segment and refuses
    /// further writes; readers keep working.
    fn rotate(&mut self) -> Result<()> {
        let mut old = match self.writer.take() {
            Some(writer) => writer,
            None => return Err(self.disabled()),
        };
        let old_id = old.segment().id();
        let next_id = old_id + 1;

        if let Err(e) = old.sync() {
            self.disable(format!("sync of segment {} before rotation failed: {}", old_id, e));
            return Err(e);
        }
        drop(old);

        match SegmentWriter::create(&self.data_dir, next_id, self.sync_strategy) {
            Ok(writer) => {
                self.state.lock().segments.push(Arc::clone(writer.segment()));
                self.writer = Some(writer);
                tracing::debug!(from = old_id, to = next_id, "rotated active segment");
                Ok(())
            }
            Err(e) => {
                self.disable(format!("creating segment {} failed: {}", next_id, e));
                Err(e)
            }
        }
    }

    /// Refuse all further writes
    fn disable(&mut self, reason: String) {
        tracing::error!(%reason, "disabling writes");
        self.writer = None;
        self.state.lock().write_failure = Some(reason);
    }

    fn disabled(&self) -> SegKvError {
        let reason = self
            .state
            .lock()
            .write_failure
            .clone()
            .unwrap_or_else(|| "no active segment".to_string());
        SegKvError::WritesDisabled(reason)
    }
}
