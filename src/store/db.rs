//! Store
//!
//! The public handle: owns the segment list and the write serializer, and
//! exposes open/get/put/sync/close.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Sender};
use parking_lot::{Condvar, Mutex};

use crate::config::Config;
use crate::entry::{Entry, MAX_PAYLOAD_SIZE};
use crate::error::{Result, SegKvError};
use crate::segment::{discover_segments, next_segment_id, Segment, SegmentWriter};

use super::serializer::{WriteRequest, WriteSerializer};

/// Lifecycle of a store
///
/// `Store::open` is the opening phase; a store handed to the caller starts
/// `Open`. `Closing` lasts while `close` drains the write queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Open,
    Closing,
    Closed,
}

/// Store bookkeeping shared with the write serializer
pub(crate) struct StoreState {
    /// Segments ordered oldest → newest; the last one is active
    pub(crate) segments: Vec<Arc<Segment>>,

    pub(crate) lifecycle: Lifecycle,

    /// Why writes were disabled, if they were
    pub(crate) write_failure: Option<String>,

    /// Write queue; taken on close
    requests: Option<Sender<WriteRequest>>,

    /// Serializer thread; joined on close
    worker: Option<JoinHandle<Result<()>>>,
}

impl StoreState {
    fn check_open(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Open => Ok(()),
            Lifecycle::Closing | Lifecycle::Closed => Err(SegKvError::Closed),
        }
    }
}

/// A persistent key-value store on a segmented, append-only log
///
/// ## Concurrency Model: Single Writer / Multiple Readers
///
/// - **Writes** (put/sync): queued to one serializer thread that owns the
///   active segment's file, so appends, index updates and rotation never race
/// - **Reads** (get): run on the caller's thread; the store lock is held only
///   to find the segment and offset, the file read happens outside any lock
///
/// A `put` that has returned `Ok` is visible to every later `get`.
pub struct Store {
    /// Store configuration
    config: Config,

    /// Segment list, lifecycle and queue handle (single coarse lock)
    state: Arc<Mutex<StoreState>>,

    /// Signalled when `close` reaches `Closed`
    closed: Condvar,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create the data directory if needed
    /// 2. Replay every segment file, oldest first, rebuilding its index
    /// 3. Reopen the newest segment for append, or start a new one
    /// 4. Start the write serializer
    ///
    /// Any recovery error fails the open; no partially recovered store is
    /// returned.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let mut segments = Vec::new();
        let mut newest_is_clean = false;
        for (id, path) in discover_segments(&config.data_dir)? {
            let (segment, result) = Segment::load(id, &path)?;
            newest_is_clean = !result.was_truncated;
            segments.push(Arc::new(segment));
        }

        // Keep appending to the newest segment unless it is full, has a torn
        // tail, or a non-file entry already holds the id rotation would use.
        let next_id = next_segment_id(&config.data_dir)?;
        let writer = match segments.last() {
            Some(newest)
                if newest_is_clean
                    && newest.size() < config.max_segment_size
                    && newest.id().saturating_add(1) == next_id =>
            {
                SegmentWriter::reopen(Arc::clone(newest), config.sync_strategy)?
            }
            _ => {
                let writer = SegmentWriter::create(&config.data_dir, next_id, config.sync_strategy)?;
                segments.push(Arc::clone(writer.segment()));
                writer
            }
        };
        let active_id = writer.segment().id();
        let segment_count = segments.len();

        let (requests, queue) = match config.write_queue_capacity {
            Some(capacity) => channel::bounded(capacity),
            None => channel::unbounded(),
        };

        let state = Arc::new(Mutex::new(StoreState {
            segments,
            lifecycle: Lifecycle::Open,
            write_failure: None,
            requests: Some(requests),
            worker: None,
        }));

        let worker = WriteSerializer::new(writer, Arc::clone(&state), &config).spawn(queue)?;
        state.lock().worker = Some(worker);

        tracing::info!(
            data_dir = %config.data_dir.display(),
            segments = segment_count,
            active_segment = active_id,
            "store opened"
        );

        Ok(Self {
            config,
            state,
            closed: Condvar::new(),
        })
    }

    /// Open a store whose data directory must already exist
    ///
    /// Fails with `NotFound` instead of creating the directory. Used by
    /// read-only callers that should leave no trace on a missing store.
    pub fn open_existing(config: Config) -> Result<Self> {
        if !config.data_dir.is_dir() {
            return Err(SegKvError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no data directory at {}", config.data_dir.display()),
            )));
        }
        Self::open(config)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder().data_dir(path.as_ref()).build();
        Self::open(config)
    }

    /// Get a value by key
    ///
    /// Segments are searched newest → oldest; the first one indexing the key
    /// answers. Returns `KeyNotFound` if no segment holds the key.
    pub fn get(&self, key: &str) -> Result<String> {
        let segment = {
            let state = self.state.lock();
            state.check_open()?;
            state
                .segments
                .iter()
                .rev()
                .find(|segment| segment.lookup(key).is_some())
                .map(Arc::clone)
        };

        let segment = segment.ok_or(SegKvError::KeyNotFound)?;
        segment.get(key)?.ok_or(SegKvError::KeyNotFound)
    }

    /// Put a key-value pair
    ///
    /// Blocks until the serializer has appended the entry (and rotated, if
    /// the append filled the active segment) or failed to.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let entry = Entry::new(key, value);
        if entry.payload_len() > MAX_PAYLOAD_SIZE {
            return Err(SegKvError::EntryTooLarge(entry.payload_len()));
        }

        self.submit(|resp| WriteRequest::Put { entry, resp })
    }

    /// Flush the active segment to disk
    ///
    /// Ordered after every `put` submitted before it.
    pub fn sync(&self) -> Result<()> {
        self.submit(|resp| WriteRequest::Sync { resp })
    }

    /// Close the store
    ///
    /// Stops accepting writes, waits for queued writes to finish and releases
    /// the active segment's file. Calling `close` again returns `Ok(())`
    /// once the store is `Closed`; a call made while another one is still
    /// draining the queue blocks until that one finishes.
    pub fn close(&self) -> Result<()> {
        let (requests, worker) = {
            let mut state = self.state.lock();
            match state.lifecycle {
                Lifecycle::Open => {}
                Lifecycle::Closing => {
                    while state.lifecycle == Lifecycle::Closing {
                        self.closed.wait(&mut state);
                    }
                    return Ok(());
                }
                Lifecycle::Closed => return Ok(()),
            }
            state.lifecycle = Lifecycle::Closing;
            (state.requests.take(), state.worker.take())
        };

        // Dropping the last sender lets the serializer drain and exit
        drop(requests);
        let result = match worker {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(SegKvError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "write serializer panicked",
                )))
            }),
            None => Ok(()),
        };

        self.state.lock().lifecycle = Lifecycle::Closed;
        self.closed.notify_all();
        tracing::info!(data_dir = %self.config.data_dir.display(), "store closed");

        result
    }

    /// Send a request to the serializer and wait for its answer
    fn submit<F>(&self, request: F) -> Result<()>
    where
        F: FnOnce(Sender<Result<()>>) -> WriteRequest,
    {
        let requests = {
            let state = self.state.lock();
            state.check_open()?;
            if let Some(reason) = &state.write_failure {
                return Err(SegKvError::WritesDisabled(reason.clone()));
            }
            state.requests.clone().ok_or(SegKvError::Closed)?
        };

        let (resp_tx, resp_rx) = channel::bounded(1);
        requests
            .send(request(resp_tx))
            .map_err(|_| SegKvError::Closed)?;
        drop(requests);

        resp_rx.recv().map_err(|_| SegKvError::Closed)?
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the number of segments
    pub fn segment_count(&self) -> usize {
        self.state.lock().segments.len()
    }

    /// Get the segment ids, oldest → newest
    pub fn segment_ids(&self) -> Vec<u64> {
        self.state.lock().segments.iter().map(|s| s.id()).collect()
    }

    /// Get the id of the active segment
    pub fn active_segment_id(&self) -> Option<u64> {
        self.state.lock().segments.last().map(|s| s.id())
    }

    /// Get the lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lock().lifecycle
    }

    /// Whether `close` has completed
    pub fn is_closed(&self) -> bool {
        self.lifecycle() == Lifecycle::Closed
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "error closing store on drop");
        }
    }
}
