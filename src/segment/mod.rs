//! Segment Module
//!
//! One append-only log file plus the in-memory index of where each key's
//! latest frame starts.
//!
//! ## Responsibilities
//! - Name and discover segment files (`segment-0`, `segment-1`, ...)
//! - Rebuild a segment's index by replaying its frames on open
//! - Serve point reads at an indexed offset
//! - Append frames to the active segment (writer owned by the serializer)
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/
//!   ├── segment-0     oldest, read-only
//!   ├── segment-1     read-only
//!   └── segment-2     active (open for append)
//! ```
//! Each file is a plain sequence of entry frames. No index is persisted.

mod reader;
mod recovery;
mod writer;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use reader::Segment;
pub use recovery::{RecoveryResult, SegmentRecovery, LOOKAHEAD_SIZE};
pub use writer::SegmentWriter;

/// File name prefix shared by every segment
pub const SEGMENT_PREFIX: &str = "segment-";

/// Permissions for newly created segment files (owner read/write)
pub const SEGMENT_FILE_MODE: u32 = 0o600;

/// Generate the path of the segment with the given id
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}{}", SEGMENT_PREFIX, id))
}

/// Parse a segment id from a file name
/// "segment-42" → Some(42)
///
/// Only canonical decimal suffixes are accepted, so "segment-042" and
/// "segment-+1" are ignored rather than aliasing another id.
pub fn parse_segment_id(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let digits = name.strip_prefix(SEGMENT_PREFIX)?;
    let id: u64 = digits.parse().ok()?;
    (id.to_string() == digits).then_some(id)
}

/// List the segment files in `dir`, ordered oldest → newest
pub fn discover_segments(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut found = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(id) = parse_segment_id(&path) {
            found.push((id, path));
        }
    }

    found.sort_by_key(|(id, _)| *id);
    Ok(found)
}

/// The lowest id above every `segment-N` name in `dir`
///
/// Counts names that are not regular files too (a stray `segment-3`
/// directory still occupies id 3), so creating the returned id cannot
/// collide with an existing entry.
pub fn next_segment_id(dir: &Path) -> Result<u64> {
    let mut next = 0;
    for entry in fs::read_dir(dir)? {
        if let Some(id) = parse_segment_id(&entry?.path()) {
            next = next.max(id.saturating_add(1));
        }
    }
    Ok(next)
}
