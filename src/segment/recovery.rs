//! Segment Recovery
//!
//! Rebuilds a segment's index by replaying its frames from offset 0.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::entry::{Entry, LEN_PREFIX_SIZE};
use crate::error::{Result, SegKvError};

/// Size of the read-ahead window; payloads up to this size reuse one buffer
pub const LOOKAHEAD_SIZE: usize = 8192;

/// Replays segment files
pub struct SegmentRecovery;

/// Result of a recovery scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of complete frames read
    pub entries_recovered: u64,

    /// Bytes covered by complete frames
    pub valid_bytes: u64,

    /// Size of the file on disk
    pub file_bytes: u64,

    /// Whether an incomplete trailing frame was dropped
    pub was_truncated: bool,
}

impl SegmentRecovery {
    /// Recover the key → offset index of a segment file
    ///
    /// Later frames for a key replace earlier ones. An incomplete frame at the
    /// end of the file is dropped; a complete frame that fails to decode aborts
    /// recovery with `CorruptFrame`.
    pub fn recover(path: &Path) -> Result<(HashMap<String, u64>, RecoveryResult)> {
        let mut index = HashMap::new();
        let result = Self::scan(path, |entry, offset| {
            index.insert(entry.key, offset);
        })?;
        Ok((index, result))
    }

    /// Scan a segment file without building an index
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Self::scan(path, |_, _| {})
    }

    fn scan<F>(path: &Path, mut on_entry: F) -> Result<RecoveryResult>
    where
        F: FnMut(Entry, u64),
    {
        let file = File::open(path)?;
        let file_bytes = file.metadata()?.len();
        let mut reader = BufReader::with_capacity(LOOKAHEAD_SIZE, file);
        let mut scratch = vec![0u8; LOOKAHEAD_SIZE];

        let mut result = RecoveryResult {
            file_bytes,
            ..RecoveryResult::default()
        };
        let mut offset = 0u64;

        loop {
            // Peek: an empty window is a clean end of file
            if reader.fill_buf()?.is_empty() {
                break;
            }

            let mut prefix = [0u8; LEN_PREFIX_SIZE];
            if read_up_to(&mut reader, &mut prefix)? < LEN_PREFIX_SIZE {
                result.was_truncated = true;
                break;
            }
            let payload_len = u32::from_le_bytes(prefix) as usize;

            // A frame claiming more than the file still holds can only be a torn tail
            let remaining = file_bytes.saturating_sub(offset + LEN_PREFIX_SIZE as u64);
            if payload_len as u64 > remaining {
                result.was_truncated = true;
                break;
            }

            let mut large = Vec::new();
            let payload: &mut [u8] = if payload_len <= LOOKAHEAD_SIZE {
                &mut scratch[..payload_len]
            } else {
                large.resize(payload_len, 0);
                &mut large[..]
            };

            if read_up_to(&mut reader, payload)? < payload_len {
                result.was_truncated = true;
                break;
            }

            let entry = Entry::decode_payload(payload).map_err(|e| match e {
                SegKvError::CorruptFrame(reason) => SegKvError::CorruptFrame(format!(
                    "{} at offset {}: {}",
                    path.display(),
                    offset,
                    reason
                )),
                other => other,
            })?;

            on_entry(entry, offset);
            offset += (LEN_PREFIX_SIZE + payload_len) as u64;
            result.entries_recovered += 1;
        }

        result.valid_bytes = offset;

        if result.was_truncated {
            tracing::warn!(
                path = %path.display(),
                valid_bytes = result.valid_bytes,
                file_bytes = result.file_bytes,
                "dropping incomplete trailing frame"
            );
        }

        Ok(result)
    }
}

/// Fill `buf` as far as the reader allows; returns the bytes read
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
