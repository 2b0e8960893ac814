//! Tests for SegmentWriter
//!
//! These tests verify:
//! - Creating a new segment file
//! - Appending entries updates offsets and the segment index
//! - Appended frames are recoverable from disk
//! - Reopening a recovered segment continues at its end
//! - Sync strategies
//! - Failed fsync or unrecoverable append poisons the writer

use std::fs;
use std::sync::Arc;

use segkv::config::SyncStrategy;
use segkv::entry::Entry;
use segkv::segment::{segment_path, Segment, SegmentRecovery, SegmentWriter};
use segkv::SegKvError;
use tempfile::TempDir;

// =============================================================================
// Create Tests
// =============================================================================

#[test]
fn test_create_new_segment() {
    let temp_dir = TempDir::new().unwrap();

    let writer = SegmentWriter::create(temp_dir.path(), 0, SyncStrategy::EveryWrite).unwrap();

    let path = segment_path(temp_dir.path(), 0);
    assert!(path.exists());
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    assert_eq!(writer.offset(), 0);
    assert_eq!(writer.segment().id(), 0);
}

#[test]
fn test_create_refuses_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(segment_path(temp_dir.path(), 1), b"existing").unwrap();

    let result = SegmentWriter::create(temp_dir.path(), 1, SyncStrategy::EveryWrite);

    assert!(result.is_err());
    assert_eq!(fs::read(segment_path(temp_dir.path(), 1)).unwrap(), b"existing");
}

#[cfg(unix)]
#[test]
fn test_created_segment_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    SegmentWriter::create(temp_dir.path(), 0, SyncStrategy::EveryWrite).unwrap();

    let mode = fs::metadata(segment_path(temp_dir.path(), 0))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o077, 0);
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_append_returns_frame_offsets() {
    let temp_dir = TempDir::new().unwrap();
    let mut writer = SegmentWriter::create(temp_dir.path(), 0, SyncStrategy::EveryWrite).unwrap();
    let first = Entry::new("a", "1");
    let second = Entry::new("b", "2");

    let off1 = writer.append(&first).unwrap();
    let off2 = writer.append(&second).unwrap();

    assert_eq!(off1, 0);
    assert_eq!(off2, first.encoded_len() as u64);
    assert_eq!(writer.offset(), (first.encoded_len() + second.encoded_len()) as u64);
    assert_eq!(writer.segment().size(), writer.offset());
}

#[test]
fn test_append_updates_index() {
    let temp_dir = TempDir::new().unwrap();
    let mut writer = SegmentWriter::create(temp_dir.path(), 0, SyncStrategy::EveryWrite).unwrap();

    writer.append(&Entry::new("key", "v1")).unwrap();
    let latest = writer.append(&Entry::new("key", "v2")).unwrap();

    let segment = Arc::clone(writer.segment());
    assert_eq!(segment.lookup("key"), Some(latest));
    assert_eq!(segment.get("key").unwrap(), Some("v2".to_string()));
}

#[test]
fn test_appended_frames_are_recoverable() {
    let temp_dir = TempDir::new().unwrap();
    let mut writer = SegmentWriter::create(
        temp_dir.path(),
        0,
        SyncStrategy::EveryNEntries { count: 3 },
    )
    .unwrap();
    for i in 0..10 {
        writer.append(&Entry::new(format!("key{}", i), format!("value{}", i))).unwrap();
    }
    writer.sync().unwrap();
    let expected_size = writer.offset();
    drop(writer);

    let (index, result) = SegmentRecovery::recover(&segment_path(temp_dir.path(), 0)).unwrap();

    assert_eq!(index.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.valid_bytes, expected_size);
    assert!(!result.was_truncated);
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_reopen_continues_at_end() {
    let temp_dir = TempDir::new().unwrap();
    let path = segment_path(temp_dir.path(), 0);
    {
        let mut writer = SegmentWriter::create(temp_dir.path(), 0, SyncStrategy::EveryWrite).unwrap();
        writer.append(&Entry::new("a", "1")).unwrap();
    }

    let (segment, _) = Segment::load(0, &path).unwrap();
    let segment = Arc::new(segment);
    let mut writer = SegmentWriter::reopen(Arc::clone(&segment), SyncStrategy::EveryWrite).unwrap();
    let offset = writer.append(&Entry::new("b", "2")).unwrap();

    assert_eq!(offset, Entry::new("a", "1").encoded_len() as u64);
    assert_eq!(segment.get("a").unwrap(), Some("1".to_string()));
    assert_eq!(segment.get("b").unwrap(), Some("2".to_string()));

    let (index, _) = SegmentRecovery::recover(&path).unwrap();
    assert_eq!(index.len(), 2);
}

#[test]
fn test_sync_without_pending_writes() {
    let temp_dir = TempDir::new().unwrap();
    let mut writer = SegmentWriter::create(
        temp_dir.path(),
        0,
        SyncStrategy::EveryNEntries { count: 100 },
    )
    .unwrap();

    writer.sync().unwrap();
    writer.append(&Entry::new("a", "1")).unwrap();
    writer.sync().unwrap();
    writer.sync().unwrap();

    assert!(!writer.is_poisoned());
}

// =============================================================================
// Failure Tests
// =============================================================================

// /dev/null accepts writes but rejects fsync with EINVAL
#[cfg(target_os = "linux")]
#[test]
fn test_failed_sync_poisons_writer() {
    let segment = Arc::new(Segment::empty(0, "/dev/null"));
    let mut writer = SegmentWriter::reopen(Arc::clone(&segment), SyncStrategy::EveryWrite).unwrap();

    let result = writer.append(&Entry::new("a", "1"));

    assert!(matches!(result, Err(SegKvError::Io(_))));
    assert!(writer.is_poisoned());
    // The frame was written before the fsync, so it stays indexed
    assert_eq!(segment.lookup("a"), Some(0));

    let next = writer.append(&Entry::new("b", "2"));
    assert!(matches!(next, Err(SegKvError::WritesDisabled(_))));
    assert_eq!(segment.lookup("b"), None);
}

#[cfg(target_os = "linux")]
#[test]
fn test_explicit_sync_failure_poisons_writer() {
    let segment = Arc::new(Segment::empty(0, "/dev/null"));
    let mut writer = SegmentWriter::reopen(segment, SyncStrategy::EveryNEntries { count: 100 }).unwrap();
    writer.append(&Entry::new("a", "1")).unwrap();
    assert!(!writer.is_poisoned());

    assert!(writer.sync().is_err());

    assert!(writer.is_poisoned());
    assert!(matches!(
        writer.append(&Entry::new("b", "2")),
        Err(SegKvError::WritesDisabled(_))
    ));
}

// /dev/full fails every write, and a character device cannot be truncated
#[cfg(target_os = "linux")]
#[test]
fn test_failed_rollback_poisons_writer() {
    let segment = Arc::new(Segment::empty(0, "/dev/full"));
    let mut writer = SegmentWriter::reopen(Arc::clone(&segment), SyncStrategy::EveryWrite).unwrap();

    let result = writer.append(&Entry::new("a", "1"));

    assert!(matches!(result, Err(SegKvError::Io(_))));
    assert!(writer.is_poisoned());
    assert_eq!(segment.lookup("a"), None);
    assert_eq!(writer.offset(), 0);
}
