//! # segkv
//!
//! A persistent key-value store on an append-only, segmented log:
//! - Every write appends a self-describing frame; nothing is rewritten
//! - Per-segment in-memory indexes rebuilt by replay on open
//! - Size-triggered rotation into new segment files
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                               │
//! │              (get / put / sync / close)                      │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │ put                          │ get
//!                ▼                              │
//!   ┌──────────────────────────┐                │
//!   │    Write Serializer      │                │
//!   │  (one thread, FIFO queue)│                │
//!   └────────────┬─────────────┘                │
//!                │ append / rotate              │ newest → oldest
//!                ▼                              ▼
//!   ┌───────────────────────────────────────────────────────────┐
//!   │  segment-0   segment-1   ...   segment-N (active)          │
//!   │  [index]     [index]           [index]                     │
//!   └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use segkv::Store;
//!
//! let store = Store::open_path("./data").unwrap();
//! store.put("a", "1").unwrap();
//! assert_eq!(store.get("a").unwrap(), "1");
//! store.close().unwrap();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod entry;
pub mod segment;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{SegKvError, Result};
pub use config::{Config, SyncStrategy};
pub use entry::Entry;
pub use store::{Lifecycle, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of segkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
