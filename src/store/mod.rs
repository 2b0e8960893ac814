//! Store Module
//!
//! Coordinates segments and serializes writes.
//!
//! ## Responsibilities
//! - Open a directory: discover segments, recover their indexes, pick the
//!   active segment
//! - Route reads newest → oldest across segments
//! - Funnel every write through one serializer thread
//! - Rotate to a new segment once the active one reaches the size threshold
//! - Close: drain queued writes and release file handles
//!
//! ## Write Path
//! ```text
//!   put(k, v) ──► request queue ──► serializer thread
//!       ▲                               │ append frame to active segment
//!       │                               │ update segment index
//!       │                               │ rotate if size >= threshold
//!       └──── per-request response ◄────┘
//! ```

mod db;
mod serializer;

pub use db::{Lifecycle, Store};
