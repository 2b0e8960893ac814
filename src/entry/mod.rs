//! Entry Module
//!
//! The unit of persistence: one key/value pair encoded as a self-delimited
//! binary frame.
//!
//! ## Frame Format
//! ```text
//! ┌──────────────┬──────────────┬───────┬──────────────┬─────────┐
//! │ PayloadLen(4)│  KeyLen (4)  │  Key  │  ValueLen(4) │  Value  │
//! └──────────────┴──────────────┴───────┴──────────────┴─────────┘
//!                └──────────────── payload ──────────────────────┘
//! ```
//!
//! All integers are little-endian `u32`. `PayloadLen` counts every byte after
//! itself, so a frame can be skipped or read without decoding it. Frames are
//! written back to back with no padding, header or footer.

mod frame;

pub use frame::{Entry, LEN_PREFIX_SIZE, MAX_PAYLOAD_SIZE, MIN_PAYLOAD_SIZE};
