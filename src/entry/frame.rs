//! Entry frame encoding and decoding

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, SegKvError};

/// Size of the payload length prefix at the start of every frame
pub const LEN_PREFIX_SIZE: usize = 4;

/// Smallest valid payload: an empty key and an empty value (two length fields)
pub const MIN_PAYLOAD_SIZE: usize = 8;

/// Largest payload representable in the length prefix
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

/// A single key/value record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Number of bytes following the length prefix
    pub fn payload_len(&self) -> usize {
        MIN_PAYLOAD_SIZE + self.key.len() + self.value.len()
    }

    /// Total size of the encoded frame
    pub fn encoded_len(&self) -> usize {
        LEN_PREFIX_SIZE + self.payload_len()
    }

    /// Encode into a frame
    ///
    /// Callers must keep `payload_len()` within `MAX_PAYLOAD_SIZE`; the store
    /// checks this before an entry reaches the log.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u32_le(self.payload_len() as u32);
        buf.put_u32_le(self.key.len() as u32);
        buf.put_slice(self.key.as_bytes());
        buf.put_u32_le(self.value.len() as u32);
        buf.put_slice(self.value.as_bytes());
        buf.to_vec()
    }

    /// Decode the frame at the start of `bytes`
    ///
    /// Bytes past the end of the frame are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        if buf.remaining() < LEN_PREFIX_SIZE {
            return Err(SegKvError::CorruptFrame(format!(
                "length prefix needs {} bytes, got {}",
                LEN_PREFIX_SIZE,
                buf.remaining()
            )));
        }

        let payload_len = buf.get_u32_le() as usize;
        if buf.remaining() < payload_len {
            return Err(SegKvError::CorruptFrame(format!(
                "frame claims {} payload bytes, only {} available",
                payload_len,
                buf.remaining()
            )));
        }

        Self::decode_payload(&buf[..payload_len])
    }

    /// Decode a payload (the frame minus its length prefix)
    ///
    /// The key and value fields must account for every byte of `payload`.
    pub fn decode_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() < MIN_PAYLOAD_SIZE {
            return Err(SegKvError::CorruptFrame(format!(
                "payload of {} bytes is below the {} byte minimum",
                payload.len(),
                MIN_PAYLOAD_SIZE
            )));
        }

        let mut buf = payload;
        let key = take_field(&mut buf, "key")?;
        let value = take_field(&mut buf, "value")?;

        if buf.has_remaining() {
            return Err(SegKvError::CorruptFrame(format!(
                "{} unexpected bytes after value",
                buf.remaining()
            )));
        }

        Ok(Self { key, value })
    }
}

/// Read one length-prefixed UTF-8 field and advance past it
fn take_field(buf: &mut &[u8], name: &str) -> Result<String> {
    if buf.remaining() < 4 {
        return Err(SegKvError::CorruptFrame(format!(
            "{} length field overruns payload",
            name
        )));
    }

    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        return Err(SegKvError::CorruptFrame(format!(
            "{} claims {} bytes, only {} remain in payload",
            name,
            len,
            buf.remaining()
        )));
    }

    let field = buf[..len].to_vec();
    buf.advance(len);

    String::from_utf8(field)
        .map_err(|e| SegKvError::CorruptFrame(format!("{} is not valid UTF-8: {}", name, e)))
}
