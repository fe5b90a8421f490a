//! Teomon wire format — length-prefixed chunks and command bytes.
//!
//! Every variable-sized field on the wire is a chunk: a little-endian `u16`
//! length followed by exactly that many bytes. Chunks nest: a Parameter is
//! one chunk inside a Metric, a Metric is one chunk inside a Peers list. A
//! reader that does not understand a record can always skip it.
//!
//! All integers are little-endian. Changing anything here breaks every
//! deployed agent.

use bytes::{Buf, BufMut, Bytes, BytesMut};

// ── Command bytes ─────────────────────────────────────────────────────────────

/// Peer → collector: encoded MetricRecord. No reply.
pub const CMD_METRIC: u8 = 130;

/// Peer → collector: encoded Parameter. No reply.
pub const CMD_PARAMETER: u8 = 131;

/// Client → collector: empty payload. Reply carries encoded Peers.
pub const CMD_LIST: u8 = 132;

/// Client → collector: empty payload. Triggers a registry save. No reply.
pub const CMD_SAVE: u8 = 133;

/// Protocol version announced by this implementation.
pub const PROTOCOL_VERSION: &str = "4";

// ── Constants ─────────────────────────────────────────────────────────────────

/// Maximum chunk body length — the u16 length prefix cannot express more.
pub const MAX_CHUNK: usize = u16::MAX as usize;

/// Maximum number of entries in a counted list (Metric params, Peers).
pub const MAX_ENTRIES: usize = u16::MAX as usize;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when encoding or decoding wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("truncated input: need {needed} bytes, {remaining} remaining")]
    TruncatedInput { needed: usize, remaining: usize },

    #[error("unsupported parameter type tag: 0x{0:02x}")]
    UnsupportedType(u8),

    #[error("chunk length {0} exceeds maximum {}", MAX_CHUNK)]
    ChunkTooLarge(usize),

    #[error("{0} entries exceed the maximum of {}", MAX_ENTRIES)]
    TooManyEntries(usize),

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid timestamp blob")]
    InvalidTimestamp,
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Write a length-prefixed chunk.
pub fn put_chunk(buf: &mut BytesMut, data: &[u8]) -> Result<(), WireError> {
    if data.len() > MAX_CHUNK {
        return Err(WireError::ChunkTooLarge(data.len()));
    }
    buf.put_u16_le(data.len() as u16);
    buf.put_slice(data);
    Ok(())
}

/// Write a length-prefixed UTF-8 string.
pub fn put_str(buf: &mut BytesMut, s: &str) -> Result<(), WireError> {
    put_chunk(buf, s.as_bytes())
}

/// Write a `u16` entry count.
pub fn put_count(buf: &mut BytesMut, count: usize) -> Result<(), WireError> {
    if count > MAX_ENTRIES {
        return Err(WireError::TooManyEntries(count));
    }
    buf.put_u16_le(count as u16);
    Ok(())
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Fail with `TruncatedInput` unless `n` bytes remain.
pub fn ensure(buf: &Bytes, n: usize) -> Result<(), WireError> {
    if buf.remaining() < n {
        return Err(WireError::TruncatedInput {
            needed: n,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_u8(buf: &mut Bytes) -> Result<u8, WireError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn get_u16(buf: &mut Bytes) -> Result<u16, WireError> {
    ensure(buf, 2)?;
    Ok(buf.get_u16_le())
}

pub fn get_i32(buf: &mut Bytes) -> Result<i32, WireError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32_le())
}

pub fn get_u32(buf: &mut Bytes) -> Result<u32, WireError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32_le())
}

pub fn get_i64(buf: &mut Bytes) -> Result<i64, WireError> {
    ensure(buf, 8)?;
    Ok(buf.get_i64_le())
}

pub fn get_f64(buf: &mut Bytes) -> Result<f64, WireError> {
    ensure(buf, 8)?;
    Ok(buf.get_f64_le())
}

/// Read a length-prefixed chunk. The returned Bytes shares `buf`'s storage.
pub fn get_chunk(buf: &mut Bytes) -> Result<Bytes, WireError> {
    let len = get_u16(buf)? as usize;
    ensure(buf, len)?;
    Ok(buf.split_to(len))
}

/// Read a length-prefixed UTF-8 string.
pub fn get_string(buf: &mut Bytes) -> Result<String, WireError> {
    let chunk = get_chunk(buf)?;
    String::from_utf8(chunk.to_vec()).map_err(|_| WireError::InvalidUtf8)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
