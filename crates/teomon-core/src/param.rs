//! Parameters — one named, dynamically typed value attached to a peer.
//!
//! Wire layout of one Parameter:
//!
//! ```text
//! name  : chunk (UTF-8)
//! kind  : u8    (ValueKind)
//! value : bool → 1 byte, int/int32 → i32 LE, uint32 → u32 LE,
//!         float64 → f64 LE, string/bytes → chunk
//! ```
//!
//! The kind byte is the compatibility boundary: a reader that sees a kind
//! it does not know fails with `UnsupportedType`, it never guesses.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::wire::{self, WireError};

// ── Reserved parameter names ──────────────────────────────────────────────────

/// Peer reachability, maintained by the collector's health monitor.
pub const PARAM_ONLINE: &str = "online";
/// Number of connections the peer itself currently holds.
pub const PARAM_PEERS: &str = "peers";
/// Host name the peer runs on.
pub const PARAM_HOST: &str = "host";
/// Machine identifier of the peer's host.
pub const PARAM_MACHINE_ID: &str = "machineid";
/// Peer is expected to go offline; suppresses alerting.
pub const PARAM_MAY_OFFLINE: &str = "mayoffline";

/// All parameter names with defined semantics.
pub const RESERVED_PARAMS: [&str; 5] = [
    PARAM_ONLINE,
    PARAM_PEERS,
    PARAM_HOST,
    PARAM_MACHINE_ID,
    PARAM_MAY_OFFLINE,
];

// ── ValueKind ─────────────────────────────────────────────────────────────────

/// Type tag written in front of every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueKind {
    Bool = 1,
    /// Native integer. Narrowed to 32 bits on the wire.
    Int = 2,
    Int32 = 3,
    Uint32 = 4,
    Float64 = 5,
    String = 6,
    Bytes = 7,
}

impl TryFrom<u8> for ValueKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ValueKind::Bool),
            2 => Ok(ValueKind::Int),
            3 => Ok(ValueKind::Int32),
            4 => Ok(ValueKind::Uint32),
            5 => Ok(ValueKind::Float64),
            6 => Ok(ValueKind::String),
            7 => Ok(ValueKind::Bytes),
            other => Err(WireError::UnsupportedType(other)),
        }
    }
}

impl From<ValueKind> for u8 {
    fn from(k: ValueKind) -> u8 {
        k as u8
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A parameter value. Serializes to JSON as the bare inner value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Int32(i32),
    Uint32(u32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Int32(_) => ValueKind::Int32,
            Value::Uint32(_) => ValueKind::Uint32,
            Value::Float64(_) => ValueKind::Float64,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer kind widened to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Uint32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn encode_into(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        buf.put_u8(self.kind().into());
        match self {
            Value::Bool(v) => buf.put_u8(u8::from(*v)),
            // Lossy by convention: native ints travel as 32 bits.
            Value::Int(v) => buf.put_i32_le(*v as i32),
            Value::Int32(v) => buf.put_i32_le(*v),
            Value::Uint32(v) => buf.put_u32_le(*v),
            Value::Float64(v) => buf.put_f64_le(*v),
            Value::String(v) => wire::put_str(buf, v)?,
            Value::Bytes(v) => wire::put_chunk(buf, v)?,
        }
        Ok(())
    }

    fn decode_from(buf: &mut Bytes) -> Result<Self, WireError> {
        let kind = ValueKind::try_from(wire::get_u8(buf)?)?;
        let value = match kind {
            ValueKind::Bool => Value::Bool(wire::get_u8(buf)? != 0),
            ValueKind::Int => Value::Int(i64::from(wire::get_i32(buf)?)),
            ValueKind::Int32 => Value::Int32(wire::get_i32(buf)?),
            ValueKind::Uint32 => Value::Uint32(wire::get_u32(buf)?),
            ValueKind::Float64 => Value::Float64(wire::get_f64(buf)?),
            ValueKind::String => Value::String(wire::get_string(buf)?),
            ValueKind::Bytes => Value::Bytes(wire::get_chunk(buf)?.to_vec()),
        };
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Uint32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Bytes(v) => {
                f.write_str("[")?;
                for (i, b) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{b}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

// ── Parameter ─────────────────────────────────────────────────────────────────

/// One named value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn encode(&self) -> Result<Bytes, WireError> {
        let mut buf = BytesMut::new();
        wire::put_str(&mut buf, &self.name)?;
        self.value.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    pub fn decode(mut data: Bytes) -> Result<Self, WireError> {
        let name = wire::get_string(&mut data)?;
        let value = Value::decode_from(&mut data)?;
        Ok(Self { name, value })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
