//! Metric records — a peer's identity plus its current parameters.
//!
//! Wire layout of one MetricRecord:
//!
//! ```text
//! address, app_name, app_short, app_version, protocol_version : chunk each
//! start_time : chunk (12 bytes: i64 unix seconds LE, u32 nanos LE)
//! is_new     : u8
//! count      : u16
//! params     : count × chunk (one encoded Parameter each)
//! ```
//!
//! A Peers list is `u16 count` followed by `count` MetricRecord chunks. The
//! same framing is used for the `list` reply and for the persisted file.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, TimeZone, Utc};

use crate::param::{Parameter, PARAM_ONLINE};
use crate::params::ParameterStore;
use crate::wire::{self, WireError};

/// Size of the start-time blob.
const TIMESTAMP_LEN: usize = 12;

#[derive(Debug, Clone)]
pub struct MetricRecord {
    /// Transport address — the registry key.
    pub address: String,
    pub app_name: String,
    pub app_short: String,
    pub app_version: String,
    pub protocol_version: String,
    pub start_time: DateTime<Utc>,
    /// Not yet included in a completed save.
    pub is_new: bool,
    /// Shared handle; see [`ParameterStore`].
    pub params: ParameterStore,
}

impl Default for MetricRecord {
    fn default() -> Self {
        Self {
            address: String::new(),
            app_name: String::new(),
            app_short: String::new(),
            app_version: String::new(),
            protocol_version: String::new(),
            start_time: DateTime::<Utc>::UNIX_EPOCH,
            is_new: false,
            params: ParameterStore::new(),
        }
    }
}

impl MetricRecord {
    pub fn new(address: impl Into<String>, app_short: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            app_short: app_short.into(),
            start_time: Utc::now(),
            ..Self::default()
        }
    }

    /// `online` parameter, if present and boolean.
    pub fn online(&self) -> Option<bool> {
        self.params.get_bool(PARAM_ONLINE)
    }

    /// Present and explicitly false. Absent or non-boolean counts as online.
    pub fn is_offline(&self) -> bool {
        self.online() == Some(false)
    }

    /// Copy of this record with an independent parameter store.
    pub fn detached(&self) -> Self {
        Self {
            params: self.params.deep_copy(),
            ..self.clone()
        }
    }

    pub fn encode(&self) -> Result<Bytes, WireError> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    fn encode_into(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        wire::put_str(buf, &self.address)?;
        wire::put_str(buf, &self.app_name)?;
        wire::put_str(buf, &self.app_short)?;
        wire::put_str(buf, &self.app_version)?;
        wire::put_str(buf, &self.protocol_version)?;
        wire::put_chunk(buf, &encode_timestamp(&self.start_time))?;
        buf.put_u8(u8::from(self.is_new));

        let params = self.params.snapshot();
        wire::put_count(buf, params.len())?;
        for p in &params {
            wire::put_chunk(buf, &p.encode()?)?;
        }
        Ok(())
    }

    pub fn decode(mut data: Bytes) -> Result<Self, WireError> {
        let address = wire::get_string(&mut data)?;
        let app_name = wire::get_string(&mut data)?;
        let app_short = wire::get_string(&mut data)?;
        let app_version = wire::get_string(&mut data)?;
        let protocol_version = wire::get_string(&mut data)?;
        let start_time = decode_timestamp(&wire::get_chunk(&mut data)?)?;
        let is_new = wire::get_u8(&mut data)? != 0;

        let params = ParameterStore::new();
        let count = wire::get_u16(&mut data)?;
        for _ in 0..count {
            let p = Parameter::decode(wire::get_chunk(&mut data)?)?;
            params.upsert(p.name, p.value);
        }

        Ok(Self {
            address,
            app_name,
            app_short,
            app_version,
            protocol_version,
            start_time,
            is_new,
            params,
        })
    }
}

// ── Peers list ────────────────────────────────────────────────────────────────

/// Encode a list of records: count, then one chunk per record.
pub fn encode_peers<'a, I>(records: I) -> Result<Bytes, WireError>
where
    I: IntoIterator<Item = &'a MetricRecord>,
    I::IntoIter: ExactSizeIterator,
{
    let records = records.into_iter();
    let mut buf = BytesMut::new();
    wire::put_count(&mut buf, records.len())?;
    for m in records {
        wire::put_chunk(&mut buf, &m.encode()?)?;
    }
    Ok(buf.freeze())
}

pub fn decode_peers(mut data: Bytes) -> Result<Vec<MetricRecord>, WireError> {
    let count = wire::get_u16(&mut data)?;
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        records.push(MetricRecord::decode(wire::get_chunk(&mut data)?)?);
    }
    Ok(records)
}

// ── Timestamp blob ────────────────────────────────────────────────────────────

fn encode_timestamp(t: &DateTime<Utc>) -> [u8; TIMESTAMP_LEN] {
    let mut out = [0u8; TIMESTAMP_LEN];
    out[..8].copy_from_slice(&t.timestamp().to_le_bytes());
    out[8..].copy_from_slice(&t.timestamp_subsec_nanos().to_le_bytes());
    out
}

fn decode_timestamp(blob: &[u8]) -> Result<DateTime<Utc>, WireError> {
    if blob.len() != TIMESTAMP_LEN {
        return Err(WireError::InvalidTimestamp);
    }
    let mut secs = [0u8; 8];
    let mut nanos = [0u8; 4];
    secs.copy_from_slice(&blob[..8]);
    nanos.copy_from_slice(&blob[8..]);
    Utc.timestamp_opt(i64::from_le_bytes(secs), u32::from_le_bytes(nanos))
        .single()
        .ok_or(WireError::InvalidTimestamp)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
