//! Peer registry — every known MetricRecord, keyed by address.
//!
//! Structure (which records exist, in what order) is guarded by one
//! reader/writer lock. Parameters are not: each record's ParameterStore is
//! its own concurrent map, so health checks and `parameter` commands update
//! values without taking the registry's write lock.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::{Bytes, BytesMut};
use teomon_core::metric::MetricRecord;
use teomon_core::param::{Parameter, PARAM_ONLINE};
use teomon_core::wire::{self, WireError, MAX_CHUNK};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("peer {0} not found")]
    NotFound(String),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// The shared peer registry. Cloning yields another handle to the same
/// collection.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    records: Arc<RwLock<Vec<MetricRecord>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Vec<MetricRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Vec<MetricRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the record for `record.address`.
    ///
    /// A replaced record is dropped wholesale, parameters included. A record
    /// seen for the first time gets `online = true`. Returns true if the
    /// address was not known before.
    pub fn add(&self, record: MetricRecord) -> bool {
        let mut records = self.write();
        if let Some(existing) = records.iter_mut().find(|m| m.address == record.address) {
            *existing = record;
            return false;
        }
        record.params.upsert(PARAM_ONLINE, true);
        tracing::info!(address = %record.address, app = %record.app_short, "peer registered");
        records.push(record);
        true
    }

    /// Record for `address`. The returned record shares its parameter store
    /// with the registry's copy.
    pub fn get(&self, address: &str) -> Option<MetricRecord> {
        self.read().iter().find(|m| m.address == address).cloned()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.read().iter().any(|m| m.address == address)
    }

    /// Remove the record for `address`, keeping the order of the others.
    pub fn del(&self, address: &str) -> Result<MetricRecord, RegistryError> {
        let mut records = self.write();
        let idx = records
            .iter()
            .position(|m| m.address == address)
            .ok_or_else(|| RegistryError::NotFound(address.to_string()))?;
        let removed = records.remove(idx);
        tracing::info!(address, "peer deleted");
        Ok(removed)
    }

    /// Upsert one parameter into the record for `address`.
    pub fn set_param(&self, address: &str, param: Parameter) -> Result<(), RegistryError> {
        let records = self.read();
        let record = records
            .iter()
            .find(|m| m.address == address)
            .ok_or_else(|| RegistryError::NotFound(address.to_string()))?;
        record.params.upsert(param.name, param.value);
        Ok(())
    }

    /// Visit every record under the shared lock. `f` must not call back into
    /// this registry's structural operations (`add`, `del`, `save`).
    pub fn each(&self, mut f: impl FnMut(&MetricRecord)) {
        for m in self.read().iter() {
            f(m);
        }
    }

    /// Copy of all records in registry order.
    pub fn snapshot(&self) -> Vec<MetricRecord> {
        self.read().clone()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.read().iter().map(|m| m.address.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Replace the whole collection.
    pub fn replace_all(&self, records: Vec<MetricRecord>) {
        *self.write() = records;
    }

    /// Encode all records as a Peers list, in registry order. Records too
    /// large for a chunk are left out (see [`encode_fitting`]).
    pub fn encode(&self) -> Result<Bytes, WireError> {
        encode_fitting(self.read().iter()).map(|(data, _)| data)
    }
}

/// Encode `records` as a Peers list, skipping any record whose encoding does
/// not fit one chunk. Parameters can grow a record without bound, and one
/// such peer must not make the whole list unencodable. Returns the list and
/// the addresses it holds.
pub(crate) fn encode_fitting<'a>(
    records: impl IntoIterator<Item = &'a MetricRecord>,
) -> Result<(Bytes, Vec<String>), WireError> {
    let mut chunks = Vec::new();
    for m in records {
        match m.encode() {
            Ok(data) if data.len() <= MAX_CHUNK => chunks.push((m.address.clone(), data)),
            Ok(data) => tracing::warn!(
                address = %m.address,
                size = data.len(),
                max = MAX_CHUNK,
                "record too large to encode, left out"
            ),
            Err(e) => tracing::warn!(address = %m.address, error = %e, "record not encodable, left out"),
        }
    }

    let mut buf = BytesMut::new();
    wire::put_count(&mut buf, chunks.len())?;
    let mut addresses = Vec::with_capacity(chunks.len());
    for (address, data) in chunks {
        wire::put_chunk(&mut buf, &data)?;
        addresses.push(address);
    }
    Ok((buf.freeze(), addresses))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
