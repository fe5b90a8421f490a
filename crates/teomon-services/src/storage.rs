//! Registry persistence.
//!
//! The file holds exactly the Peers framing: `u16 count` followed by
//! `count` length-prefixed MetricRecord chunks. Loading streams the file
//! chunk by chunk, so there is no upper bound on its size.
//!
//! `is_new` handling: the snapshot is written with every flag cleared, and
//! the live records' flags are cleared only once the write has succeeded.
//! A failed save leaves them set, as does being left out of the file for
//! having grown too large to encode.

use std::fs;
use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::path::Path;

use bytes::Bytes;
use teomon_core::metric::MetricRecord;
use teomon_core::wire::WireError;

use crate::registry::{encode_fitting, PeerRegistry, RegistryError};

impl PeerRegistry {
    /// Write the registry to `path` atomically (temp file, then rename).
    /// Returns the number of records written.
    pub fn save(&self, path: &Path) -> Result<usize, RegistryError> {
        let snapshot: Vec<MetricRecord> = self
            .snapshot()
            .into_iter()
            .map(|m| MetricRecord {
                is_new: false,
                ..m
            })
            .collect();
        let (data, written) = encode_fitting(&snapshot)?;

        write_atomic(path, &data)?;

        let mut records = self.write();
        for m in records.iter_mut() {
            if written.contains(&m.address) {
                m.is_new = false;
            }
        }
        tracing::info!(path = %path.display(), count = written.len(), "registry saved");
        Ok(written.len())
    }

    /// Replace the registry's contents with the records stored in `path`.
    /// Returns the number of records loaded.
    pub fn load(&self, path: &Path) -> Result<usize, RegistryError> {
        let file = fs::File::open(path)?;
        let records = read_peers(BufReader::new(file))?;
        let count = records.len();
        self.replace_all(records);
        tracing::info!(path = %path.display(), count, "registry loaded");
        Ok(count)
    }
}

/// Stream-decode a Peers list from `reader`.
pub fn read_peers(mut reader: impl Read) -> Result<Vec<MetricRecord>, RegistryError> {
    let count = read_u16(&mut reader)?;
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = read_u16(&mut reader)? as usize;
        let mut chunk = vec![0u8; len];
        read_exact(&mut reader, &mut chunk)?;
        records.push(MetricRecord::decode(Bytes::from(chunk))?);
    }
    Ok(records)
}

fn read_u16(reader: &mut impl Read) -> Result<u16, RegistryError> {
    let mut b = [0u8; 2];
    read_exact(reader, &mut b)?;
    Ok(u16::from_le_bytes(b))
}

/// `read_exact`, with a short file reported as truncated input.
fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), RegistryError> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(WireError::TruncatedInput {
            needed: buf.len(),
            remaining: 0,
        }
        .into()),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
