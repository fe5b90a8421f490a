//! Collector command handlers.
//!
//! Each handler serves one command byte. Handlers receive the sender's
//! transport address and the payload that followed the command byte.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bytes::Bytes;
use teomon_core::metric::MetricRecord;
use teomon_core::param::Parameter;
use teomon_core::wire::{CMD_LIST, CMD_METRIC, CMD_PARAMETER, CMD_SAVE};

use crate::registry::PeerRegistry;

/// Trait for handlers of one inbound command.
pub trait CommandHandler: Send + Sync {
    /// Command byte this handler serves.
    fn command(&self) -> u8;

    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Handle one command. A returned payload is sent back to `from`.
    fn handle(&self, from: &str, payload: Bytes) -> Result<Option<Bytes>>;
}

// ── metric ────────────────────────────────────────────────────────────────────

/// `metric`: a peer announces its identity and parameters.
///
/// The record is stored under the sender's transport address whatever the
/// payload says. A first announcement is marked new; a re-announcement keeps
/// the stored record's flag and, with `keep_params`, any parameters the new
/// announcement does not carry.
pub struct MetricHandler {
    registry: PeerRegistry,
    keep_params: bool,
}

impl MetricHandler {
    pub fn new(registry: PeerRegistry, keep_params: bool) -> Self {
        Self {
            registry,
            keep_params,
        }
    }
}

impl CommandHandler for MetricHandler {
    fn command(&self) -> u8 {
        CMD_METRIC
    }

    fn name(&self) -> &'static str {
        "metric"
    }

    fn handle(&self, from: &str, payload: Bytes) -> Result<Option<Bytes>> {
        let mut metric = MetricRecord::decode(payload).context("decode metric")?;
        metric.address = from.to_string();

        match self.registry.get(from) {
            None => metric.is_new = true,
            Some(old) => {
                metric.is_new = old.is_new;
                if self.keep_params {
                    old.params.for_each(|name, value| {
                        if !metric.params.contains(name) {
                            metric.params.upsert(name, value.clone());
                        }
                    });
                }
            }
        }

        tracing::debug!(
            address = from,
            app = %metric.app_short,
            version = %metric.app_version,
            params = metric.params.len(),
            "metric received"
        );
        self.registry.add(metric);
        Ok(None)
    }
}

// ── parameter ─────────────────────────────────────────────────────────────────

/// `parameter`: a peer updates one of its own parameters.
pub struct ParameterHandler {
    registry: PeerRegistry,
}

impl ParameterHandler {
    pub fn new(registry: PeerRegistry) -> Self {
        Self { registry }
    }
}

impl CommandHandler for ParameterHandler {
    fn command(&self) -> u8 {
        CMD_PARAMETER
    }

    fn name(&self) -> &'static str {
        "parameter"
    }

    fn handle(&self, from: &str, payload: Bytes) -> Result<Option<Bytes>> {
        let param = Parameter::decode(payload).context("decode parameter")?;
        tracing::trace!(address = from, name = %param.name, value = %param.value, "parameter received");
        self.registry.set_param(from, param)?;
        Ok(None)
    }
}

// ── list ──────────────────────────────────────────────────────────────────────

/// `list`: reply with every known record.
pub struct ListHandler {
    registry: PeerRegistry,
}

impl ListHandler {
    pub fn new(registry: PeerRegistry) -> Self {
        Self { registry }
    }
}

impl CommandHandler for ListHandler {
    fn command(&self) -> u8 {
        CMD_LIST
    }

    fn name(&self) -> &'static str {
        "list"
    }

    fn handle(&self, _from: &str, _payload: Bytes) -> Result<Option<Bytes>> {
        Ok(Some(self.registry.encode()?))
    }
}

// ── save ──────────────────────────────────────────────────────────────────────

/// `save`: persist the registry.
pub struct SaveHandler {
    registry: PeerRegistry,
    path: PathBuf,
}

impl SaveHandler {
    pub fn new(registry: PeerRegistry, path: PathBuf) -> Self {
        Self { registry, path }
    }
}

impl CommandHandler for SaveHandler {
    fn command(&self) -> u8 {
        CMD_SAVE
    }

    fn name(&self) -> &'static str {
        "save"
    }

    fn handle(&self, from: &str, _payload: Bytes) -> Result<Option<Bytes>> {
        let count = self
            .registry
            .save(&self.path)
            .with_context(|| format!("save to {}", self.path.display()))?;
        tracing::info!(requested_by = from, count, "registry saved on request");
        Ok(None)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
