//! Presentation — table and JSON views of the registry.
//!
//! Both renderers work on a snapshot and recompute display order first:
//! offline peers lead, then ascending by short name.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use teomon_core::metric::MetricRecord;
use teomon_core::param::{
    Value, PARAM_HOST, PARAM_MACHINE_ID, PARAM_MAY_OFFLINE, PARAM_ONLINE, PARAM_PEERS,
    RESERVED_PARAMS,
};

use crate::registry::PeerRegistry;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Offline (explicit `online = false`) first, then by `app_short`. Stable.
pub fn sort_for_display(records: &mut [MetricRecord]) {
    records.sort_by(|a, b| {
        (!a.is_offline(), &a.app_short).cmp(&(!b.is_offline(), &b.app_short))
    });
}

// ── Table ─────────────────────────────────────────────────────────────────────

struct Widths {
    name: usize,
    ver: usize,
    proto: usize,
    address: usize,
    start: usize,
}

impl Widths {
    fn measure(records: &[MetricRecord]) -> Self {
        let mut w = Widths {
            name: "name".len(),
            ver: "ver".len(),
            proto: "protocol-ver".len(),
            address: "address".len(),
            start: "start time".len(),
        };
        for m in records {
            w.name = w.name.max(m.app_short.chars().count());
            w.ver = w.ver.max(m.app_version.chars().count());
            w.proto = w.proto.max(m.protocol_version.chars().count());
            w.address = w.address.max(m.address.chars().count());
            w.start = w.start.max(start_time(m).chars().count());
        }
        w
    }
}

fn start_time(m: &MetricRecord) -> String {
    m.start_time.format(TIME_FORMAT).to_string()
}

fn param_text(m: &MetricRecord, name: &str) -> String {
    m.params.get(name).map(|v| v.to_string()).unwrap_or_default()
}

/// Render records as a fixed-width text table.
///
/// One row per record, `n` marking records not yet saved. Non-reserved
/// parameters follow their row as indented `name: value`
/// lines, with a blank line after them. The output ends with the rule,
/// without a trailing newline.
pub fn render_table(records: &[MetricRecord]) -> String {
    let mut records = records.to_vec();
    sort_for_display(&mut records);
    let w = Widths::measure(&records);

    let header = format!(
        "  # | {:<nw$} | n | {:<vw$} | {:<pw$} | {:<aw$} | online | peers | {:<sw$} ",
        "name",
        "ver",
        "protocol-ver",
        "address",
        "start time",
        nw = w.name,
        vw = w.ver,
        pw = w.proto,
        aw = w.address,
        sw = w.start,
    );
    let rule = "-".repeat(header.chars().count());

    let mut out = String::new();
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&header);
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');

    for (i, m) in records.iter().enumerate() {
        out.push_str(&format!(
            " {:>2} | {:<nw$} | {} | {:<vw$} | {:<pw$} | {:<aw$} | {:<6} | {:>5} | {:<sw$} \n",
            i + 1,
            m.app_short,
            if m.is_new { "n" } else { " " },
            m.app_version,
            m.protocol_version,
            m.address,
            param_text(m, PARAM_ONLINE),
            param_text(m, PARAM_PEERS),
            start_time(m),
            nw = w.name,
            vw = w.ver,
            pw = w.proto,
            aw = w.address,
            sw = w.start,
        ));

        let mut extra = 0;
        for (name, value) in m.params.sorted() {
            if RESERVED_PARAMS.contains(&name.as_str()) {
                continue;
            }
            out.push_str(&format!("   {name}: {value}\n"));
            extra += 1;
        }
        if extra > 0 {
            out.push('\n');
        }
    }

    out.push_str(&rule);
    out
}

// ── JSON ──────────────────────────────────────────────────────────────────────

/// JSON view of one record: identity fields with the reserved parameters
/// promoted to top-level keys. Other parameters go under `params`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerView {
    pub address: String,
    pub app_name: String,
    pub app_short: String,
    pub app_version: String,
    pub protocol_version: String,
    pub app_start_time: DateTime<Utc>,
    pub is_new: bool,
    pub may_offline: bool,
    pub online: bool,
    pub peers: i64,
    pub host: String,
    pub machine_id: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
}

impl From<&MetricRecord> for PeerView {
    fn from(m: &MetricRecord) -> Self {
        let mut params = m.params.sorted();
        let mut take = |name: &str| params.remove(name);

        let may_offline = take(PARAM_MAY_OFFLINE).and_then(|v| v.as_bool()).unwrap_or(false);
        let online = take(PARAM_ONLINE).and_then(|v| v.as_bool()).unwrap_or(false);
        let peers = take(PARAM_PEERS).and_then(|v| v.as_i64()).unwrap_or(0);
        let host = take(PARAM_HOST).map(|v| v.to_string()).unwrap_or_default();
        let machine_id = take(PARAM_MACHINE_ID).map(|v| v.to_string()).unwrap_or_default();
        params.retain(|name, _| !RESERVED_PARAMS.contains(&name.as_str()));

        Self {
            address: m.address.clone(),
            app_name: m.app_name.clone(),
            app_short: m.app_short.clone(),
            app_version: m.app_version.clone(),
            protocol_version: m.protocol_version.clone(),
            app_start_time: m.start_time,
            is_new: m.is_new,
            may_offline,
            online,
            peers,
            host,
            machine_id,
            params,
        }
    }
}

/// Views of `records` in display order.
pub fn peer_views(records: &[MetricRecord]) -> Vec<PeerView> {
    let mut records = records.to_vec();
    sort_for_display(&mut records);
    records.iter().map(PeerView::from).collect()
}

/// Render records as a JSON array in display order.
pub fn render_json(records: &[MetricRecord]) -> serde_json::Result<String> {
    serde_json::to_string(&peer_views(records))
}

impl PeerRegistry {
    pub fn table(&self) -> String {
        render_table(&self.snapshot())
    }

    pub fn views(&self) -> Vec<PeerView> {
        peer_views(&self.snapshot())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        render_json(&self.snapshot())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
