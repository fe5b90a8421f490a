//! Peer registry commands.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, delete_json, get_json, get_text, post_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerView {
    address: String,
    app_name: String,
    app_short: String,
    app_version: String,
    protocol_version: String,
    app_start_time: String,
    is_new: bool,
    may_offline: bool,
    online: bool,
    peers: i64,
    host: String,
    machine_id: String,
    #[serde(default)]
    params: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct DeleteResponse {
    address: String,
}

#[derive(Deserialize)]
struct SaveResponse {
    saved: usize,
    path: String,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_peers(port: u16) -> Result<()> {
    let table = get_text(&format!("{}/peers/table", base_url(port))).await?;
    println!("{}", table);
    Ok(())
}

pub async fn cmd_peers_json(port: u16) -> Result<()> {
    let peers: serde_json::Value = get_json(&format!("{}/peers", base_url(port))).await?;
    println!("{}", serde_json::to_string_pretty(&peers)?);
    Ok(())
}

pub async fn cmd_peer(port: u16, address: &str) -> Result<()> {
    let p: PeerView = get_json(&format!("{}/peers/{}", base_url(port), address)).await?;

    println!("═══════════════════════════════════════");
    println!("  Peer {}", p.address);
    println!("═══════════════════════════════════════");
    println!("  Application  : {} ({})", p.app_name, p.app_short);
    println!("  Version      : {}", p.app_version);
    println!("  Protocol     : {}", p.protocol_version);
    println!("  Started      : {}", p.app_start_time);
    println!("  Online       : {}", if p.online { "yes" } else { "no" });
    println!("  May offline  : {}", if p.may_offline { "yes" } else { "no" });
    println!("  Connections  : {}", p.peers);
    println!("  Host         : {}", p.host);
    println!("  Machine id   : {}", p.machine_id);
    if p.is_new {
        println!("  (not yet saved)");
    }

    if !p.params.is_empty() {
        println!("\n  Parameters:");
        for (name, value) in &p.params {
            println!("    {}: {}", name, value);
        }
    }

    Ok(())
}

pub async fn cmd_del(port: u16, address: &str) -> Result<()> {
    let resp: DeleteResponse =
        delete_json(&format!("{}/peers/{}", base_url(port), address)).await?;
    println!("Deleted {}", resp.address);
    Ok(())
}

pub async fn cmd_save(port: u16) -> Result<()> {
    let resp: SaveResponse = post_json(&format!("{}/save", base_url(port))).await?;
    println!("Saved {} peers to {}", resp.saved, resp.path);
    Ok(())
}
