//! Daemon status and shutdown commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    address: String,
    protocol_version: String,
    known_peers: usize,
    online_peers: usize,
    connected_peers: usize,
    peers_file: String,
}

#[derive(Deserialize)]
struct ShutdownResponse {
    message: String,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Teomon Collector Status");
    println!("═══════════════════════════════════════");
    println!("  Address          : {}", resp.address);
    println!("  Protocol version : {}", resp.protocol_version);
    println!("  Known peers      : {}", resp.known_peers);
    println!("  Online peers     : {}", resp.online_peers);
    println!("  Connections      : {}", resp.connected_peers);
    println!("  Registry file    : {}", resp.peers_file);

    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    let resp: ShutdownResponse =
        post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
