//! /status and /daemon/shutdown handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use teomon_core::wire::PROTOCOL_VERSION;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub address: String,
    pub protocol_version: String,
    pub known_peers: usize,
    pub online_peers: usize,
    pub connected_peers: usize,
    pub peers_file: String,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let mut known_peers = 0;
    let mut online_peers = 0;
    state.registry.each(|m| {
        known_peers += 1;
        if m.online() == Some(true) {
            online_peers += 1;
        }
    });

    Json(StatusResponse {
        address: state.transport.address().to_string(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        known_peers,
        online_peers,
        connected_peers: state.transport.num_peers(),
        peers_file: state.peers_file.display().to_string(),
    })
}

// ── /daemon/shutdown ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let _ = state.shutdown_tx.send(());
    Json(ShutdownResponse {
        message: "Shutdown initiated".to_string(),
    })
}
