//! /peers and /save handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use teomon_services::{PeerView, RegistryError};

use super::ApiState;

// ── /peers ───────────────────────────────────────────────────────────────────

pub async fn handle_peers(State(state): State<ApiState>) -> Json<Vec<PeerView>> {
    Json(state.registry.views())
}

pub async fn handle_peers_table(State(state): State<ApiState>) -> String {
    state.registry.table()
}

// ── /peers/:address (GET) ────────────────────────────────────────────────────

pub async fn handle_peer_get(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<PeerView>, (StatusCode, String)> {
    let record = state
        .registry
        .get(&address)
        .ok_or((StatusCode::NOT_FOUND, format!("peer {address} not found")))?;
    Ok(Json(PeerView::from(&record)))
}

// ── /peers/:address (DELETE) ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PeerDeleteResponse {
    pub address: String,
    pub deleted: bool,
}

pub async fn handle_peer_delete(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<PeerDeleteResponse>, (StatusCode, String)> {
    match state.registry.del(&address) {
        Ok(_) => {
            tracing::info!(address = %address, "peer deleted via API");
            Ok(Json(PeerDeleteResponse {
                address,
                deleted: true,
            }))
        }
        Err(e @ RegistryError::NotFound(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

// ── /save ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub saved: usize,
    pub path: String,
}

pub async fn handle_save(
    State(state): State<ApiState>,
) -> Result<Json<SaveResponse>, (StatusCode, String)> {
    let saved = state
        .registry
        .save(&state.peers_file)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(SaveResponse {
        saved,
        path: state.peers_file.display().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use teomon_core::MetricRecord;
    use teomon_services::{PeerRegistry, TcpTransport};

    fn state(name: &str) -> ApiState {
        let (transport, _inbound) = TcpTransport::new("collector");
        ApiState {
            registry: PeerRegistry::new(),
            transport: Arc::new(transport),
            peers_file: std::env::temp_dir()
                .join(format!("teomon-api-{}-{}", name, std::process::id()))
                .join("peers.bin"),
            shutdown_tx: tokio::sync::broadcast::channel(1).0,
        }
    }

    #[tokio::test]
    async fn peers_lists_views_in_display_order() {
        let s = state("list");
        s.registry.add(MetricRecord::new("a", "zeta"));
        s.registry.add(MetricRecord::new("b", "alpha"));

        let Json(views) = handle_peers(State(s)).await;
        let order: Vec<_> = views.iter().map(|v| v.app_short.as_str()).collect();
        assert_eq!(order, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn table_is_plain_text() {
        let s = state("table");
        s.registry.add(MetricRecord::new("a", "app-a"));
        let table = handle_peers_table(State(s)).await;
        assert!(table.contains("app-a"));
        assert!(table.starts_with('-'));
    }

    #[tokio::test]
    async fn unknown_peer_is_404() {
        let s = state("404");
        let err = handle_peer_get(State(s.clone()), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let err = handle_peer_delete(State(s), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_peer() {
        let s = state("del");
        s.registry.add(MetricRecord::new("a", "app"));
        let Json(resp) = handle_peer_delete(State(s.clone()), Path("a".to_string()))
            .await
            .unwrap();
        assert!(resp.deleted);
        assert!(s.registry.is_empty());
    }

    #[tokio::test]
    async fn save_writes_peers_file() {
        let s = state("save");
        s.registry.add(MetricRecord::new("a", "app"));
        let Json(resp) = handle_save(State(s.clone())).await.unwrap();
        assert_eq!(resp.saved, 1);
        assert!(s.peers_file.exists());
        if let Some(dir) = s.peers_file.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
