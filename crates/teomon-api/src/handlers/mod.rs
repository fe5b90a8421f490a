//! HTTP API handlers — exposes the collector's registry as JSON and text.

pub mod peers;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use teomon_services::{PeerRegistry, Transport};

#[derive(Clone)]
pub struct ApiState {
    pub registry: PeerRegistry,
    pub transport: Arc<dyn Transport>,
    /// Registry file used by `/save`.
    pub peers_file: PathBuf,
    /// Shutdown broadcast sender — signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

// Re-export handler functions for use in router setup.
pub use peers::{
    handle_peer_delete, handle_peer_get, handle_peers, handle_peers_table, handle_save,
};
pub use status::{handle_shutdown, handle_status};
