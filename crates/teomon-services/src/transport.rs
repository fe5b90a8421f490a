//! Transport capability — what the collector and the agent-side monitor need
//! from the connection layer, and nothing more.

use std::future::Future;

use bytes::Bytes;
use tokio::sync::broadcast;

/// Connection state change of one remote address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(String),
    Disconnected(String),
}

/// A connection layer that can address peers by string.
pub trait Transport: Send + Sync {
    /// Own address, as announced to peers.
    fn address(&self) -> &str;

    /// True while a connection to `address` is established.
    fn is_connected(&self, address: &str) -> bool;

    /// Number of established connections.
    fn num_peers(&self) -> usize;

    /// Queue `data` for delivery to `address`.
    fn send_to(&self, address: &str, data: Bytes) -> anyhow::Result<()>;

    /// Receiver of connect/disconnect notifications from now on.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}

/// A transport that can also dial out.
pub trait Dialer: Transport {
    /// Connect to `address`. Succeeds once the connection is established.
    fn connect_to(&self, address: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}
