//! Routes inbound frames to command handlers by their leading byte.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::{broadcast, mpsc};

use crate::commands::{CommandHandler, ListHandler, MetricHandler, ParameterHandler, SaveHandler};
use crate::registry::PeerRegistry;
use crate::tcp::Inbound;
use crate::transport::Transport;

/// Build a command frame: the command byte followed by the payload.
pub fn frame(command: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + payload.len());
    buf.put_u8(command);
    buf.put_slice(payload);
    buf.freeze()
}

/// Maps command bytes to handlers and dispatches inbound frames.
#[derive(Default)]
pub struct CommandDispatcher {
    handlers: HashMap<u8, Arc<dyn CommandHandler>>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with the four collector commands registered.
    pub fn collector(registry: PeerRegistry, peers_file: PathBuf, keep_params: bool) -> Self {
        let mut d = Self::new();
        d.register(Arc::new(MetricHandler::new(registry.clone(), keep_params)));
        d.register(Arc::new(ParameterHandler::new(registry.clone())));
        d.register(Arc::new(ListHandler::new(registry.clone())));
        d.register(Arc::new(SaveHandler::new(registry, peers_file)));
        d
    }

    /// Register a handler, replacing any previous one for its command.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(handler.command(), handler);
    }

    /// Handle one inbound frame. Returns the reply frame, if any.
    ///
    /// Unknown commands and handler failures are logged and dropped.
    pub fn dispatch(&self, from: &str, mut data: Bytes) -> Option<Bytes> {
        if data.is_empty() {
            tracing::warn!(from, "empty frame dropped");
            return None;
        }
        let command = data[0];
        let payload = data.split_off(1);

        let Some(handler) = self.handlers.get(&command) else {
            tracing::warn!(from, command, "unknown command dropped");
            return None;
        };

        match handler.handle(from, payload) {
            Ok(reply) => reply.map(|r| frame(command, &r)),
            Err(e) => {
                tracing::warn!(
                    from,
                    command = handler.name(),
                    error = %format!("{e:#}"),
                    "command failed"
                );
                None
            }
        }
    }

    /// Dispatch inbound frames until the channel closes or `shutdown` fires.
    /// Replies go back to the sender through `transport`.
    pub async fn run(
        self,
        transport: Arc<dyn Transport>,
        mut inbound: mpsc::UnboundedReceiver<Inbound>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("dispatcher shutting down");
                    return;
                }
                msg = inbound.recv() => {
                    let Some(Inbound { from, data }) = msg else {
                        return;
                    };
                    if let Some(reply) = self.dispatch(&from, data) {
                        let size = reply.len();
                        if let Err(e) = transport.send_to(&from, reply) {
                            tracing::warn!(to = %from, size, error = %e, "reply not sent");
                        }
                    }
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
