//! Health monitor — keeps every record's `online` parameter in step with the
//! transport's view of who is connected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use teomon_core::param::PARAM_ONLINE;

use crate::registry::PeerRegistry;
use crate::transport::Transport;

/// Shortest check period. `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub struct HealthMonitor {
    registry: PeerRegistry,
    transport: Arc<dyn Transport>,
    interval: Duration,
}

impl HealthMonitor {
    /// A zero `interval` is raised to one millisecond.
    pub fn new(registry: PeerRegistry, transport: Arc<dyn Transport>, interval: Duration) -> Self {
        Self {
            registry,
            transport,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// One pass over the registry. The collector's own address is always
    /// online. Returns the number of records that changed state.
    pub fn check_once(&self) -> usize {
        let own = self.transport.address();
        let mut changed = 0;
        self.registry.each(|m| {
            let online = m.address == own || self.transport.is_connected(&m.address);
            if m.online() != Some(online) {
                tracing::debug!(address = %m.address, online, "peer state changed");
                changed += 1;
            }
            m.params.upsert(PARAM_ONLINE, online);
        });
        changed
    }

    /// Check every `interval` until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("health monitor shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    let changed = self.check_once();
                    tracing::trace!(changed, "health check");
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
