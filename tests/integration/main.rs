//! Teomon integration test harness.
//!
//! Every test runs a complete collector in-process: TCP transport on an
//! ephemeral loopback port, command dispatcher and health monitor. Agents
//! and clients are further transports in the same process.
//!
//!   cargo test --test integration
//!
//! Each test owns its collector and temp directory; nothing is shared.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use teomon_core::MetricRecord;
use teomon_services::{
    frame, CommandDispatcher, Dialer, HealthMonitor, Inbound, PeerRegistry, TcpTransport,
    Transport,
};

mod api;
mod collector;
mod persistence;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const COLLECTOR: &str = "teomon";
pub const HEALTH_INTERVAL: Duration = Duration::from_millis(50);

/// A running collector.
pub struct Collector {
    pub registry: PeerRegistry,
    pub transport: TcpTransport,
    /// Socket address agents dial.
    pub addr: String,
    pub peers_file: PathBuf,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl Collector {
    /// Start a collector with an empty registry, persisting under a fresh
    /// temp directory named after `test`.
    pub async fn start(test: &str) -> Result<Self> {
        Self::start_with(PeerRegistry::new(), temp_dir(test).join("peers.bin")).await
    }

    pub async fn start_with(registry: PeerRegistry, peers_file: PathBuf) -> Result<Self> {
        let (transport, inbound) = TcpTransport::new(COLLECTOR);
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        let (shutdown_tx, _) = broadcast::channel(1);

        registry.add(MetricRecord::new(COLLECTOR, "teomon"));

        tokio::spawn(transport.clone().serve(listener, shutdown_tx.subscribe()));

        let shared: Arc<dyn Transport> = Arc::new(transport.clone());
        let dispatcher = CommandDispatcher::collector(registry.clone(), peers_file.clone(), true);
        tokio::spawn(dispatcher.run(shared.clone(), inbound, shutdown_tx.subscribe()));

        let health = HealthMonitor::new(registry.clone(), shared, HEALTH_INTERVAL);
        tokio::spawn(health.run(shutdown_tx.subscribe()));

        Ok(Self {
            registry,
            transport,
            addr,
            peers_file,
            shutdown_tx,
        })
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// A client transport connected to a collector.
pub struct Client {
    pub transport: TcpTransport,
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
    pub collector: String,
}

impl Client {
    pub async fn connect(name: &str, collector: &Collector) -> Result<Self> {
        let (transport, inbound) = TcpTransport::new(name);
        transport.connect_to(&collector.addr).await?;
        Ok(Self {
            transport,
            inbound,
            collector: collector.addr.clone(),
        })
    }

    pub fn send(&self, command: u8, payload: &[u8]) -> Result<()> {
        self.transport.send_to(&self.collector, frame(command, payload))
    }

    /// Send `command` and wait for the reply frame's payload.
    pub async fn request(&mut self, command: u8) -> Result<Bytes> {
        self.send(command, &[])?;
        let reply = tokio::time::timeout(Duration::from_secs(2), self.inbound.recv())
            .await
            .context("no reply within 2s")?
            .context("client inbound closed")?;
        if reply.data.first() != Some(&command) {
            bail!("reply for command {:?}, expected {}", reply.data.first(), command);
        }
        Ok(reply.data.slice(1..))
    }
}

/// A fresh, empty directory for one test.
pub fn temp_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("teomon-it-{}-{}", test, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Poll `cond` until it holds, failing after 3 seconds.
pub async fn eventually(what: &str, cond: impl Fn() -> bool) -> Result<()> {
    for _ in 0..300 {
        if cond() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bail!("timed out waiting for: {what}")
}

/// Metric an agent would announce.
pub fn agent_metric(short: &str, version: &str) -> MetricRecord {
    let mut m = MetricRecord::new("self", short);
    m.app_name = format!("{short} test agent");
    m.app_version = version.to_string();
    m.protocol_version = teomon_core::wire::PROTOCOL_VERSION.to_string();
    m
}

#[tokio::test]
async fn test_collector_registers_itself() {
    let c = Collector::start("self").await.unwrap();
    eventually("own record online", || {
        c.registry.get(COLLECTOR).and_then(|m| m.online()) == Some(true)
    })
    .await
    .unwrap();
    assert_eq!(c.registry.len(), 1);
}
