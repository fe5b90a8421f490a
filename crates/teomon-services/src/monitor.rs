//! Agent-side monitor client.
//!
//! Announces this process to a collector and keeps the announcement current:
//! the metric is resent on every reconnect to the collector, the `peers`
//! parameter on every connection change, and a lost collector connection is
//! redialed at a fixed interval until it comes back.

use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use teomon_core::metric::MetricRecord;
use teomon_core::param::{Parameter, Value, PARAM_PEERS};
use teomon_core::wire::{CMD_METRIC, CMD_PARAMETER};

use crate::dispatch::frame;
use crate::transport::{Dialer, TransportEvent};

pub struct Monitor<T: Dialer + Clone + 'static> {
    transport: T,
    collector: String,
    task: JoinHandle<()>,
}

impl<T: Dialer + Clone + 'static> Monitor<T> {
    /// Connect to `collector` (retrying every `retry`), announce `metric`
    /// and the current connection count, then keep both up to date in the
    /// background.
    pub async fn connect(
        transport: T,
        collector: impl Into<String>,
        metric: &MetricRecord,
        retry: Duration,
    ) -> anyhow::Result<Self> {
        let collector = collector.into();
        let announce = frame(CMD_METRIC, &metric.encode().context("encode metric")?);

        dial_until_connected(&transport, &collector, retry).await;
        transport.send_to(&collector, announce.clone())?;
        send_peers(&transport, &collector);

        // Subscribed after the first announce so the initial connect does not
        // trigger a resend.
        let events = transport.subscribe();

        let task = tokio::spawn(follow(
            transport.clone(),
            collector.clone(),
            announce,
            events,
            retry,
        ));

        Ok(Self {
            transport,
            collector,
            task,
        })
    }

    /// Send one parameter to the collector.
    pub fn send_param(&self, name: &str, value: impl Into<Value>) -> anyhow::Result<()> {
        let payload = Parameter::new(name, value).encode()?;
        self.transport
            .send_to(&self.collector, frame(CMD_PARAMETER, &payload))
    }

    /// Send a raw command to the collector.
    pub fn send_command(&self, command: u8, payload: &[u8]) -> anyhow::Result<()> {
        self.transport.send_to(&self.collector, frame(command, payload))
    }

    pub fn collector(&self) -> &str {
        &self.collector
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Dialer + Clone + 'static> Drop for Monitor<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn dial_until_connected<T: Dialer>(transport: &T, collector: &str, retry: Duration) {
    loop {
        match transport.connect_to(collector).await {
            Ok(()) => {
                tracing::info!(collector, "connected to collector");
                return;
            }
            Err(e) => {
                tracing::debug!(collector, error = %e, "collector not reachable, retrying");
                tokio::time::sleep(retry).await;
            }
        }
    }
}

fn send_peers<T: Dialer>(transport: &T, collector: &str) {
    let param = Parameter::new(PARAM_PEERS, transport.num_peers());
    let sent = param
        .encode()
        .map_err(anyhow::Error::from)
        .and_then(|p| transport.send_to(collector, frame(CMD_PARAMETER, &p)));
    if let Err(e) = sent {
        tracing::debug!(collector, error = %e, "peers update not sent");
    }
}

async fn follow<T: Dialer + Clone + 'static>(
    transport: T,
    collector: String,
    announce: Bytes,
    mut events: broadcast::Receiver<TransportEvent>,
    retry: Duration,
) {
    if !transport.is_connected(&collector) {
        dial_until_connected(&transport, &collector, retry).await;
    }
    loop {
        match events.recv().await {
            Ok(TransportEvent::Connected(address)) => {
                if address == collector {
                    if let Err(e) = transport.send_to(&collector, announce.clone()) {
                        tracing::debug!(error = %e, "metric not resent");
                    }
                }
                send_peers(&transport, &collector);
            }
            Ok(TransportEvent::Disconnected(address)) => {
                if address == collector {
                    tracing::warn!(collector = %collector, "collector connection lost");
                    dial_until_connected(&transport, &collector, retry).await;
                } else {
                    send_peers(&transport, &collector);
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!(skipped = n, "transport events lagged");
                send_peers(&transport, &collector);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
