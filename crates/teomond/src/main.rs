//! teomond — Teomon monitoring collector daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use teomon_core::config::TeomonConfig;
use teomon_core::param::{PARAM_HOST, PARAM_MACHINE_ID, PARAM_ONLINE, PARAM_PEERS};
use teomon_core::wire::PROTOCOL_VERSION;
use teomon_core::MetricRecord;

use teomon_api::ApiState;
use teomon_services::{
    CommandDispatcher, HealthMonitor, PeerRegistry, TcpTransport, Transport, TransportEvent,
};

mod host;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = TeomonConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = TeomonConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TeomonConfig::default()
    });
    tracing::info!(
        address = %config.identity.address,
        listen = %config.network.listen_addr,
        api_port = config.network.api_port,
        "teomond starting"
    );

    // Registry
    let registry = PeerRegistry::new();
    let peers_file = config.storage.peers_file.clone();
    if peers_file.exists() {
        if let Err(e) = registry.load(&peers_file) {
            tracing::warn!(path = %peers_file.display(), error = %e, "failed to load registry, starting empty");
        }
    }

    // Transport
    let (transport, inbound) = TcpTransport::new(config.identity.address.clone());
    let listener = TcpListener::bind(&config.network.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.network.listen_addr))?;
    let shared: Arc<dyn Transport> = Arc::new(transport.clone());

    // Own record
    let own = own_record(&config, !registry.contains(&config.identity.address));
    registry.add(own);

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let listener_task = tokio::spawn(transport.clone().serve(listener, shutdown_tx.subscribe()));

    let dispatcher = CommandDispatcher::collector(
        registry.clone(),
        peers_file.clone(),
        config.collector.keep_params_on_reannounce,
    );
    let dispatch_task = tokio::spawn(dispatcher.run(
        shared.clone(),
        inbound,
        shutdown_tx.subscribe(),
    ));

    let health = HealthMonitor::new(
        registry.clone(),
        shared.clone(),
        Duration::from_millis(config.collector.health_interval_ms),
    );
    let health_task = tokio::spawn(health.run(shutdown_tx.subscribe()));

    let peers_task = tokio::spawn(track_own_peers(
        registry.clone(),
        shared.clone(),
        shutdown_tx.subscribe(),
    ));

    let api_task = {
        let state = ApiState {
            registry: registry.clone(),
            transport: shared.clone(),
            peers_file: peers_file.clone(),
            shutdown_tx: shutdown_tx.clone(),
        };
        let port = config.network.api_port;
        tokio::spawn(async move {
            if let Err(e) = teomon_api::serve(state, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()   => tracing::info!("shutting down"),
        r = listener_task        => tracing::error!("transport listener exited: {:?}", r),
        r = dispatch_task        => tracing::error!("dispatcher exited: {:?}", r),
        r = health_task          => tracing::error!("health monitor exited: {:?}", r),
        r = peers_task           => tracing::error!("peers tracker exited: {:?}", r),
        r = api_task             => tracing::error!("API task exited: {:?}", r),
    }
    let _ = shutdown_tx.send(());

    if config.storage.save_on_exit {
        match registry.save(&peers_file) {
            Ok(count) => tracing::info!(count, path = %peers_file.display(), "registry saved on exit"),
            Err(e) => tracing::error!(error = %e, "failed to save registry on exit"),
        }
    }

    Ok(())
}

/// The collector's own registry entry.
fn own_record(config: &TeomonConfig, is_new: bool) -> MetricRecord {
    let mut m = MetricRecord::new(&config.identity.address, &config.identity.app_short);
    m.app_name = config.identity.app_name.clone();
    m.app_version = env!("CARGO_PKG_VERSION").to_string();
    m.protocol_version = PROTOCOL_VERSION.to_string();
    m.start_time = Utc::now();
    m.is_new = is_new;
    m.params.upsert(PARAM_ONLINE, true);
    m.params.upsert(PARAM_PEERS, 0i64);
    m.params.upsert(PARAM_HOST, host::hostname());
    m.params.upsert(PARAM_MACHINE_ID, host::machine_id());
    m
}

/// Keep the collector's own `peers` parameter equal to its connection count.
async fn track_own_peers(
    registry: PeerRegistry,
    transport: Arc<dyn Transport>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut events = transport.subscribe();
    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            ev = events.recv() => {
                match ev {
                    Ok(TransportEvent::Connected(_) | TransportEvent::Disconnected(_))
                    | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let peers = transport.num_peers();
                        let param = teomon_core::Parameter::new(PARAM_PEERS, peers);
                        if let Err(e) = registry.set_param(transport.address(), param) {
                            tracing::debug!(error = %e, "own peers not updated");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    }
}
