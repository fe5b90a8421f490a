use crate::*;

use teomon_core::param::{Value, PARAM_ONLINE, PARAM_PEERS};
use teomon_core::wire::{CMD_LIST, CMD_METRIC, CMD_PARAMETER, CMD_SAVE};
use teomon_core::{decode_peers, Parameter};
use teomon_services::Monitor;

/// An agent's metric and parameters show up in a `list` reply.
#[tokio::test]
async fn test_agent_appears_in_list() {
    let c = Collector::start("list").await.unwrap();

    let (agent, _rx) = TcpTransport::new("agent-1");
    let mon = Monitor::connect(agent, &c.addr, &agent_metric("app-01", "1.2.3"), HEALTH_INTERVAL)
        .await
        .unwrap();
    mon.send_param("users", 12i64).unwrap();

    eventually("agent parameters", || {
        c.registry.get("agent-1").and_then(|m| m.params.get("users")) == Some(Value::Int(12))
    })
    .await
    .unwrap();

    let mut client = Client::connect("client", &c).await.unwrap();
    let records = decode_peers(client.request(CMD_LIST).await.unwrap()).unwrap();
    let agent = records
        .iter()
        .find(|m| m.address == "agent-1")
        .expect("agent in list");
    assert_eq!(agent.app_short, "app-01");
    assert_eq!(agent.app_version, "1.2.3");
    assert!(agent.is_new);
    assert_eq!(agent.params.get(PARAM_PEERS), Some(Value::Int(1)));
    assert!(records.iter().any(|m| m.address == COLLECTOR));
}

/// Closing a connection flips `online` to false without removing the peer.
#[tokio::test]
async fn test_disconnected_agent_goes_offline() {
    let c = Collector::start("offline").await.unwrap();

    let agent = Client::connect("agent-2", &c).await.unwrap();
    let metric = agent_metric("app-02", "0.1.0").encode().unwrap();
    agent.send(CMD_METRIC, &metric).unwrap();

    eventually("agent online", || {
        c.registry.get("agent-2").and_then(|m| m.online()) == Some(true)
    })
    .await
    .unwrap();

    assert!(agent.transport.close(&agent.collector));

    eventually("agent offline", || {
        c.registry.get("agent-2").and_then(|m| m.online()) == Some(false)
    })
    .await
    .unwrap();
    assert!(c.registry.contains("agent-2"));
    assert_eq!(
        c.registry.get(COLLECTOR).unwrap().params.get(PARAM_ONLINE),
        Some(Value::Bool(true))
    );
}

/// A reconnecting agent is re-registered by its monitor.
#[tokio::test]
async fn test_monitor_reannounces_after_reconnect() {
    let c = Collector::start("reconnect").await.unwrap();

    let (agent, _rx) = TcpTransport::new("agent-3");
    let _mon = Monitor::connect(agent, &c.addr, &agent_metric("app-03", "2.0"), HEALTH_INTERVAL)
        .await
        .unwrap();
    eventually("registered", || c.registry.contains("agent-3")).await.unwrap();

    c.transport.close("agent-3");
    c.registry.del("agent-3").unwrap();

    eventually("re-registered", || c.registry.contains("agent-3")).await.unwrap();
    eventually("online again", || {
        c.registry.get("agent-3").and_then(|m| m.online()) == Some(true)
    })
    .await
    .unwrap();
}

/// Malformed frames are dropped and the collector keeps serving.
#[tokio::test]
async fn test_malformed_commands_are_dropped() {
    let c = Collector::start("malformed").await.unwrap();
    let mut client = Client::connect("client", &c).await.unwrap();

    client.send(CMD_METRIC, &[0xff, 0xff, 0x01]).unwrap();
    client.send(CMD_PARAMETER, b"\x01\x00x\x99").unwrap();
    client.send(0x07, b"unknown").unwrap();

    let records = decode_peers(client.request(CMD_LIST).await.unwrap()).unwrap();
    assert_eq!(records.len(), 1, "only the collector itself");
    assert!(!c.registry.contains("client"));
}

/// `parameter` from a peer that never announced a metric is dropped.
#[tokio::test]
async fn test_parameter_without_metric_is_dropped() {
    let c = Collector::start("orphan-param").await.unwrap();
    let mut client = Client::connect("orphan", &c).await.unwrap();

    let p = Parameter::new("users", 1i64).encode().unwrap();
    client.send(CMD_PARAMETER, &p).unwrap();

    let records = decode_peers(client.request(CMD_LIST).await.unwrap()).unwrap();
    assert!(records.iter().all(|m| m.address != "orphan"));
}

/// `save` writes the registry file and clears the new flags.
#[tokio::test]
async fn test_save_command_persists_registry() {
    let c = Collector::start("save-cmd").await.unwrap();

    let mut agent = Client::connect("agent-4", &c).await.unwrap();
    agent
        .send(CMD_METRIC, &agent_metric("app-04", "1.0").encode().unwrap())
        .unwrap();
    eventually("registered", || c.registry.contains("agent-4")).await.unwrap();
    assert!(c.registry.get("agent-4").unwrap().is_new);

    agent.send(CMD_SAVE, &[]).unwrap();
    eventually("file written", || c.peers_file.exists()).await.unwrap();
    eventually("flags cleared", || !c.registry.get("agent-4").unwrap().is_new)
        .await
        .unwrap();

    let records = decode_peers(agent.request(CMD_LIST).await.unwrap()).unwrap();
    assert!(records.iter().all(|m| !m.is_new));
}

/// A `list` reply larger than a mebibyte still reaches the requester, and
/// the connection stays usable afterwards.
#[tokio::test]
async fn test_large_list_reply_is_delivered() {
    let c = Collector::start("large-list").await.unwrap();
    for i in 0..20 {
        let address = format!("bulk-{i:02}");
        c.registry.add(MetricRecord::new(address.as_str(), "bulk"));
        c.registry
            .set_param(&address, Parameter::new("blob", vec![0u8; 60_000]))
            .unwrap();
    }

    let mut client = Client::connect("client", &c).await.unwrap();
    let reply = client.request(CMD_LIST).await.unwrap();
    assert!(reply.len() > 1024 * 1024, "reply is {} bytes", reply.len());
    assert_eq!(decode_peers(reply).unwrap().len(), 21);

    for i in 0..20 {
        c.registry.del(&format!("bulk-{i:02}")).unwrap();
    }
    let records = decode_peers(client.request(CMD_LIST).await.unwrap()).unwrap();
    assert_eq!(records.len(), 1);
    assert!(c.transport.is_connected("client"));
}
