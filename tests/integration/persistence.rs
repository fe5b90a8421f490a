use crate::*;

use teomon_core::param::Value;
use teomon_core::wire::{CMD_METRIC, CMD_PARAMETER, CMD_SAVE};
use teomon_core::Parameter;

/// Peers known before a restart are restored, offline until they reconnect.
#[tokio::test]
async fn test_registry_survives_restart() {
    let dir = temp_dir("restart");
    let peers_file = dir.join("peers.bin");

    {
        let c = Collector::start_with(PeerRegistry::new(), peers_file.clone())
            .await
            .unwrap();
        let agent = Client::connect("agent-a", &c).await.unwrap();
        agent
            .send(CMD_METRIC, &agent_metric("app-a", "1.0").encode().unwrap())
            .unwrap();
        agent
            .send(CMD_PARAMETER, &Parameter::new("disk", "ok").encode().unwrap())
            .unwrap();
        eventually("parameter stored", || {
            c.registry.get("agent-a").and_then(|m| m.params.get("disk"))
                == Some(Value::String("ok".into()))
        })
        .await
        .unwrap();

        agent.send(CMD_SAVE, &[]).unwrap();
        eventually("saved", || peers_file.exists()).await.unwrap();
    }

    let registry = PeerRegistry::new();
    assert_eq!(registry.load(&peers_file).unwrap(), 2);
    let c = Collector::start_with(registry, peers_file.clone()).await.unwrap();

    let m = c.registry.get("agent-a").expect("restored");
    assert!(!m.is_new);
    assert_eq!(m.app_version, "1.0");
    assert_eq!(m.params.get("disk"), Some(Value::String("ok".into())));

    eventually("restored peer offline", || {
        c.registry.get("agent-a").and_then(|m| m.online()) == Some(false)
    })
    .await
    .unwrap();

    let _ = std::fs::remove_dir_all(&dir);
}

/// A corrupt registry file is rejected and leaves the registry empty.
#[test]
fn test_corrupt_file_is_rejected() {
    let dir = temp_dir("corrupt");
    let path = dir.join("peers.bin");
    std::fs::write(&path, [3u8, 0, 10, 0, 1, 2]).unwrap();

    let registry = PeerRegistry::new();
    assert!(registry.load(&path).is_err());
    assert!(registry.is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

/// The file format is the `list` reply format.
#[tokio::test]
async fn test_file_matches_list_reply() {
    let c = Collector::start("format").await.unwrap();
    let mut client = Client::connect("client", &c).await.unwrap();

    c.registry.save(&c.peers_file).unwrap();
    let on_disk = std::fs::read(&c.peers_file).unwrap();
    let listed = client.request(teomon_core::wire::CMD_LIST).await.unwrap();

    let from_file = teomon_core::decode_peers(Bytes::from(on_disk)).unwrap();
    let from_list = teomon_core::decode_peers(listed).unwrap();
    let a: Vec<_> = from_file.iter().map(|m| m.address.clone()).collect();
    let b: Vec<_> = from_list.iter().map(|m| m.address.clone()).collect();
    assert_eq!(a, b);
}
