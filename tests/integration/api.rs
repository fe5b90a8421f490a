use crate::*;

use teomon_api::ApiState;
use teomon_core::param::PARAM_HOST;
use teomon_core::Parameter;

/// Serve the API for `c` on an ephemeral port. Returns the base URL.
async fn serve_api(c: &Collector) -> String {
    let state = ApiState {
        registry: c.registry.clone(),
        transport: Arc::new(c.transport.clone()),
        peers_file: c.peers_file.clone(),
        shutdown_tx: c.shutdown_tx.clone(),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/api", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let _ = axum::serve(listener, teomon_api::router(state)).await;
    });
    base
}

fn seed(c: &Collector) {
    for (addr, short, online) in [
        ("p1", "app-01", None),
        ("p2", "app-02", Some(false)),
        ("p3", "app-03", Some(true)),
        ("p4", "app-04", Some(false)),
        ("p5", "_app-05", Some(false)),
    ] {
        c.registry.add(MetricRecord::new(addr, short));
        match online {
            Some(v) => c.registry.set_param(addr, Parameter::new("online", v)).unwrap(),
            None => {
                c.registry.get(addr).unwrap().params.remove("online");
            }
        }
    }
}

#[tokio::test]
async fn test_api_status_shape() {
    let c = Collector::start("api-status").await.unwrap();
    let base = serve_api(&c).await;

    let status: serde_json::Value = reqwest::get(format!("{base}/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["address"], COLLECTOR);
    assert!(status["known_peers"].is_number(), "missing known_peers");
    assert!(status["online_peers"].is_number(), "missing online_peers");
    assert!(status["connected_peers"].is_number(), "missing connected_peers");
}

#[tokio::test]
async fn test_api_peers_json_in_display_order() {
    // No health monitor interference: the records are not connected, so
    // stop it before seeding.
    let c = Collector::start("api-peers").await.unwrap();
    c.shutdown_tx.send(()).unwrap();
    tokio::time::sleep(HEALTH_INTERVAL * 2).await;
    c.registry.del(COLLECTOR).unwrap();
    seed(&c);
    c.registry
        .set_param("p3", Parameter::new(PARAM_HOST, "node-3"))
        .unwrap();

    let base = serve_api(&c).await;
    let peers: serde_json::Value = reqwest::get(format!("{base}/peers"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let order: Vec<&str> = peers
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["appShort"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["_app-05", "app-02", "app-04", "app-01", "app-03"]);

    let p3 = &peers[4];
    assert_eq!(p3["address"], "p3");
    assert_eq!(p3["online"], true);
    assert_eq!(p3["host"], "node-3");
    assert_eq!(peers[3]["online"], false, "absent online renders false");
}

#[tokio::test]
async fn test_api_table_is_text() {
    let c = Collector::start("api-table").await.unwrap();
    let base = serve_api(&c).await;

    let resp = reqwest::get(format!("{base}/peers/table")).await.unwrap();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"), "got {content_type}");

    let body = resp.text().await.unwrap();
    assert!(body.contains("protocol-ver"));
    assert!(body.contains(COLLECTOR));
}

#[tokio::test]
async fn test_api_get_and_delete_peer() {
    let c = Collector::start("api-del").await.unwrap();
    c.registry.add(MetricRecord::new("gone", "app"));
    let base = serve_api(&c).await;
    let http = reqwest::Client::new();

    let peer: serde_json::Value = http
        .get(format!("{base}/peers/gone"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(peer["appShort"], "app");

    let resp = http.delete(format!("{base}/peers/gone")).send().await.unwrap();
    assert!(resp.status().is_success());
    assert!(!c.registry.contains("gone"));

    let resp = http.get(format!("{base}/peers/gone")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let resp = http.delete(format!("{base}/peers/gone")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn test_api_save() {
    let c = Collector::start("api-save").await.unwrap();
    let base = serve_api(&c).await;

    let resp: serde_json::Value = reqwest::Client::new()
        .post(format!("{base}/save"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["saved"], 1);
    assert!(c.peers_file.exists());
}
