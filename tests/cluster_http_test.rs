//! End-to-end tests against real node listeners on localhost.

mod common;

use std::{sync::Arc, time::Duration};

use common::{start_admin, start_test_cluster, test_config};
use epidemic::{
    client::{AdminClient, GossipClient},
    cluster::{build_cluster, start_nodes},
    error::HEADER_X_EPIDEMIC_ERROR_CODE,
    mesh::{HttpTransport, INITIAL_VALUE},
    observer::{
        discover_layout, observe_convergence, observe_randomness, ClusterLayout, ClusterProbe,
        ConvergenceConfig, HttpProbe, RandomnessConfig,
    },
    registry::NodeRegistry,
};
use rand::{rngs::StdRng, SeedableRng};
use reqwest::StatusCode;

fn http() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn test_single_round_moves_value_to_one_peer() {
    let config = test_config(3);
    let handle = start_test_cluster(&config).await;
    let client = GossipClient::new(&config.host).unwrap();

    client.set_value(config.base_port, "X").await.unwrap();
    let trigger = client.trigger_gossip(config.base_port).await.unwrap();
    assert_eq!(trigger.status, "sent");
    assert_ne!(trigger.target, config.node_address(0));

    let mut holders = 0;
    for i in 0..3 {
        let status = client.get_status(config.node_port(i)).await.unwrap();
        assert_eq!(status.id, format!("node-{}", i));
        if status.value == "X" {
            holders += 1;
            assert!(status.last_seen > 0);
        } else {
            assert_eq!(status.value, INITIAL_VALUE);
        }
    }
    assert_eq!(holders, 2);

    let target = handle
        .registry
        .iter()
        .find(|h| h.address() == trigger.target)
        .unwrap();
    assert_eq!(target.engine.get_value(), "X");
    assert_eq!(target.engine.metrics().snapshot().messages_received, 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_five_nodes_converge_over_http() {
    let config = test_config(5);
    let handle = start_test_cluster(&config).await;
    let probe = HttpProbe::new(
        GossipClient::new(&config.host).unwrap(),
        ClusterLayout {
            base_port: config.base_port,
            node_count: 5,
        },
    );
    let observe = ConvergenceConfig {
        settle_delay: Duration::ZERO,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(11);

    let report = observe_convergence(&probe, 5, "converged-1", &observe, &mut rng, |_| {})
        .await
        .unwrap();

    assert!(report.converged, "not converged after {} rounds", report.rounds);
    for node in 0..5 {
        assert_eq!(probe.value_of(node).await.unwrap(), "converged-1");
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_trigger_reports_unreachable_peer() {
    // node-2 is part of every peer set but never started.
    let config = test_config(3);
    let transport = Arc::new(HttpTransport::new(config.push_timeout).unwrap());
    let full = build_cluster(&config, transport);
    let mut partial = NodeRegistry::new();
    partial.register(full.get("node-0").unwrap().clone());
    partial.register(full.get("node-1").unwrap().clone());
    common::init_test_logging();
    let handle = start_nodes(&config, partial).await.unwrap();

    let client = http();
    let url = format!("http://{}/trigger", config.node_address(0));
    let mut refused = 0;
    for _ in 0..40 {
        let resp = client.post(&url).send().await.unwrap();
        match resp.status() {
            StatusCode::OK => {}
            StatusCode::BAD_GATEWAY => {
                assert_eq!(
                    resp.headers()[HEADER_X_EPIDEMIC_ERROR_CODE],
                    "delivery_failed"
                );
                refused += 1;
            }
            other => panic!("unexpected status {}", other),
        }
    }
    assert!(refused > 0);

    // The sender itself keeps running and keeps its value.
    let status = GossipClient::new(&config.host)
        .unwrap()
        .get_status(config.base_port)
        .await
        .unwrap();
    assert_eq!(status.value, INITIAL_VALUE);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_malformed_gossip_rejected() {
    let config = test_config(2);
    let handle = start_test_cluster(&config).await;

    let resp = http()
        .post(format!("http://{}/gossip", config.node_address(1)))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.headers()[HEADER_X_EPIDEMIC_ERROR_CODE],
        "malformed_message"
    );
    assert_eq!(
        handle.registry.get("node-1").unwrap().engine.get_value(),
        INITIAL_VALUE
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn test_wrong_method_rejected() {
    let config = test_config(1);
    let handle = start_test_cluster(&config).await;

    let resp = http()
        .get(format!("http://{}/trigger", config.node_address(0)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = http()
        .post(format!("http://{}/set", config.node_address(0)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_single_node_trigger_has_no_peer() {
    let config = test_config(1);
    let handle = start_test_cluster(&config).await;

    let resp = http()
        .post(format!("http://{}/trigger", config.node_address(0)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        resp.headers()[HEADER_X_EPIDEMIC_ERROR_CODE],
        "no_peer_available"
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn test_admin_api_with_running_nodes() {
    let config = test_config(4);
    let handle = start_test_cluster(&config).await;
    let admin_task = start_admin(&config, &handle).await;

    let admin = AdminClient::new(&config.host, config.admin_port).unwrap();
    let layout = discover_layout(&admin, None, None).await.unwrap();
    assert_eq!(
        layout,
        ClusterLayout {
            base_port: config.base_port,
            node_count: 4
        }
    );

    let nodes = admin.get_nodes().await.unwrap();
    assert_eq!(nodes.len(), 4);
    assert!(nodes.iter().all(|n| n.peer_count == 3));

    let health: serde_json::Value = http()
        .get(format!("http://{}/health", config.admin_address()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["all_healthy"], true);

    let gossip = GossipClient::new(&config.host).unwrap();
    assert_eq!(gossip.count_healthy_nodes(config.base_port, 4).await, 4);

    handle.shutdown().await;
    admin_task.await.unwrap();
}

#[tokio::test]
async fn test_distribution_from_node_zero() {
    let config = test_config(4);
    let handle = start_test_cluster(&config).await;
    let probe = HttpProbe::new(
        GossipClient::new(&config.host).unwrap(),
        ClusterLayout {
            base_port: config.base_port,
            node_count: 4,
        },
    );
    let observe = RandomnessConfig {
        rounds: 300,
        round_delay: Duration::ZERO,
        source: 0,
    };

    let report = observe_randomness(&probe, 4, &observe, |_, _| {})
        .await
        .unwrap();

    assert_eq!(report.failures, 0);
    assert_eq!(report.total_received(), 300);
    assert_eq!(report.counts.len(), 3);
    // 100 expected per peer; each lands well inside 60..=140 with
    // overwhelming probability.
    for &(node, count) in &report.counts {
        assert!((60..=140).contains(&count), "node-{} got {}", node, count);
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_background_gossip_sends_pushes() {
    let mut config = test_config(3);
    config.gossip_interval = Some(Duration::from_millis(20));
    let handle = start_test_cluster(&config).await;

    tokio::time::sleep(Duration::from_millis(300)).await;

    for node in handle.registry.iter() {
        let snapshot = node.engine.metrics().snapshot();
        assert!(snapshot.pushes_sent > 0, "{} never pushed", node.id());
        assert_eq!(snapshot.push_failures, 0);
    }

    handle.shutdown().await;
}
