//! Admin API
//!
//! Read-only views over the whole cluster, served in the driver's foreground:
//! - `GET /`        service description
//! - `GET /cluster` static cluster configuration
//! - `GET /nodes`   per-node snapshot
//! - `GET /health`  HTTP probe of each node's `/status`
//! - `GET /stats`   per-node gossip counters

use std::{sync::Arc, time::Duration};

use axum::{extract::State, routing::get, Json, Router};
use epidemic_mesh::MetricsSnapshot;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::{config::ClusterConfig, registry::NodeRegistry};

pub const SERVICE_NAME: &str = "gossip-cluster-admin";
pub const TOPOLOGY_FULL_MESH: &str = "full-mesh";

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub node_count: usize,
    pub base_port: u16,
    pub admin_port: u16,
    pub topology: String,
    pub started_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: String,
    pub port: u16,
    pub address: String,
    pub value: String,
    pub peer_count: usize,
    pub last_seen: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub id: String,
    pub port: u16,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub all_healthy: bool,
    pub nodes: Vec<HealthStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub id: String,
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

pub struct AdminState {
    pub registry: NodeRegistry,
    pub config: ClusterConfig,
    pub started_at: i64,
    client: Client,
}

impl AdminState {
    pub fn new(
        registry: NodeRegistry,
        config: ClusterConfig,
        started_at: i64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(HEALTH_PROBE_TIMEOUT)
            .no_proxy()
            .build()?;
        Ok(Self {
            registry,
            config,
            started_at,
            client,
        })
    }
}

pub fn admin_router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/cluster", get(cluster_info))
        .route("/nodes", get(list_nodes))
        .route("/health", get(health_check))
        .route("/stats", get(node_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec![
            "/cluster - Cluster configuration".to_string(),
            "/nodes - All node information".to_string(),
            "/health - Health check for all nodes".to_string(),
            "/stats - Gossip counters for all nodes".to_string(),
        ],
    })
}

async fn cluster_info(State(state): State<Arc<AdminState>>) -> Json<ClusterInfo> {
    Json(ClusterInfo {
        node_count: state.registry.len(),
        base_port: state.config.base_port,
        admin_port: state.config.admin_port,
        topology: TOPOLOGY_FULL_MESH.to_string(),
        started_at: state.started_at,
    })
}

async fn list_nodes(State(state): State<Arc<AdminState>>) -> Json<Vec<NodeInfo>> {
    let nodes = state
        .registry
        .iter()
        .map(|handle| {
            let status = handle.engine.status();
            NodeInfo {
                id: status.id,
                port: handle.port,
                address: handle.address().to_string(),
                value: status.value,
                peer_count: status.peers.len(),
                last_seen: status.last_seen,
            }
        })
        .collect();
    Json(nodes)
}

async fn health_check(State(state): State<Arc<AdminState>>) -> Json<HealthReport> {
    let mut nodes = Vec::with_capacity(state.registry.len());

    for handle in state.registry.iter() {
        let url = format!("http://{}/status", handle.address());
        let (healthy, error) = match state.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => (true, None),
            Ok(resp) => (false, Some(format!("HTTP {}", resp.status().as_u16()))),
            Err(e) => (false, Some(e.to_string())),
        };
        if let Some(ref e) = error {
            debug!("Health probe for {} failed: {}", handle.id(), e);
        }
        nodes.push(HealthStatus {
            id: handle.id().to_string(),
            port: handle.port,
            healthy,
            error,
        });
    }

    Json(HealthReport {
        all_healthy: nodes.iter().all(|n| n.healthy),
        nodes,
    })
}

async fn node_stats(State(state): State<Arc<AdminState>>) -> Json<Vec<NodeStats>> {
    Json(
        state
            .registry
            .iter()
            .map(|handle| NodeStats {
                id: handle.id().to_string(),
                counters: handle.engine.metrics().snapshot(),
            })
            .collect(),
    )
}
