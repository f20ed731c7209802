//! Cluster driver
//!
//! Builds every node with a full-mesh peer set, binds one HTTP listener per
//! node and optionally starts background gossip. Any bind failure aborts
//! startup; gossip failures after that never do.

use std::{io, sync::Arc};

use axum::Router;
use chrono::Utc;
use epidemic_mesh::{GossipEngine, GossipTransport, NodeState, INITIAL_VALUE};
use thiserror::Error;
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};
use tracing::{error, info};

use crate::{
    config::{ClusterConfig, ConfigError},
    mesh::{node_router, HttpTransport},
    registry::{NodeHandle, NodeRegistry},
};

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Every node address except the node's own.
pub fn full_mesh_peers(config: &ClusterConfig, index: usize) -> Vec<String> {
    (0..config.node_count)
        .filter(|&i| i != index)
        .map(|i| config.node_address(i))
        .collect()
}

/// Create all nodes at the sentinel value, sharing one transport.
pub fn build_cluster(config: &ClusterConfig, transport: Arc<dyn GossipTransport>) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    for index in 0..config.node_count {
        let state = NodeState::new(
            ClusterConfig::node_id(index),
            config.node_address(index),
            full_mesh_peers(config, index),
            INITIAL_VALUE,
        );
        let engine =
            GossipEngine::new(state, transport.clone()).with_push_timeout(config.push_timeout);
        registry.register(NodeHandle {
            port: config.node_port(index),
            engine: Arc::new(engine),
        });
    }
    registry
}

pub async fn bind(address: &str) -> Result<TcpListener, ClusterError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| ClusterError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Serve `app` on `listener` until `shutdown_rx` changes.
pub async fn serve_until_shutdown(
    listener: TcpListener,
    app: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await
}

pub struct ClusterHandle {
    pub registry: NodeRegistry,
    pub started_at: i64,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ClusterHandle {
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Stop all node servers and background loops and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Cluster task ended abnormally: {}", e);
            }
        }
        info!("All nodes stopped");
    }
}

/// Start every node over the HTTP transport.
pub async fn start_cluster(config: &ClusterConfig) -> Result<ClusterHandle, ClusterError> {
    config.validate()?;
    let transport = Arc::new(HttpTransport::new(config.push_timeout)?);
    let registry = build_cluster(config, transport);
    start_nodes(config, registry).await
}

/// Bind and serve an already-built registry.
pub async fn start_nodes(
    config: &ClusterConfig,
    registry: NodeRegistry,
) -> Result<ClusterHandle, ClusterError> {
    info!("Starting {} nodes...", registry.len());

    let mut listeners = Vec::with_capacity(registry.len());
    for handle in registry.iter() {
        listeners.push(bind(handle.address()).await?);
    }

    let (shutdown_tx, _) = watch::channel(false);
    let mut tasks = Vec::new();

    for (handle, listener) in registry.iter().zip(listeners) {
        info!("Starting node {} on {}", handle.id(), handle.address());
        let app = node_router(handle.engine.clone());
        let shutdown_rx = shutdown_tx.subscribe();
        let id = handle.id().to_string();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = serve_until_shutdown(listener, app, shutdown_rx).await {
                error!("[{}] HTTP server failed: {}", id, e);
            }
        }));

        if let Some(period) = config.gossip_interval {
            let engine = handle.engine.clone();
            tasks.push(tokio::spawn(
                engine.run_gossip_loop(period, shutdown_tx.subscribe()),
            ));
        }
    }

    info!("All {} nodes started successfully", registry.len());
    Ok(ClusterHandle {
        registry,
        started_at: Utc::now().timestamp(),
        shutdown_tx,
        tasks,
    })
}
