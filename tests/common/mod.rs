//! Common test utilities for cluster integration tests

use std::{net::TcpListener, sync::Arc, sync::Once, time::Duration};

use epidemic::{
    admin::{admin_router, AdminState},
    cluster::{bind, serve_until_shutdown, start_cluster, ClusterHandle},
    config::ClusterConfig,
};
use rand::Rng;
use tokio::task::JoinHandle;

static INIT: Once = Once::new();

#[allow(dead_code)]
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Find `count + 1` consecutive free ports; the first one is for the admin
/// API and the rest for the nodes. The ports are only probed, so another
/// process can still grab one before the cluster binds.
pub fn free_port_block(count: usize) -> (u16, u16) {
    let mut rng = rand::rng();
    for _ in 0..200 {
        let admin: u16 = rng.random_range(30000..60000);
        let ok = (0..=count as u16).all(|i| TcpListener::bind(("127.0.0.1", admin + i)).is_ok());
        if ok {
            return (admin, admin + 1);
        }
    }
    panic!("no free block of {} ports found", count + 1);
}

pub fn test_config(node_count: usize) -> ClusterConfig {
    let (admin_port, base_port) = free_port_block(node_count);
    ClusterConfig {
        node_count,
        base_port,
        admin_port,
        push_timeout: Duration::from_secs(1),
        ..Default::default()
    }
}

pub async fn start_test_cluster(config: &ClusterConfig) -> ClusterHandle {
    init_test_logging();
    start_cluster(config).await.expect("cluster should start")
}

/// Serve the admin API for `handle` until the cluster shuts down.
#[allow(dead_code)]
pub async fn start_admin(config: &ClusterConfig, handle: &ClusterHandle) -> JoinHandle<()> {
    let state = AdminState::new(handle.registry.clone(), config.clone(), handle.started_at)
        .expect("admin state");
    let listener = bind(&config.admin_address()).await.expect("admin bind");
    let shutdown = handle.shutdown_signal();
    tokio::spawn(async move {
        let _ = serve_until_shutdown(listener, admin_router(Arc::new(state)), shutdown).await;
    })
}
