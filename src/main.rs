use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use epidemic::{
    admin::{admin_router, AdminState},
    cluster::{bind, serve_until_shutdown, start_cluster},
    config::{
        ClusterConfig, DEFAULT_ADMIN_PORT, DEFAULT_BASE_PORT, DEFAULT_HOST, DEFAULT_NODE_COUNT,
    },
    logging::{init_logging, parse_level, LoggingConfig},
};
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "epidemic")]
#[command(about = "Run a local push-gossip cluster with an admin API", long_about = None)]
struct Cli {
    /// Number of nodes to start
    #[arg(long, env = "EPIDEMIC_NODES", default_value_t = DEFAULT_NODE_COUNT)]
    nodes: usize,

    /// Port of node-0; node-i listens on base-port + i
    #[arg(long, env = "EPIDEMIC_BASE_PORT", default_value_t = DEFAULT_BASE_PORT)]
    base_port: u16,

    /// Admin API port
    #[arg(long, env = "EPIDEMIC_ADMIN_PORT", default_value_t = DEFAULT_ADMIN_PORT)]
    admin_port: u16,

    /// Host every listener binds to
    #[arg(long, env = "EPIDEMIC_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Timeout for one outbound gossip delivery, in milliseconds
    #[arg(long, env = "EPIDEMIC_PUSH_TIMEOUT_MS", default_value_t = 3000)]
    push_timeout_ms: u64,

    /// Background push period in milliseconds; rounds only run on trigger if unset
    #[arg(long, env = "EPIDEMIC_GOSSIP_INTERVAL_MS")]
    gossip_interval_ms: Option<u64>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, env = "EPIDEMIC_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "EPIDEMIC_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            node_count: self.nodes,
            base_port: self.base_port,
            admin_port: self.admin_port,
            host: self.host.clone(),
            push_timeout: Duration::from_millis(self.push_timeout_ms),
            gossip_interval: self.gossip_interval_ms.map(Duration::from_millis),
        }
    }
}

fn log_usage(config: &ClusterConfig) {
    info!("Node interaction:");
    info!("  Status:  curl {}/status", config.node_address(0));
    info!("  Gossip:  curl -X POST {}/trigger", config.node_address(0));
    info!(
        "  Set:     curl -X POST '{}/set?value=hello'",
        config.node_address(0)
    );
    info!("Admin service:");
    info!("  Cluster info: curl {}/cluster", config.admin_address());
    info!("  Node list:    curl {}/nodes", config.admin_address());
    info!("  Health check: curl {}/health", config.admin_address());
    info!("  Counters:     curl {}/stats", config.admin_address());
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = parse_level(&cli.log_level)
        .with_context(|| format!("invalid log level '{}'", cli.log_level))?;
    init_logging(&LoggingConfig {
        level,
        json: cli.log_json,
    });

    let config = cli.cluster_config();
    config.validate().context("invalid cluster configuration")?;

    let handle = start_cluster(&config)
        .await
        .context("failed to start cluster")?;
    log_usage(&config);

    let state = AdminState::new(handle.registry.clone(), config.clone(), handle.started_at)
        .context("failed to build admin HTTP client")?;
    let app = admin_router(Arc::new(state));

    let listener = match bind(&config.admin_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            handle.shutdown().await;
            return Err(e).context("failed to start admin server");
        }
    };

    info!(
        "Admin server starting on {} (foreground)",
        config.admin_address()
    );
    info!("Press Ctrl+C to stop all services");

    let (admin_tx, admin_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Shutdown signal received");
        let _ = admin_tx.send(true);
    });

    let served = serve_until_shutdown(listener, app, admin_rx).await;
    handle.shutdown().await;
    served.context("admin server failed")?;

    Ok(())
}
