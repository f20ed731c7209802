//! Observer tools
//!
//! Drive a running cluster through its node API to measure convergence speed
//! and peer-selection distribution. The measurement logic only talks to a
//! [`ClusterProbe`], so it runs the same against HTTP or in-process nodes.

pub mod convergence;
pub mod randomness;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::client::{AdminClient, ClientError, GossipClient};

pub use convergence::{
    observe_convergence, ConvergenceConfig, ConvergenceEvent, ConvergenceRating,
    ConvergenceReport, RoundRecord,
};
pub use randomness::{observe_randomness, DistributionReport, RandomnessConfig, RandomnessRating};

pub const COLOR_RESET: &str = "\x1b[0m";
pub const COLOR_RED: &str = "\x1b[31m";
pub const COLOR_GREEN: &str = "\x1b[32m";
pub const COLOR_YELLOW: &str = "\x1b[33m";

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("failed to get cluster info and no manual override: {0}")]
    Discovery(#[source] ClientError),

    #[error("node {0} is not part of the cluster")]
    UnknownNode(usize),

    #[error("at least {required} nodes are required, cluster has {actual}")]
    TooFewNodes { required: usize, actual: usize },

    #[error("node {node}: {message}")]
    Node { node: usize, message: String },

    #[error("{node_count} nodes starting at port {base_port} do not fit in the port range")]
    InvalidLayout { base_port: u16, node_count: usize },
}

/// Operations an observer needs from the cluster, addressed by node index.
#[async_trait]
pub trait ClusterProbe: Send + Sync {
    async fn set_value(&self, node: usize, value: &str) -> Result<(), ObserverError>;

    async fn value_of(&self, node: usize) -> Result<String, ObserverError>;

    /// Run one push round on `node`. Returns the index of the target, or
    /// `None` when the reported target is not a cluster node.
    async fn trigger(&self, node: usize) -> Result<Option<usize>, ObserverError>;
}

/// Base port and size of a running cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterLayout {
    pub base_port: u16,
    pub node_count: usize,
}

impl ClusterLayout {
    /// Reject empty layouts and layouts whose last node port exceeds 65535.
    pub fn validate(&self) -> Result<(), ObserverError> {
        let fits = self.node_count > 0
            && usize::from(self.base_port)
                .checked_add(self.node_count - 1)
                .is_some_and(|last| last <= usize::from(u16::MAX));
        if fits {
            Ok(())
        } else {
            Err(ObserverError::InvalidLayout {
                base_port: self.base_port,
                node_count: self.node_count,
            })
        }
    }

    pub fn port_of(&self, node: usize) -> Result<u16, ObserverError> {
        if node >= self.node_count {
            return Err(ObserverError::UnknownNode(node));
        }
        u16::try_from(node)
            .ok()
            .and_then(|offset| self.base_port.checked_add(offset))
            .ok_or(ObserverError::InvalidLayout {
                base_port: self.base_port,
                node_count: self.node_count,
            })
    }

    /// Map a `host:port` address back to a node index.
    pub fn node_of(&self, address: &str) -> Option<usize> {
        let port: u16 = address.rsplit_once(':')?.1.parse().ok()?;
        let index = usize::from(port.checked_sub(self.base_port)?);
        (index < self.node_count).then_some(index)
    }
}

/// Resolve the cluster layout. Explicit values win; anything missing comes
/// from the admin API.
pub async fn discover_layout(
    admin: &AdminClient,
    base_port: Option<u16>,
    node_count: Option<usize>,
) -> Result<ClusterLayout, ObserverError> {
    let layout = if let (Some(base_port), Some(node_count)) = (base_port, node_count) {
        ClusterLayout {
            base_port,
            node_count,
        }
    } else {
        match admin.get_cluster_info().await {
            Ok(info) => ClusterLayout {
                base_port: base_port.unwrap_or(info.base_port),
                node_count: node_count.unwrap_or(info.node_count),
            },
            Err(e) => {
                warn!("Failed to get cluster info: {}", e);
                return Err(ObserverError::Discovery(e));
            }
        }
    };
    layout.validate()?;
    Ok(layout)
}

/// [`ClusterProbe`] over the node HTTP API.
pub struct HttpProbe {
    client: GossipClient,
    layout: ClusterLayout,
}

impl HttpProbe {
    pub fn new(client: GossipClient, layout: ClusterLayout) -> Self {
        Self { client, layout }
    }

}

#[async_trait]
impl ClusterProbe for HttpProbe {
    async fn set_value(&self, node: usize, value: &str) -> Result<(), ObserverError> {
        let port = self.layout.port_of(node)?;
        self.client.set_value(port, value).await?;
        Ok(())
    }

    async fn value_of(&self, node: usize) -> Result<String, ObserverError> {
        let port = self.layout.port_of(node)?;
        Ok(self.client.get_status(port).await?.value)
    }

    async fn trigger(&self, node: usize) -> Result<Option<usize>, ObserverError> {
        let port = self.layout.port_of(node)?;
        let resp = self.client.trigger_gossip(port).await?;
        if resp.status != "sent" || resp.target.is_empty() {
            return Err(ObserverError::Node {
                node,
                message: format!("unexpected trigger status '{}'", resp.status),
            });
        }
        Ok(self.layout.node_of(&resp.target))
    }
}
