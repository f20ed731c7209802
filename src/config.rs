//! Cluster configuration.
//!
//! Node `i` is named `node-i` and listens on `host:(base_port + i)`. The peer
//! set of every node is derived from this layout once, at startup.

use std::time::Duration;

use epidemic_mesh::DEFAULT_PUSH_TIMEOUT;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_NODE_COUNT: usize = 10;
pub const DEFAULT_BASE_PORT: u16 = 18000;
pub const DEFAULT_ADMIN_PORT: u16 = 17999;
pub const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("node count must be at least 1")]
    NoNodes,

    #[error("node ports {base}..{base}+{count} exceed 65535")]
    PortRangeOverflow { base: u16, count: usize },

    #[error("admin port {0} collides with a node port")]
    AdminPortCollision(u16),

    #[error("push timeout must be non-zero")]
    ZeroPushTimeout,

    #[error("gossip interval must be non-zero when set")]
    ZeroGossipInterval,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub node_count: usize,
    pub base_port: u16,
    pub admin_port: u16,
    pub host: String,
    /// Bound on a single outbound gossip delivery
    pub push_timeout: Duration,
    /// Background push period; `None` means rounds only run on trigger
    #[serde(default)]
    pub gossip_interval: Option<Duration>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_count: DEFAULT_NODE_COUNT,
            base_port: DEFAULT_BASE_PORT,
            admin_port: DEFAULT_ADMIN_PORT,
            host: DEFAULT_HOST.to_string(),
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            gossip_interval: None,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_count == 0 {
            return Err(ConfigError::NoNodes);
        }
        let last = usize::from(self.base_port)
            .checked_add(self.node_count - 1)
            .filter(|&last| last <= usize::from(u16::MAX))
            .ok_or(ConfigError::PortRangeOverflow {
                base: self.base_port,
                count: self.node_count,
            })?;
        let admin = usize::from(self.admin_port);
        if admin >= usize::from(self.base_port) && admin <= last {
            return Err(ConfigError::AdminPortCollision(self.admin_port));
        }
        if self.push_timeout.is_zero() {
            return Err(ConfigError::ZeroPushTimeout);
        }
        if self.gossip_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::ZeroGossipInterval);
        }
        Ok(())
    }

    pub fn node_id(index: usize) -> String {
        format!("node-{}", index)
    }

    /// Port of node `index`. Only meaningful after `validate` succeeded.
    pub fn node_port(&self, index: usize) -> u16 {
        self.base_port + index as u16
    }

    pub fn node_address(&self, index: usize) -> String {
        format!("{}:{}", self.host, self.node_port(index))
    }

    pub fn admin_address(&self) -> String {
        format!("{}:{}", self.host, self.admin_port)
    }
}
