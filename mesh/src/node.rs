//! Per-node gossip state
//!
//! Identity, address and peers are fixed at construction. Only the value and
//! its last mutation time change, and both sit behind one reader/writer lock.

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Sentinel value every node starts with.
pub const INITIAL_VALUE: &str = "initial-state";

#[derive(Debug)]
struct Versioned {
    value: String,
    last_seen: i64,
}

/// Point-in-time view of a node, served to status and admin queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub id: String,
    pub value: String,
    pub peers: Vec<String>,
    pub last_seen: i64,
}

#[derive(Debug)]
pub struct NodeState {
    id: String,
    address: String,
    peers: Vec<String>,
    inner: RwLock<Versioned>,
}

impl NodeState {
    /// Create a node holding `initial_value` with `last_seen = 0`.
    ///
    /// The node's own address is dropped from `peers` if present.
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        peers: Vec<String>,
        initial_value: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let address = address.into();
        let before = peers.len();
        let peers: Vec<String> = peers.into_iter().filter(|p| *p != address).collect();
        if peers.len() != before {
            debug!("[{}] Dropped own address {} from peer list", id, address);
        }

        Self {
            id,
            address,
            peers,
            inner: RwLock::new(Versioned {
                value: initial_value.into(),
                last_seen: 0,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn get_value(&self) -> String {
        self.inner.read().value.clone()
    }

    pub fn last_seen(&self) -> i64 {
        self.inner.read().last_seen
    }

    /// Replace the value and advance `last_seen` if `value` differs from the
    /// current one. Returns whether the value changed.
    pub fn set_value(&self, value: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.value == value {
            return false;
        }
        info!("[{}] Value updated: '{}' -> '{}'", self.id, inner.value, value);
        inner.value = value.to_string();
        inner.last_seen = Utc::now().timestamp();
        true
    }

    pub fn snapshot_status(&self) -> NodeStatus {
        let inner = self.inner.read();
        NodeStatus {
            id: self.id.clone(),
            value: inner.value.clone(),
            peers: self.peers.clone(),
            last_seen: inner.last_seen,
        }
    }
}
