//! Per-node gossip counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct GossipMetrics {
    pushes_sent: AtomicU64,
    push_failures: AtomicU64,
    messages_received: AtomicU64,
    value_updates: AtomicU64,
}

impl GossipMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a push that reached its peer.
    pub fn record_push_sent(&self) {
        self.pushes_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a push that failed, including rounds with no peer to pick.
    pub fn record_push_failure(&self) {
        self.push_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_value_update(&self) {
        self.value_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pushes_sent: self.pushes_sent.load(Ordering::Relaxed),
            push_failures: self.push_failures.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            value_updates: self.value_updates.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub pushes_sent: u64,
    pub push_failures: u64,
    pub messages_received: u64,
    pub value_updates: u64,
}
