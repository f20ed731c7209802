//! Epidemic Gossip Propagation
//!
//! This crate provides the propagation core of a push-gossip cluster:
//! - Per-node state (identity, value, static peer set, last mutation time)
//! - Uniform random peer selection
//! - Push rounds delivered through a pluggable transport
//! - Unconditional last-received-wins merge on receipt

pub mod engine;
pub mod error;
pub mod metrics;
pub mod node;
pub mod transport;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use engine::{GossipEngine, DEFAULT_PUSH_TIMEOUT};
pub use error::{GossipError, GossipResult, TransportError};
pub use metrics::{GossipMetrics, MetricsSnapshot};
pub use node::{NodeState, NodeStatus, INITIAL_VALUE};
pub use transport::{GossipMessage, GossipTransport};
