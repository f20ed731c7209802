use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Wire message carried by one push round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipMessage {
    pub from: String,
    pub value: String,
    /// Unix seconds at send time. Carried but never consulted on receipt.
    pub timestamp: i64,
}

/// Delivers a gossip message to a peer address and reports the outcome.
///
/// Implementations own framing and connection handling. The engine applies
/// its own timeout around `deliver`, so implementations may block until the
/// peer answers.
#[async_trait]
pub trait GossipTransport: Send + Sync + 'static {
    async fn deliver(&self, peer: &str, message: &GossipMessage) -> Result<(), TransportError>;
}
