//! Gossip error types.
//!
//! Every variant is returned to the immediate caller; none of them is fatal
//! to the node that produced it.

use thiserror::Error;

pub type GossipResult<T> = Result<T, GossipError>;

#[derive(Debug, Error)]
pub enum GossipError {
    /// The node was built with an empty peer set.
    #[error("no peers available")]
    NoPeerAvailable,

    /// The chosen peer could not be reached or rejected the message.
    #[error("failed to send to {peer}: {source}")]
    DeliveryFailure {
        peer: String,
        #[source]
        source: TransportError,
    },

    /// An inbound payload could not be decoded into a gossip message.
    #[error("malformed gossip message: {0}")]
    MalformedMessage(String),
}

impl GossipError {
    /// Peer address attached to a delivery failure.
    pub fn peer(&self) -> Option<&str> {
        match self {
            Self::DeliveryFailure { peer, .. } => Some(peer),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GossipError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}

/// Failures reported by a [`GossipTransport`](crate::GossipTransport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(String),
}
