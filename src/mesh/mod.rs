//! Gossip propagation core plus its HTTP transport adapter
//!
//! This module re-exports the epidemic-mesh crate and provides the node HTTP
//! endpoints and the reqwest-backed transport.

// Re-export everything from epidemic-mesh crate
pub use epidemic_mesh::*;

// Local HTTP API routes served by each node
pub mod endpoints;
pub mod http_transport;

pub use endpoints::{node_router, AckResponse, SetValueResponse, TriggerResponse};
pub use http_transport::HttpTransport;
