//! Push-style epidemic dissemination of a single value over a local cluster.
//!
//! The gossip core lives in the `epidemic-mesh` crate and is re-exported
//! through [`mesh`]. This crate adds the HTTP surface, the cluster driver,
//! and the observer tools.

pub mod admin;
pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod logging;
pub mod mesh;
pub mod observer;
pub mod registry;
