//! Node registry
//!
//! Ordered set of node handles with lookup by id. Built once by the cluster
//! driver and handed explicitly to whatever needs to enumerate nodes.

use std::{collections::HashMap, sync::Arc};

use epidemic_mesh::GossipEngine;

#[derive(Debug, Clone)]
pub struct NodeHandle {
    pub port: u16,
    pub engine: Arc<GossipEngine>,
}

impl NodeHandle {
    pub fn id(&self) -> &str {
        self.engine.id()
    }

    pub fn address(&self) -> &str {
        self.engine.state().address()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: Vec<NodeHandle>,
    by_id: HashMap<String, usize>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. A duplicate id replaces the earlier handle's lookup
    /// entry but keeps insertion order.
    pub fn register(&mut self, handle: NodeHandle) {
        self.by_id
            .insert(handle.id().to_string(), self.nodes.len());
        self.nodes.push(handle);
    }

    pub fn get(&self, id: &str) -> Option<&NodeHandle> {
        self.by_id.get(id).map(|&i| &self.nodes[i])
    }

    pub fn get_by_index(&self, index: usize) -> Option<&NodeHandle> {
        self.nodes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeHandle> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
