//! Labeled property graph store.

mod property;
mod store;

pub use property::{EntityId, PropertyStorage};
pub use store::{GraphError, LpgStore};

use indexmap::IndexMap;
use neoql_common::types::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Edge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A snapshot of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Identifier.
    pub id: NodeId,
    /// Labels in creation order.
    pub labels: SmallVec<[Arc<str>; 2]>,
    /// Properties sorted by key.
    pub properties: IndexMap<String, Value>,
}

impl Node {
    /// Returns true if the node carries `label`.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.as_ref() == label)
    }

    /// Returns a property value.
    #[must_use]
    pub fn get_property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A snapshot of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Identifier.
    pub id: EdgeId,
    /// Source node.
    pub src: NodeId,
    /// Destination node.
    pub dst: NodeId,
    /// Relationship type.
    pub edge_type: Arc<str>,
    /// Properties sorted by key.
    pub properties: IndexMap<String, Value>,
}

impl Edge {
    /// Returns a property value.
    #[must_use]
    pub fn get_property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns the endpoint opposite `node`.
    #[must_use]
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.src == node { self.dst } else { self.src }
    }
}
