//! LPG graph store implementation.

use super::{Edge, EdgeId, Node, NodeId, PropertyStorage};
use crate::graph::Direction;
use neoql_common::types::Value;
use neoql_common::utils::hash::FxHashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Errors from graph mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A node still has relationships and was deleted without detaching.
    #[error("cannot delete node {0} because it still has relationships")]
    NodeHasEdges(NodeId),

    /// A referenced node does not exist.
    #[error("node {0} does not exist")]
    MissingNode(NodeId),
}

#[derive(Debug)]
struct NodeRecord {
    labels: SmallVec<[Arc<str>; 2]>,
}

#[derive(Debug)]
struct EdgeRecord {
    src: NodeId,
    dst: NodeId,
    edge_type: Arc<str>,
}

/// The labeled property graph store.
///
/// Reads return snapshots; iteration order is by ascending id so that
/// anything computed over the store is reproducible.
pub struct LpgStore {
    nodes: RwLock<FxHashMap<NodeId, NodeRecord>>,
    edges: RwLock<FxHashMap<EdgeId, EdgeRecord>>,
    node_properties: PropertyStorage<NodeId>,
    edge_properties: PropertyStorage<EdgeId>,
    /// Outgoing edges per node.
    forward_adj: RwLock<FxHashMap<NodeId, SmallVec<[EdgeId; 4]>>>,
    /// Incoming edges per node.
    backward_adj: RwLock<FxHashMap<NodeId, SmallVec<[EdgeId; 4]>>>,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
}

impl LpgStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(FxHashMap::default()),
            edges: RwLock::new(FxHashMap::default()),
            node_properties: PropertyStorage::new(),
            edge_properties: PropertyStorage::new(),
            forward_adj: RwLock::new(FxHashMap::default()),
            backward_adj: RwLock::new(FxHashMap::default()),
            next_node_id: AtomicU64::new(0),
            next_edge_id: AtomicU64::new(0),
        }
    }

    // === Node Operations ===

    /// Creates a new node with the given labels.
    pub fn create_node(&self, labels: &[&str]) -> NodeId {
        let id = NodeId(self.next_node_id.fetch_add(1, Ordering::Relaxed));
        let mut record = NodeRecord {
            labels: SmallVec::new(),
        };
        for label in labels {
            if !record.labels.iter().any(|l| l.as_ref() == *label) {
                record.labels.push(Arc::from(*label));
            }
        }
        self.nodes.write().insert(id, record);
        id
    }

    /// Creates a new node with labels and properties.
    pub fn create_node_with_props(
        &self,
        labels: &[&str],
        properties: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Value>)>,
    ) -> NodeId {
        let id = self.create_node(labels);
        for (key, value) in properties {
            self.node_properties.set(id, key.as_ref(), value.into());
        }
        id
    }

    /// Gets a node snapshot.
    #[must_use]
    pub fn get_node(&self, id: NodeId) -> Option<Node> {
        let labels = self.nodes.read().get(&id)?.labels.clone();
        Some(Node {
            id,
            labels,
            properties: self.node_properties.get_all(id),
        })
    }

    /// Returns true if the node exists.
    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.read().contains_key(&id)
    }

    /// Returns true if the node exists and carries `label`.
    #[must_use]
    pub fn has_label(&self, id: NodeId, label: &str) -> bool {
        self.nodes
            .read()
            .get(&id)
            .is_some_and(|r| r.labels.iter().any(|l| l.as_ref() == label))
    }

    /// Gets one node property.
    #[must_use]
    pub fn node_property(&self, id: NodeId, key: &str) -> Option<Value> {
        self.node_properties.get(id, key)
    }

    /// Sets a node property; `Null` removes it.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::MissingNode`] if the node does not exist.
    pub fn set_node_property(&self, id: NodeId, key: &str, value: Value) -> Result<(), GraphError> {
        if !self.contains_node(id) {
            return Err(GraphError::MissingNode(id));
        }
        self.node_properties.set(id, key, value);
        Ok(())
    }

    /// Deletes a node. With `detach`, its edges are deleted first.
    ///
    /// Returns false if the node did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeHasEdges`] when the node has edges and
    /// `detach` is false.
    pub fn delete_node(&self, id: NodeId, detach: bool) -> Result<bool, GraphError> {
        if !self.contains_node(id) {
            return Ok(false);
        }
        let incident = self.edges_of(id, Direction::Both);
        if !incident.is_empty() {
            if !detach {
                return Err(GraphError::NodeHasEdges(id));
            }
            for edge in incident {
                self.delete_edge(edge);
            }
        }
        self.nodes.write().remove(&id);
        self.forward_adj.write().remove(&id);
        self.backward_adj.write().remove(&id);
        self.node_properties.remove_all(id);
        Ok(true)
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// All node ids, ascending.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Nodes carrying `label`, ascending.
    #[must_use]
    pub fn nodes_by_label(&self, label: &str) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .read()
            .iter()
            .filter(|(_, r)| r.labels.iter().any(|l| l.as_ref() == label))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    // === Edge Operations ===

    /// Creates a new edge.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::MissingNode`] if either endpoint is missing.
    pub fn create_edge(&self, src: NodeId, dst: NodeId, edge_type: &str) -> Result<EdgeId, GraphError> {
        for endpoint in [src, dst] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::MissingNode(endpoint));
            }
        }
        let id = EdgeId(self.next_edge_id.fetch_add(1, Ordering::Relaxed));
        self.edges.write().insert(
            id,
            EdgeRecord {
                src,
                dst,
                edge_type: Arc::from(edge_type),
            },
        );
        self.forward_adj.write().entry(src).or_default().push(id);
        self.backward_adj.write().entry(dst).or_default().push(id);
        Ok(id)
    }

    /// Creates a new edge with properties.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::MissingNode`] if either endpoint is missing.
    pub fn create_edge_with_props(
        &self,
        src: NodeId,
        dst: NodeId,
        edge_type: &str,
        properties: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Value>)>,
    ) -> Result<EdgeId, GraphError> {
        let id = self.create_edge(src, dst, edge_type)?;
        for (key, value) in properties {
            self.edge_properties.set(id, key.as_ref(), value.into());
        }
        Ok(id)
    }

    /// Gets an edge snapshot.
    #[must_use]
    pub fn get_edge(&self, id: EdgeId) -> Option<Edge> {
        let edges = self.edges.read();
        let record = edges.get(&id)?;
        Some(Edge {
            id,
            src: record.src,
            dst: record.dst,
            edge_type: record.edge_type.clone(),
            properties: self.edge_properties.get_all(id),
        })
    }

    /// Gets one edge property.
    #[must_use]
    pub fn edge_property(&self, id: EdgeId, key: &str) -> Option<Value> {
        self.edge_properties.get(id, key)
    }

    /// Sets an edge property; `Null` removes it.
    pub fn set_edge_property(&self, id: EdgeId, key: &str, value: Value) {
        if self.edges.read().contains_key(&id) {
            self.edge_properties.set(id, key, value);
        }
    }

    /// Deletes an edge. Returns false if it did not exist.
    pub fn delete_edge(&self, id: EdgeId) -> bool {
        let Some(record) = self.edges.write().remove(&id) else {
            return false;
        };
        if let Some(out) = self.forward_adj.write().get_mut(&record.src) {
            out.retain(|e| *e != id);
        }
        if let Some(inc) = self.backward_adj.write().get_mut(&record.dst) {
            inc.retain(|e| *e != id);
        }
        self.edge_properties.remove_all(id);
        true
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.read().len()
    }

    // === Traversal ===

    /// Edges incident to `node` in `direction`, ascending by id.
    ///
    /// With [`Direction::Both`] a self-loop is reported once.
    #[must_use]
    pub fn edges_of(&self, node: NodeId, direction: Direction) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            if let Some(out) = self.forward_adj.read().get(&node) {
                ids.extend(out.iter().copied());
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            if let Some(inc) = self.backward_adj.read().get(&node) {
                ids.extend(inc.iter().copied());
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Neighbors of `node` in `direction`, one per incident edge.
    #[must_use]
    pub fn neighbors(&self, node: NodeId, direction: Direction) -> Vec<NodeId> {
        let edges = self.edges.read();
        self.edges_of(node, direction)
            .into_iter()
            .filter_map(|id| edges.get(&id))
            .map(|r| if r.src == node { r.dst } else { r.src })
            .collect()
    }
}

impl Default for LpgStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_node_with_props() {
        let store = LpgStore::new();
        let id = store.create_node_with_props(
            &["Person", "Actor"],
            [("name", Value::from("Alice")), ("age", Value::from(30i64))],
        );

        let node = store.get_node(id).unwrap();
        assert!(node.has_label("Actor"));
        assert!(!node.has_label("Animal"));
        assert_eq!(node.get_property("name").and_then(Value::as_str), Some("Alice"));
        assert_eq!(store.node_property(id, "age"), Some(Value::Int64(30)));
    }

    #[test]
    fn test_delete_node_requires_detach() {
        let store = LpgStore::new();
        let a = store.create_node(&["Person"]);
        let b = store.create_node(&["Person"]);
        store.create_edge(a, b, "KNOWS").unwrap();

        assert_eq!(store.delete_node(a, false), Err(GraphError::NodeHasEdges(a)));
        assert_eq!(store.delete_node(a, true), Ok(true));
        assert_eq!(store.edge_count(), 0);
        assert!(store.edges_of(b, Direction::Both).is_empty());
        assert_eq!(store.delete_node(a, true), Ok(false));
    }

    #[test]
    fn test_edges_and_neighbors() {
        let store = LpgStore::new();
        let a = store.create_node(&["Person"]);
        let b = store.create_node(&["Person"]);
        let c = store.create_node(&["Person"]);
        store.create_edge(a, b, "KNOWS").unwrap();
        let ac = store
            .create_edge_with_props(a, c, "KNOWS", [("since", 2020i64)])
            .unwrap();

        assert_eq!(store.neighbors(a, Direction::Outgoing), vec![b, c]);
        assert_eq!(store.neighbors(c, Direction::Incoming), vec![a]);
        assert!(store.neighbors(c, Direction::Outgoing).is_empty());

        let edge = store.get_edge(ac).unwrap();
        assert_eq!(edge.other(a), c);
        assert_eq!(edge.get_property("since"), Some(&Value::Int64(2020)));

        assert!(store.delete_edge(ac));
        assert!(!store.delete_edge(ac));
        assert_eq!(store.neighbors(a, Direction::Both), vec![b]);
    }

    #[test]
    fn test_nodes_by_label_sorted() {
        let store = LpgStore::new();
        let p1 = store.create_node(&["Person"]);
        let _m = store.create_node(&["Movie"]);
        let p2 = store.create_node(&["Person"]);
        assert_eq!(store.nodes_by_label("Person"), vec![p1, p2]);
        assert_eq!(store.node_ids().len(), 3);
    }

    #[test]
    fn test_missing_endpoint() {
        let store = LpgStore::new();
        let a = store.create_node(&["Person"]);
        assert_eq!(
            store.create_edge(a, NodeId(99), "KNOWS"),
            Err(GraphError::MissingNode(NodeId(99)))
        );
    }
}
