//! In-memory property graph.
//!
//! A small labeled property graph used as a reference store: the engine's
//! interpreter runs compiled statements against it so that translation
//! semantics can be tested without a database.

pub mod lpg;

/// Direction of edge traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Edges leaving the node.
    Outgoing,
    /// Edges entering the node.
    Incoming,
    /// Both.
    Both,
}
