//! # neoql-core
//!
//! Core layer for Neoql: the schema model and an in-memory property graph.
//!
//! ## Modules
//!
//! - [`schema`] - Type catalogue input and the validated schema model
//! - [`graph`] - In-memory labeled property graph used as a reference store

pub mod graph;
pub mod schema;

pub use graph::lpg::{Edge, EdgeId, LpgStore, Node, NodeId};
pub use schema::{SchemaModel, TypeCatalogue};
