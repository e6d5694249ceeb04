//! Query translation pipeline.
//!
//! This module holds everything between a resolved request and statement
//! text:
//!
//! - **Plan**: the builder tree of clauses and expressions
//! - **Renderer**: tree to text plus parameters, checking variable scoping
//! - **Predicate / Auth**: filter trees and authorization rules to predicates
//! - **Translators**: reads, connections, aggregates and mutations
//! - **Interpreter**: runs builder trees against an in-memory store

pub mod aggregate;
pub mod auth;
pub mod connection;
pub mod context;
pub mod create;
pub mod interpret;
pub mod mutation;
pub mod namer;
pub mod nested;
pub mod plan;
pub mod predicate;
pub mod projection;
pub mod read;
pub mod render;

#[cfg(test)]
pub(crate) mod fixtures;

pub use connection::{Cursor, PageInfo, PageWindow};
pub use context::ArgPath;
pub use interpret::{Datum, InterpretError, Interpreter, QueryResult};
pub use mutation::MUTATION_COLUMN;
pub use namer::Namer;
pub use plan::Statement;
pub use read::READ_COLUMN;
pub use render::{Rendered, Renderer};
