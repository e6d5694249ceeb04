//! # neoql-adapters
//!
//! The boundary between Neoql and the schema-serving layer in front of it.
//! The serving layer parses an incoming request, resolves it against its
//! generated schema and hands Neoql a selected-field tree plus argument tree;
//! this crate defines those documents.
//!
//! ## Modules
//!
//! - [`query`] - Operations, selection sets and the authentication context

pub mod query;

pub use query::{AuthContext, Field, MutationKind, Operation, ReadShape, SelectionSet};
