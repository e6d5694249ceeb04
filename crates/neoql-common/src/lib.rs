//! # neoql-common
//!
//! Foundation layer for Neoql: values, parameter maps, and the error taxonomy.
//!
//! This crate provides the fundamental building blocks used by all other
//! Neoql crates. It has no internal dependencies and should be kept minimal.
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions (Value, ParameterMap, authorization vocabulary)
//! - [`utils`] - Utility functions and helpers (hashing, errors)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use types::{AuthOperation, AuthTiming, ParameterMap, Value};
pub use utils::error::{
    AuthorizationError, BuilderError, Error, Result, SchemaError, SchemaLocation,
    TranslationError,
};
