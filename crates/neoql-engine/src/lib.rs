//! # neoql-engine
//!
//! The translation engine: turns resolved graph-query operations into
//! Cypher statement text and parameters.
//!
//! ## Modules
//!
//! - [`translator`] - The [`translate`] entry point
//! - [`compiler`] - A shareable handle over a built schema
//! - [`config`] - Translation options
//! - [`query`] - Builder tree, renderer, translators and interpreter

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod compiler;
pub mod config;
pub mod query;
pub mod translator;

pub use compiler::Compiler;
pub use config::TranslatorConfig;
pub use query::{
    ArgPath, Cursor, Datum, InterpretError, Interpreter, MUTATION_COLUMN, PageInfo, PageWindow, QueryResult,
    READ_COLUMN, Renderer, Statement,
};
pub use translator::{Translation, plan, translate};
