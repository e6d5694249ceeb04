//! # neoql
//!
//! Compiles typed GraphQL selections into parameterized Cypher.
//!
//! Start with a [`TypeCatalogue`] describing your node types, build it into a
//! [`SchemaModel`], and hand that to a [`Compiler`]. Each resolved request
//! ([`Operation`]) then compiles to statement text plus a [`ParameterMap`]
//! ready for any driver.
//!
//! ## Quick Start
//!
//! ```rust
//! use neoql::{AuthContext, Compiler, Operation, TranslatorConfig, TypeCatalogue, Value};
//!
//! let catalogue: TypeCatalogue = serde_json::from_str(r#"{
//!     "nodes": [ { "name": "Movie", "attributes": [ { "name": "title", "type": "String" } ] } ]
//! }"#)?;
//! let compiler = Compiler::build(&catalogue, TranslatorConfig::default())?;
//!
//! let request = Operation::from_json(r#"{
//!     "operation": "read",
//!     "target": "Movie",
//!     "args": { "where": { "title": "Heat" } },
//!     "selection": { "fields": [ { "name": "title" } ] }
//! }"#)?;
//! let translation = compiler.translate(&request, &AuthContext::anonymous())?;
//!
//! assert_eq!(
//!     translation.text,
//!     "MATCH (this0:Movie)\nWHERE this0.title = $param0\nRETURN this0 { .title } AS this"
//! );
//! assert_eq!(translation.params.get("param0"), Some(&Value::from("Heat")));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crates
//!
//! | Crate | Contents |
//! | ----- | -------- |
//! | `neoql-common` | Values, parameter maps, the error taxonomy |
//! | `neoql-core` | Type catalogue, schema model, in-memory graph |
//! | `neoql-adapters` | Request documents and caller context |
//! | `neoql-engine` | Translators, renderer, reference interpreter |

// The translation API
pub use neoql_engine::{
    Compiler, Cursor, InterpretError, Interpreter, PageInfo, QueryResult, Statement, Translation,
    TranslatorConfig, plan, translate,
};

// Schema building
pub use neoql_core::{LpgStore, SchemaModel, TypeCatalogue};

// Requests
pub use neoql_adapters::{AuthContext, Field, MutationKind, Operation, ReadShape, SelectionSet};

// Values and errors
pub use neoql_common::{
    AuthOperation, AuthTiming, AuthorizationError, BuilderError, Error, ParameterMap, Result,
    SchemaError, TranslationError, Value,
};
