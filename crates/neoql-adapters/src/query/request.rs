//! Selected-field and argument trees.
//!
//! An [`Operation`] is what the serving layer produces after resolving an
//! incoming request: the root target type, the shape of the root field, its
//! arguments, and the nested selection. Documents deserialize from JSON:
//!
//! ```json
//! {
//!   "operation": "read",
//!   "target": "Movie",
//!   "args": { "where": { "title": "Forrest Gump" } },
//!   "selection": { "fields": [
//!     { "name": "title" },
//!     { "name": "actorsConnection", "selection": { "fields": [
//!       { "name": "edges", "selection": { "fields": [
//!         { "name": "node", "selection": { "fields": [{ "name": "name" }] } }
//!       ] } }
//!     ] } }
//!   ] }
//! }
//! ```

use indexmap::IndexMap;
use neoql_common::types::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Argument values by argument name, in request order.
pub type Arguments = IndexMap<String, Value>;

/// Failure to load a request document.
#[derive(Error, Debug)]
pub enum RequestError {
    /// The document is not valid JSON for the expected shape.
    #[error("malformed request document: {0}")]
    Json(#[from] serde_json::Error),
}

/// One root operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum Operation {
    /// A list, connection or aggregate read.
    Read(ReadRequest),
    /// A mutation.
    Mutation(MutationRequest),
}

impl Operation {
    /// A read of `target`.
    #[must_use]
    pub fn read(target: impl Into<String>, shape: ReadShape, args: Arguments, selection: SelectionSet) -> Self {
        Operation::Read(ReadRequest {
            target: target.into(),
            shape,
            args,
            selection,
        })
    }

    /// A mutation of `target`.
    #[must_use]
    pub fn mutation(
        kind: MutationKind,
        target: impl Into<String>,
        args: Arguments,
        selection: SelectionSet,
    ) -> Self {
        Operation::Mutation(MutationRequest {
            kind,
            target: target.into(),
            args,
            selection,
        })
    }

    /// Parses a JSON request document.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Json`] if the document does not match.
    pub fn from_json(json: &str) -> Result<Self, RequestError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The root target type name.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Operation::Read(r) => &r.target,
            Operation::Mutation(m) => &m.target,
        }
    }

    /// A short description for logs.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operation::Read(r) => match r.shape {
                ReadShape::List => "read",
                ReadShape::Connection => "connection",
                ReadShape::Aggregate => "aggregate",
            },
            Operation::Mutation(m) => m.kind.as_str(),
        }
    }
}

/// The shape of a root read field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadShape {
    /// `movies`
    #[default]
    List,
    /// `moviesConnection`
    Connection,
    /// `moviesAggregate`
    Aggregate,
}

/// A root read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Node, interface or union type name.
    pub target: String,
    /// Root field shape.
    #[serde(default)]
    pub shape: ReadShape,
    /// `where`, `options`, `sort`, `first`, `after`, ...
    #[serde(default)]
    pub args: Arguments,
    /// Requested fields.
    #[serde(default)]
    pub selection: SelectionSet,
}

/// Mutation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    /// `createMovies(input: [...])`
    Create,
    /// `updateMovies(where, update, connect, ...)`
    Update,
    /// `deleteMovies(where, delete)`
    Delete,
    /// `updateMovies(where, connect)`
    Connect,
    /// `updateMovies(where, disconnect)`
    Disconnect,
    /// `updateMovies(where, connectOrCreate)`
    ConnectOrCreate,
}

impl MutationKind {
    /// The kind's name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
            MutationKind::Connect => "connect",
            MutationKind::Disconnect => "disconnect",
            MutationKind::ConnectOrCreate => "connectOrCreate",
        }
    }
}

/// A root mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    /// What to do.
    pub kind: MutationKind,
    /// Node type name.
    pub target: String,
    /// `input`, `where`, `update`, `connect`, ...
    #[serde(default)]
    pub args: Arguments,
    /// Fields selected on the mutated nodes.
    #[serde(default)]
    pub selection: SelectionSet,
}

/// A set of selected fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSet {
    /// Fields selected regardless of the concrete type.
    pub fields: Vec<Field>,
    /// Fields selected only for a given type (`... on Movie { }`).
    #[serde(rename = "on", skip_serializing_if = "Vec::is_empty")]
    pub type_conditions: Vec<TypeCondition>,
}

impl SelectionSet {
    /// A selection of plain fields.
    #[must_use]
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            type_conditions: Vec::new(),
        }
    }

    /// Adds a type-conditional selection.
    #[must_use]
    pub fn on(mut self, type_name: impl Into<String>, fields: impl IntoIterator<Item = Field>) -> Self {
        self.type_conditions.push(TypeCondition {
            type_name: type_name.into(),
            fields: fields.into_iter().collect(),
        });
        self
    }

    /// Returns true if nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.type_conditions.iter().all(|c| c.fields.is_empty())
    }

    /// Finds a plain field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Fields selected only when the value is of `type_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCondition {
    /// The condition type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// The fields.
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// One selected field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Schema field name.
    pub name: String,
    /// Response key override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Field arguments.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub args: Arguments,
    /// Sub-selection for object-typed fields.
    #[serde(default, skip_serializing_if = "SelectionSet::is_empty")]
    pub selection: SelectionSet,
}

impl Field {
    /// A field with no alias, arguments or sub-selection.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            args: Arguments::new(),
            selection: SelectionSet::default(),
        }
    }

    /// Sets the response key.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds an argument.
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Sets the sub-selection to plain fields.
    #[must_use]
    pub fn select(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.selection.fields.extend(fields);
        self
    }

    /// Sets the whole sub-selection.
    #[must_use]
    pub fn with_selection(mut self, selection: SelectionSet) -> Self {
        self.selection = selection;
        self
    }

    /// The key the field's value is returned under.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read_document() {
        let op = Operation::from_json(
            r#"{
                "operation": "read",
                "target": "Movie",
                "args": { "where": { "title": "Forrest Gump" } },
                "selection": {
                    "fields": [
                        { "name": "title", "alias": "name" },
                        { "name": "actors", "args": { "options": { "limit": 2 } }, "selection": { "fields": [{ "name": "name" }] } }
                    ],
                    "on": [{ "type": "Movie", "fields": [{ "name": "runtime" }] }]
                }
            }"#,
        )
        .unwrap();

        let Operation::Read(read) = &op else {
            panic!("Expected read, got {op:?}");
        };
        assert_eq!(read.shape, ReadShape::List);
        assert_eq!(read.selection.fields[0].response_key(), "name");
        assert_eq!(read.selection.type_conditions[0].type_name, "Movie");
        let actors = read.selection.field("actors").unwrap();
        assert_eq!(
            actors.args["options"].get("limit"),
            Some(&Value::Int64(2))
        );
        assert_eq!(op.kind_name(), "read");
    }

    #[test]
    fn test_parse_mutation_document() {
        let op = Operation::from_json(
            r#"{ "operation": "mutation", "kind": "connectOrCreate", "target": "Movie",
                 "args": { "where": { "title": "Heat" } } }"#,
        )
        .unwrap();
        assert_eq!(op.target(), "Movie");
        assert_eq!(op.kind_name(), "connectOrCreate");
    }

    #[test]
    fn test_malformed_document() {
        let err = Operation::from_json(r#"{ "operation": "subscribe", "target": "Movie" }"#)
            .unwrap_err();
        assert!(err.to_string().starts_with("malformed request document"));
    }

    #[test]
    fn test_builders() {
        let selection = SelectionSet::new([
            Field::new("title"),
            Field::new("actors").arg("where", Value::Null).select([Field::new("name")]),
        ])
        .on("Movie", [Field::new("runtime")]);
        assert!(!selection.is_empty());
        assert_eq!(selection.fields[1].selection.fields.len(), 1);
        assert!(SelectionSet::default().is_empty());
    }
}
