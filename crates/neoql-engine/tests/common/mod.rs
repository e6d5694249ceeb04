//! Shared catalogue and helpers for the integration tests.

#![allow(dead_code)]

use neoql_adapters::query::{AuthContext, MutationKind, Operation, ReadShape};
use neoql_common::types::Value;
use neoql_core::graph::lpg::{LpgStore, NodeId};
use neoql_core::schema::{SchemaModel, TypeCatalogue};
use neoql_engine::{Compiler, InterpretError, Interpreter, QueryResult, TranslatorConfig};

pub const CATALOGUE: &str = r#"{
    "relationshipProperties": [
        { "name": "ActedIn", "attributes": [ { "name": "role", "type": "String" } ] }
    ],
    "nodes": [
        {
            "name": "Movie",
            "attributes": [
                { "name": "title", "type": "String", "directives": [ { "kind": "unique" } ] },
                { "name": "runtime", "type": "Int" }
            ],
            "relationships": [
                { "name": "actors", "type": "ACTED_IN", "direction": "IN",
                  "target": "Actor", "properties": "ActedIn", "list": true },
                { "name": "genres", "type": "IN_GENRE", "direction": "OUT",
                  "target": "Genre", "list": true }
            ]
        },
        {
            "name": "Actor",
            "attributes": [
                { "name": "name", "type": "String" },
                { "name": "born", "type": "Int" }
            ],
            "relationships": [
                { "name": "movies", "type": "ACTED_IN", "direction": "OUT",
                  "target": "Movie", "properties": "ActedIn", "list": true }
            ]
        },
        {
            "name": "Genre",
            "attributes": [
                { "name": "name", "type": "String", "directives": [ { "kind": "unique" } ] },
                { "name": "tagline", "type": "String" }
            ]
        },
        {
            "name": "Note",
            "attributes": [ { "name": "body", "type": "String" }, { "name": "owner", "type": "String" } ],
            "authorization": [ { "phase": "filter", "where": { "node": { "owner": "$jwt.sub" } } } ]
        },
        {
            "name": "Secret",
            "attributes": [ { "name": "body", "type": "String" }, { "name": "owner", "type": "String" } ],
            "authorization": [
                { "phase": "validate", "operations": ["READ"], "where": { "node": { "owner": "$jwt.sub" } } }
            ]
        },
        {
            "name": "Board",
            "attributes": [ { "name": "title", "type": "String" }, { "name": "owner", "type": "String" } ],
            "relationships": [
                { "name": "tags", "type": "TAGGED", "direction": "OUT", "target": "Tag", "list": true }
            ],
            "authorization": [
                { "phase": "validate", "operations": ["UPDATE", "DELETE"], "when": ["BEFORE"],
                  "where": { "node": { "owner": "$jwt.sub" } } }
            ]
        },
        {
            "name": "Tag",
            "attributes": [ { "name": "name", "type": "String" }, { "name": "owner", "type": "String" } ],
            "authorization": [
                { "phase": "validate", "operations": ["CREATE", "CREATE_RELATIONSHIP"], "when": ["AFTER"],
                  "where": { "node": { "owner": "$jwt.sub" } } }
            ]
        }
    ]
}"#;

pub fn schema() -> SchemaModel {
    let catalogue: TypeCatalogue = serde_json::from_str(CATALOGUE).unwrap();
    SchemaModel::build(&catalogue).unwrap()
}

pub fn compiler() -> Compiler {
    Compiler::with_config(std::sync::Arc::new(schema()), TranslatorConfig::new())
}

pub fn read(target: &str, shape: ReadShape, args: &str, selection: &str) -> Operation {
    Operation::read(
        target,
        shape,
        serde_json::from_str(args).unwrap(),
        serde_json::from_str(selection).unwrap(),
    )
}

pub fn mutation(kind: MutationKind, target: &str, args: &str, selection: &str) -> Operation {
    Operation::mutation(
        kind,
        target,
        serde_json::from_str(args).unwrap(),
        serde_json::from_str(selection).unwrap(),
    )
}

/// Compiles `operation` and runs it against `store`.
pub fn run(store: &LpgStore, operation: &Operation, auth: &AuthContext) -> Result<QueryResult, InterpretError> {
    let statement = compiler().plan(operation, auth).unwrap();
    Interpreter::new(store).run(&statement)
}

/// The single value of the single returned column, per row.
pub fn column(result: &QueryResult) -> Vec<Value> {
    assert_eq!(result.columns.len(), 1, "Expected one column, got {:?}", result.columns);
    result.rows.iter().map(|row| row[0].clone()).collect()
}

pub fn movie(store: &LpgStore, title: &str, runtime: i64) -> NodeId {
    store.create_node_with_props(&["Movie"], [("title", Value::from(title)), ("runtime", Value::Int64(runtime))])
}

pub fn actor(store: &LpgStore, name: &str, born: i64) -> NodeId {
    store.create_node_with_props(&["Actor"], [("name", Value::from(name)), ("born", Value::Int64(born))])
}

pub fn acted_in(store: &LpgStore, actor: NodeId, movie: NodeId, role: &str) {
    store
        .create_edge_with_props(actor, movie, "ACTED_IN", [("role", role)])
        .unwrap();
}

/// An authenticated caller with subject `sub`.
pub fn signed_in(sub: &str) -> AuthContext {
    let mut auth = AuthContext::anonymous().claim("sub", sub);
    auth.authenticated = true;
    auth
}

/// Reads `key` from a map value.
pub fn get<'v>(value: &'v Value, key: &str) -> &'v Value {
    value.get(key).unwrap_or_else(|| panic!("Expected key {key} in {value}"))
}
