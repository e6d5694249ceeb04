//! Shared schema and helpers for translator tests.

use super::plan::Statement;
use super::render::Renderer;
use neoql_adapters::query::{Arguments, SelectionSet};
use neoql_common::types::Value;
use neoql_core::schema::{SchemaModel, TypeCatalogue};

pub(crate) const MOVIES: &str = r#"{
    "interfaces": [
        { "name": "Production", "attributes": [ { "name": "title", "type": "String" } ] }
    ],
    "unions": [ { "name": "Search", "members": ["Movie", "Genre"] } ],
    "relationshipProperties": [
        { "name": "ActedIn", "attributes": [
            { "name": "role", "type": "String" },
            { "name": "screenTime", "type": "Int" },
            { "name": "since", "type": "Date" }
        ] }
    ],
    "nodes": [
        {
            "name": "Movie",
            "implements": ["Production"],
            "attributes": [
                { "name": "id", "type": "ID", "directives": [ { "kind": "id" } ] },
                { "name": "title", "type": "String", "directives": [ { "kind": "unique" } ] },
                { "name": "released", "type": "DateTime" },
                { "name": "runtime", "type": "Int" },
                { "name": "rating", "type": "Float" },
                { "name": "tags", "type": "String", "list": true },
                { "name": "location", "type": "Point" },
                { "name": "published", "type": "Boolean" },
                { "name": "views", "type": "Int", "directives": [ { "kind": "default", "value": 0 } ] },
                { "name": "createdAt", "type": "DateTime",
                  "directives": [ { "kind": "timestamp", "operations": ["CREATE"] } ] },
                { "name": "updatedAt", "type": "DateTime",
                  "directives": [ { "kind": "timestamp", "operations": ["UPDATE"] } ] },
                { "name": "budget", "type": "Int",
                  "directives": [ { "kind": "authorization", "rules": [
                      { "phase": "validate", "where": { "jwt": { "roles_INCLUDES": "admin" } } }
                  ] } ] },
                { "name": "actorCount", "type": "Int", "directives": [ { "kind": "computed",
                  "statement": "MATCH (this)<-[:ACTED_IN]-(a:Actor) RETURN count(a) AS count",
                  "columnName": "count" } ] }
            ],
            "relationships": [
                { "name": "actors", "type": "ACTED_IN", "direction": "IN",
                  "target": "Actor", "properties": "ActedIn", "list": true },
                { "name": "genres", "type": "IN_GENRE", "direction": "OUT",
                  "target": "Genre", "list": true },
                { "name": "director", "type": "DIRECTED", "direction": "IN",
                  "target": "Actor" }
            ]
        },
        {
            "name": "Series",
            "implements": ["Production"],
            "attributes": [ { "name": "title", "type": "String" }, { "name": "episodes", "type": "Int" } ]
        },
        {
            "name": "Genre",
            "attributes": [ { "name": "name", "type": "String", "directives": [ { "kind": "unique" } ] } ],
            "relationships": [
                { "name": "movies", "type": "IN_GENRE", "direction": "IN", "target": "Movie", "list": true }
            ],
            "limit": { "default": 10, "max": 50 }
        },
        {
            "name": "Actor",
            "attributes": [
                { "name": "name", "type": "String" },
                { "name": "born", "type": "Int" }
            ],
            "relationships": [
                { "name": "movies", "type": "ACTED_IN", "direction": "OUT",
                  "target": "Movie", "properties": "ActedIn", "list": true },
                { "name": "work", "type": "ACTED_IN", "direction": "OUT",
                  "target": "Production", "properties": "ActedIn", "list": true },
                { "name": "favorites", "type": "LIKES", "direction": "OUT",
                  "target": "Search", "list": true },
                { "name": "friends", "type": "FRIENDS_WITH", "direction": "UNDIRECTED",
                  "target": "Actor", "list": true }
            ]
        },
        {
            "name": "Post",
            "attributes": [
                { "name": "id", "type": "ID", "directives": [ { "kind": "id" } ] },
                { "name": "content", "type": "String" },
                { "name": "authorId", "type": "ID" }
            ],
            "authorization": [
                { "phase": "filter", "where": { "node": { "authorId": "$jwt.sub" } } },
                { "phase": "validate", "operations": ["CREATE", "UPDATE"], "when": ["AFTER"],
                  "where": { "node": { "authorId": "$jwt.sub" } } }
            ],
            "exposure": { "delete": false }
        }
    ]
}"#;

pub(crate) fn schema() -> SchemaModel {
    let catalogue: TypeCatalogue = serde_json::from_str(MOVIES).unwrap();
    SchemaModel::build(&catalogue).unwrap()
}

pub(crate) fn args(json: &str) -> Arguments {
    serde_json::from_str(json).unwrap()
}

pub(crate) fn selection(json: &str) -> SelectionSet {
    serde_json::from_str(json).unwrap()
}

pub(crate) fn value(json: &str) -> Value {
    serde_json::from_str(json).unwrap()
}

pub(crate) fn render(statement: &Statement) -> String {
    Renderer::new().render(statement).unwrap().text
}
