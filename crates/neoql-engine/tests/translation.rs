//! End-to-end translation: compile operations and run them against an
//! in-memory store.

mod common;

use common::{acted_in, actor, column, compiler, get, movie, mutation, read, run, signed_in};
use neoql_adapters::query::{AuthContext, MutationKind, ReadShape};
use neoql_common::types::{AuthOperation, AuthTiming, Value};
use neoql_core::graph::lpg::LpgStore;
use neoql_engine::InterpretError;

fn value(json: &str) -> Value {
    serde_json::from_str(json).unwrap()
}

#[test]
fn movies_with_actors_connection() {
    let operation = read(
        "Movie",
        ReadShape::List,
        r#"{ "where": { "title": "Forrest Gump" } }"#,
        r#"{ "fields": [
            { "name": "title" },
            { "name": "actorsConnection", "selection": { "fields": [
                { "name": "edges", "selection": { "fields": [
                    { "name": "node", "selection": { "fields": [ { "name": "name" } ] } }
                ] } }
            ] } }
        ] }"#,
    );
    let compiled = compiler().translate(&operation, &AuthContext::anonymous()).unwrap();
    let expected = "\
MATCH (this0:Movie)
WHERE this0.title = $param0
CALL {
    WITH this0
    MATCH (this0)<-[edge3:ACTED_IN]-(this2:Actor)
    WITH collect({ node: this2, relationship: edge3 }) AS var4
    WITH var4, size(var4) AS var5
    CALL {
        WITH var4
        UNWIND var4 AS var7
        WITH var7.node AS this8, var7.relationship AS edge9
        RETURN collect({ node: this8 { .name } }) AS var6
    }
    RETURN { edges: var6, totalCount: var5 } AS var1
}
RETURN this0 { .title, actorsConnection: var1 } AS this";
    assert_eq!(compiled.text, expected);
    assert_eq!(compiled.params.get("param0"), Some(&Value::from("Forrest Gump")));
    assert_eq!(compiled.params.len(), 1);

    let store = LpgStore::new();
    let gump = movie(&store, "Forrest Gump", 142);
    movie(&store, "Heat", 170);
    let hanks = actor(&store, "Tom Hanks", 1956);
    acted_in(&store, hanks, gump, "Forrest");

    let result = run(&store, &operation, &AuthContext::anonymous()).unwrap();
    assert_eq!(result.columns, vec!["this".to_string()]);
    assert_eq!(
        column(&result),
        vec![value(
            r#"{ "title": "Forrest Gump", "actorsConnection": {
                "edges": [ { "node": { "name": "Tom Hanks" } } ], "totalCount": 1 } }"#
        )]
    );
}

#[test]
fn filter_rules_narrow_and_validate_rules_fail() {
    let store = LpgStore::new();
    for label in ["Note", "Secret"] {
        for (body, owner) in [("mine", "alice"), ("theirs", "bob")] {
            store.create_node_with_props(&[label], [("body", body), ("owner", owner)]);
        }
    }
    let mut alice = AuthContext::anonymous().claim("sub", "alice");
    alice.authenticated = true;
    let bodies = r#"{ "fields": [ { "name": "body" } ] }"#;

    let notes = run(&store, &read("Note", ReadShape::List, "{}", bodies), &alice).unwrap();
    assert_eq!(column(&notes), vec![value(r#"{ "body": "mine" }"#)]);

    let anonymous = run(&store, &read("Note", ReadShape::List, "{}", bodies), &AuthContext::anonymous()).unwrap();
    assert!(anonymous.is_empty());

    match run(&store, &read("Secret", ReadShape::List, "{}", bodies), &alice) {
        Err(InterpretError::Forbidden(error)) => {
            assert_eq!(error.type_name, "Secret");
            assert_eq!(error.operation, AuthOperation::Read);
        }
        other => panic!("Expected Forbidden, got {other:?}"),
    }

    let own = read("Secret", ReadShape::List, r#"{ "where": { "owner": "alice" } }"#, bodies);
    let secrets = run(&store, &own, &alice).unwrap();
    assert_eq!(column(&secrets), vec![value(r#"{ "body": "mine" }"#)]);
}

#[test]
fn connect_or_create_is_idempotent() {
    let store = LpgStore::new();
    movie(&store, "Heat", 170);
    let connect = |tagline: &str| {
        mutation(
            MutationKind::ConnectOrCreate,
            "Movie",
            &format!(
                r#"{{ "where": {{ "title": "Heat" }},
                     "connectOrCreate": {{ "genres": [ {{
                        "where": {{ "node": {{ "name": "Crime" }} }},
                        "onCreate": {{ "node": {{ "tagline": "{tagline}" }} }} }} ] }} }}"#
            ),
            r#"{ "fields": [ { "name": "title" } ] }"#,
        )
    };

    let first = run(&store, &connect("first"), &AuthContext::anonymous()).unwrap();
    assert_eq!(column(&first), vec![value(r#"{ "title": "Heat" }"#)]);
    run(&store, &connect("second"), &AuthContext::anonymous()).unwrap();

    let genres = store.nodes_by_label("Genre");
    assert_eq!(genres.len(), 1);
    assert_eq!(store.node_property(genres[0], "name"), Some(Value::from("Crime")));
    assert_eq!(store.node_property(genres[0], "tagline"), Some(Value::from("first")));
    assert_eq!(store.edge_count(), 1);
}

#[test]
fn created_nodes_read_back() {
    let store = LpgStore::new();
    let create = mutation(
        MutationKind::Create,
        "Movie",
        r#"{ "input": [
            { "title": "Heat", "runtime": 170,
              "actors": { "create": [ { "node": { "name": "Al", "born": 1940 }, "edge": { "role": "Vincent" } } ] } },
            { "title": "Ronin", "runtime": 122 }
        ] }"#,
        r#"{ "fields": [ { "name": "title" } ] }"#,
    );
    let created = run(&store, &create, &AuthContext::anonymous()).unwrap();
    assert_eq!(created.columns, vec!["data".to_string()]);
    assert_eq!(created.len(), 2);
    assert_eq!(store.nodes_by_label("Movie").len(), 2);
    assert_eq!(store.edge_count(), 1);

    let actors = read(
        "Movie",
        ReadShape::List,
        r#"{ "where": { "actors_SOME": { "name": "Al" } } }"#,
        r#"{ "fields": [
            { "name": "title" },
            { "name": "actorsConnection", "selection": { "fields": [
                { "name": "edges", "selection": { "fields": [
                    { "name": "node", "selection": { "fields": [ { "name": "name" } ] } },
                    { "name": "properties", "selection": { "fields": [ { "name": "role" } ] } }
                ] } }
            ] } }
        ] }"#,
    );
    let rows = column(&run(&store, &actors, &AuthContext::anonymous()).unwrap());
    assert_eq!(rows.len(), 1);
    assert_eq!(get(&rows[0], "title"), &Value::from("Heat"));
    let edges = get(get(&rows[0], "actorsConnection"), "edges");
    assert_eq!(
        edges,
        &value(r#"[ { "node": { "name": "Al" }, "properties": { "role": "Vincent" } } ]"#)
    );
}

#[test]
fn update_then_delete() {
    let store = LpgStore::new();
    let heat = movie(&store, "Heat", 170);
    let al = actor(&store, "Al", 1940);
    acted_in(&store, al, heat, "Vincent");

    let update = mutation(
        MutationKind::Update,
        "Movie",
        r#"{ "where": { "title": "Heat" }, "update": { "runtime_INCREMENT": 10 } }"#,
        r#"{ "fields": [ { "name": "runtime" } ] }"#,
    );
    let updated = run(&store, &update, &AuthContext::anonymous()).unwrap();
    assert_eq!(column(&updated), vec![value(r#"{ "runtime": 180 }"#)]);

    let delete = mutation(
        MutationKind::Delete,
        "Movie",
        r#"{ "where": { "title": "Heat" }, "delete": { "actors": [ { "where": { "node": { "name": "Al" } } } ] } }"#,
        "{}",
    );
    run(&store, &delete, &AuthContext::anonymous()).unwrap();
    assert_eq!(store.node_count(), 0);
    assert_eq!(store.edge_count(), 0);
}

#[test]
fn update_writes_attributes_and_relationships_together() {
    let store = LpgStore::new();
    let heat = movie(&store, "Heat", 170);
    let al = actor(&store, "Al", 1940);
    let val = actor(&store, "Val", 1959);
    acted_in(&store, al, heat, "Vincent");
    acted_in(&store, val, heat, "Chris");
    let crime = store.create_node_with_props(&["Genre"], [("name", "Crime")]);

    let update = mutation(
        MutationKind::Update,
        "Movie",
        r#"{ "where": { "title": "Heat" },
             "update": { "runtime_INCREMENT": 10,
                 "actors": [ { "update": { "where": { "node": { "name": "Al" } },
                                           "update": { "node": { "born": 1941 } } } } ] },
             "connect": { "genres": [ { "where": { "node": { "name": "Crime" } } } ] } }"#,
        r#"{ "fields": [ { "name": "runtime" } ] }"#,
    );
    let updated = run(&store, &update, &AuthContext::anonymous()).unwrap();
    assert_eq!(column(&updated), vec![value(r#"{ "runtime": 180 }"#)]);
    assert_eq!(store.node_property(al, "born"), Some(Value::Int64(1941)));
    assert_eq!(store.node_property(val, "born"), Some(Value::Int64(1959)));
    assert_eq!(store.edge_count(), 3);

    let genres = read(
        "Movie",
        ReadShape::List,
        r#"{ "where": { "genres_SOME": { "name": "Crime" } } }"#,
        r#"{ "fields": [ { "name": "title" } ] }"#,
    );
    let rows = column(&run(&store, &genres, &AuthContext::anonymous()).unwrap());
    assert_eq!(rows, vec![value(r#"{ "title": "Heat" }"#)]);
    assert_eq!(store.nodes_by_label("Genre"), vec![crime]);
}

/// Lines closing a sub-call never directly follow a guard.
fn assert_calls_conclude(text: &str) {
    let lines: Vec<&str> = text.lines().collect();
    for pair in lines.windows(2) {
        if pair[1].trim() == "}" {
            assert!(!pair[0].contains("apoc.util.validatePredicate"), "{text}");
        }
    }
}

#[test]
fn guarded_nested_connect_concludes_its_call() {
    let store = LpgStore::new();
    store.create_node_with_props(&["Board"], [("title", "Plans"), ("owner", "alice")]);
    store.create_node_with_props(&["Tag"], [("name", "mine"), ("owner", "alice")]);
    store.create_node_with_props(&["Tag"], [("name", "theirs"), ("owner", "bob")]);
    let alice = signed_in("alice");
    let connect = |tag: &str| {
        mutation(
            MutationKind::Connect,
            "Board",
            &format!(
                r#"{{ "where": {{ "title": "Plans" }},
                     "connect": {{ "tags": [ {{ "where": {{ "node": {{ "name": "{tag}" }} }} }} ] }} }}"#
            ),
            r#"{ "fields": [ { "name": "title" } ] }"#,
        )
    };

    let text = compiler().translate(&connect("mine"), &alice).unwrap().text;
    assert!(text.contains("type=Tag op=CREATE_RELATIONSHIP when=AFTER"), "{text}");
    assert!(text.contains("    RETURN count(this0) AS var"), "{text}");
    assert_calls_conclude(&text);

    let connected = run(&store, &connect("mine"), &alice).unwrap();
    assert_eq!(column(&connected), vec![value(r#"{ "title": "Plans" }"#)]);
    assert_eq!(store.edge_count(), 1);

    // After-timing rules run once the write is done: the edge stays.
    match run(&store, &connect("theirs"), &alice) {
        Err(InterpretError::Forbidden(error)) => {
            assert_eq!(error.type_name, "Tag");
            assert_eq!(error.operation, AuthOperation::CreateRelationship);
            assert_eq!(error.timing, AuthTiming::After);
        }
        other => panic!("Expected Forbidden, got {other:?}"),
    }
    assert_eq!(store.edge_count(), 2);
}

#[test]
fn after_rules_fail_batched_creates_after_the_write() {
    let store = LpgStore::new();
    let create = mutation(
        MutationKind::Create,
        "Tag",
        r#"{ "input": [ { "name": "a", "owner": "alice" }, { "name": "b", "owner": "bob" } ] }"#,
        r#"{ "fields": [ { "name": "name" } ] }"#,
    );
    match run(&store, &create, &signed_in("alice")) {
        Err(InterpretError::Forbidden(error)) => {
            assert_eq!(error.type_name, "Tag");
            assert_eq!(error.operation, AuthOperation::Create);
            assert_eq!(error.timing, AuthTiming::After);
        }
        other => panic!("Expected Forbidden, got {other:?}"),
    }
    assert_eq!(store.nodes_by_label("Tag").len(), 2);

    let own = mutation(
        MutationKind::Create,
        "Tag",
        r#"{ "input": [ { "name": "c", "owner": "alice" } ] }"#,
        r#"{ "fields": [ { "name": "name" } ] }"#,
    );
    let created = run(&store, &own, &signed_in("alice")).unwrap();
    assert_eq!(column(&created), vec![value(r#"{ "name": "c" }"#)]);
}

#[test]
fn before_rules_fail_without_writing() {
    let store = LpgStore::new();
    let board = store.create_node_with_props(&["Board"], [("title", "Plans"), ("owner", "bob")]);
    let alice = signed_in("alice");

    let update = mutation(
        MutationKind::Update,
        "Board",
        r#"{ "update": { "title": "Mine now" } }"#,
        r#"{ "fields": [ { "name": "title" } ] }"#,
    );
    match run(&store, &update, &alice) {
        Err(InterpretError::Forbidden(error)) => {
            assert_eq!(error.type_name, "Board");
            assert_eq!(error.operation, AuthOperation::Update);
            assert_eq!(error.timing, AuthTiming::Before);
        }
        other => panic!("Expected Forbidden, got {other:?}"),
    }
    assert_eq!(store.node_property(board, "title"), Some(Value::from("Plans")));

    let delete = mutation(MutationKind::Delete, "Board", "{}", "{}");
    match run(&store, &delete, &alice) {
        Err(InterpretError::Forbidden(error)) => {
            assert_eq!(error.operation, AuthOperation::Delete);
            assert_eq!(error.timing, AuthTiming::Before);
        }
        other => panic!("Expected Forbidden, got {other:?}"),
    }
    assert_eq!(store.node_count(), 1);

    run(&store, &delete, &signed_in("bob")).unwrap();
    assert_eq!(store.node_count(), 0);
}
