//! Property tests over generated filters and generated graphs.

mod common;

use std::collections::{BTreeSet, HashSet};

use common::{actor, column, compiler, get, movie, read, run};
use neoql_adapters::query::{AuthContext, ReadShape};
use neoql_common::types::Value;
use neoql_core::graph::lpg::LpgStore;
use neoql_engine::Cursor;
use proptest::prelude::*;
use regex::Regex;
use serde_json::json;

fn leaf() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(|title| json!({ "title": title })),
        "[a-z]{1,3}".prop_map(|part| json!({ "title_CONTAINS": part })),
        (0i64..300).prop_map(|n| json!({ "runtime_GT": n })),
        prop::collection::vec(0i64..300, 0..4).prop_map(|ns| json!({ "runtime_IN": ns })),
        (1900i64..2000).prop_map(|born| json!({ "actors_SOME": { "born_LT": born } })),
        "[a-z]{1,6}".prop_map(|role| json!({ "actorsConnection_NONE": { "edge": { "role": role } } })),
    ]
}

fn filter() -> impl Strategy<Value = serde_json::Value> {
    leaf().prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..3).prop_map(|all| json!({ "AND": all })),
            prop::collection::vec(inner.clone(), 1..3).prop_map(|any| json!({ "OR": any })),
            inner.prop_map(|negated| json!({ "NOT": negated })),
        ]
    })
}

fn titles_where(filter: &serde_json::Value) -> neoql_adapters::query::Operation {
    read(
        "Movie",
        ReadShape::List,
        &json!({ "where": filter }).to_string(),
        r#"{ "fields": [ { "name": "title" } ] }"#,
    )
}

proptest! {
    #[test]
    fn translation_is_deterministic(filter in filter()) {
        let compiler = compiler();
        let operation = titles_where(&filter);
        let auth = AuthContext::anonymous();
        let first = compiler.translate(&operation, &auth).unwrap();
        let second = compiler.translate(&operation, &auth).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn parameters_match_placeholders(filter in filter()) {
        let compiled = compiler().translate(&titles_where(&filter), &AuthContext::anonymous()).unwrap();
        let placeholder = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
        let referenced: HashSet<&str> = placeholder
            .captures_iter(&compiled.text)
            .filter_map(|captures| captures.get(1))
            .map(|name| name.as_str())
            .collect();
        let bound: HashSet<&str> = compiled.params.names().collect();
        prop_assert_eq!(referenced, bound);
    }

    #[test]
    fn quantifiers_agree_with_reference(
        born in prop::collection::vec(1900i64..2000, 5),
        cast in prop::collection::btree_set((0usize..5, 0usize..4), 0..12),
        threshold in 1900i64..2000,
    ) {
        let store = LpgStore::new();
        let movies: Vec<_> = (0..4).map(|i| movie(&store, &format!("m{i}"), 100)).collect();
        let actors: Vec<_> = born.iter().enumerate().map(|(i, b)| actor(&store, &format!("a{i}"), *b)).collect();
        for &(a, m) in &cast {
            store.create_edge_with_props(actors[a], movies[m], "ACTED_IN", [("role", "x")]).unwrap();
        }

        let older = |m: usize| -> Vec<bool> {
            cast.iter().filter(|(_, movie)| *movie == m).map(|(a, _)| born[*a] > threshold).collect()
        };
        let expected = |keep: &dyn Fn(&[bool]) -> bool| -> BTreeSet<String> {
            (0..4).filter(|m| keep(&older(*m))).map(|m| format!("m{m}")).collect()
        };

        let cases: [(&str, Box<dyn Fn(&[bool]) -> bool>); 4] = [
            ("actors_SOME", Box::new(|held: &[bool]| held.iter().any(|h| *h))),
            ("actors_NONE", Box::new(|held: &[bool]| !held.iter().any(|h| *h))),
            ("actors_ALL", Box::new(|held: &[bool]| held.iter().all(|h| *h))),
            ("actors_SINGLE", Box::new(|held: &[bool]| held.iter().filter(|h| **h).count() == 1)),
        ];
        for (key, keep) in &cases {
            let operation = titles_where(&json!({ (*key): { "born_GT": threshold } }));
            let result = run(&store, &operation, &AuthContext::anonymous()).unwrap();
            let titles: BTreeSet<String> = column(&result)
                .iter()
                .filter_map(|row| get(row, "title").as_str().map(str::to_string))
                .collect();
            prop_assert_eq!(titles, expected(keep.as_ref()), "quantifier {}", key);
        }
    }

    #[test]
    fn cursors_resume_after_their_position(n in 1u64..12, k in 0u64..12) {
        prop_assume!(k < n);
        let store = LpgStore::new();
        for i in (0..n).rev() {
            movie(&store, &format!("m{i}"), i64::try_from(i).unwrap());
        }
        let operation = read(
            "Movie",
            ReadShape::Connection,
            &json!({ "sort": [ { "node": { "runtime": "ASC" } } ], "after": Cursor::encode(k) }).to_string(),
            r#"{ "fields": [ { "name": "edges", "selection": { "fields": [
                { "name": "node", "selection": { "fields": [ { "name": "runtime" } ] } }
            ] } } ] }"#,
        );
        let result = run(&store, &operation, &AuthContext::anonymous()).unwrap();
        let page = column(&result);
        prop_assert_eq!(page.len(), 1);
        prop_assert_eq!(get(&page[0], "totalCount"), &Value::Int64(i64::try_from(n).unwrap()));
        let runtimes: Vec<i64> = get(&page[0], "edges")
            .as_list()
            .unwrap()
            .iter()
            .filter_map(|edge| get(get(edge, "node"), "runtime").as_i64())
            .collect();
        let expected: Vec<i64> = ((k + 1)..n).map(|i| i64::try_from(i).unwrap()).collect();
        prop_assert_eq!(runtimes, expected);
    }
}
