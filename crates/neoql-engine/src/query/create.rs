//! Creates.
//!
//! When every input only sets attributes and creates related nodes, the
//! inputs are written set-based from one list parameter:
//!
//! ```text
//! UNWIND $param0 AS var0
//! CREATE (this1:Movie)
//! SET this1.id = randomUUID(), this1.title = var0.title
//! WITH *
//! CALL {
//!     WITH this1, var0
//!     UNWIND var0.actors.create AS var2
//!     CREATE (this3:Actor)
//!     SET this3.name = var2.node.name
//!     MERGE (this1)<-[edge4:ACTED_IN]-(this3)
//! }
//! RETURN this1 { .title } AS data
//! ```
//!
//! Inputs that connect existing nodes are created one union branch each.

use super::auth;
use super::context::{ArgPath, Context, argument, expect_map, invalid_argument, one_or_many, unknown_field};
use super::mutation::{Source, Write, merge_shape, mutation_target, property_writes, returning, set_clause, write_pattern};
use super::nested::{self, NestedOp};
use super::plan::{
    CallClause, Clause, CreateClause, Expr, MergeClause, NodePattern, Pattern, ProjectionItem, ReturnClause,
    Statement, UnwindClause, Var,
};
use neoql_adapters::query::MutationRequest;
use neoql_common::types::{AuthOperation, AuthTiming, Value};
use neoql_common::utils::error::Result;
use neoql_core::schema::{NodeType, RelationshipField, SchemaModel, TypeRef};

/// The edge linking a created node to its parent.
pub(crate) struct Attach<'p, 'v> {
    pub parent: &'p Var,
    pub rel: &'p RelationshipField,
    pub edge: Option<Source<'v>>,
}

/// `CREATE (var:Labels)`, its properties, the edge to the parent, nested
/// operations and the After-timing CREATE guards.
pub(crate) fn create_node<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    var: &Var,
    source: &Source<'_>,
    attach: Option<Attach<'_, '_>>,
    path: &ArgPath,
) -> Result<Vec<Clause>> {
    let mut clauses = vec![Clause::Create(CreateClause {
        pattern: Pattern::node(NodePattern::labeled(var, &node.labels)),
    })];
    let writes = property_writes(
        ctx,
        &node.name,
        &node.attributes,
        Some(&node.relationships),
        var,
        Some(source),
        Write::Create,
        path,
    )?;
    let written = writes.attributes.clone();
    clauses.extend(set_clause(writes.all()));
    if let Some(attach) = attach {
        clauses.extend(attach_edge(ctx, &attach, var, path)?);
    }
    match source {
        Source::Params(input) => {
            let operations = nested::from_input(ctx.schema, node, input, &NestedOp::CREATE, path)?;
            clauses.extend(nested::emit(ctx, node, var, operations)?);
        }
        Source::Row { .. } => clauses.extend(row_creates(ctx, node, var, source, path)?),
    }
    clauses.extend(auth::guards(ctx, node, var, &written, AuthOperation::Create, AuthTiming::After)?);
    Ok(clauses)
}

fn attach_edge<'a>(ctx: &mut Context<'a>, attach: &Attach<'_, '_>, child: &Var, path: &ArgPath) -> Result<Vec<Clause>> {
    let props = nested::edge_type(ctx.schema, attach.rel);
    if props.is_none() && attach.edge.is_some() {
        return Err(unknown_field(&attach.rel.name, "edge", &path.child("edge")));
    }
    let edge = props.map(|_| ctx.namer.edge());
    let mut clauses = vec![Clause::Merge(MergeClause {
        pattern: write_pattern(attach.parent, attach.rel, edge.as_ref(), child),
        on_create: Vec::new(),
        on_match: Vec::new(),
    })];
    if let (Some(edge), Some(props)) = (&edge, props) {
        let writes = property_writes(
            ctx,
            &props.name,
            &props.attributes,
            None,
            edge,
            attach.edge.as_ref(),
            Write::Create,
            &path.child("edge"),
        )?;
        clauses.extend(set_clause(writes.all()));
    }
    Ok(clauses)
}

/// Nested creates of a batch row: one sub-call per relationship field and
/// member, unwinding the row's `create` list.
fn row_creates<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    var: &Var,
    source: &Source<'_>,
    path: &ArgPath,
) -> Result<Vec<Clause>> {
    let Source::Row { shape, base, row } = source else {
        return Ok(Vec::new());
    };
    let mut clauses = Vec::new();
    for (name, rel) in &node.relationships {
        let value = argument(shape, name);
        if value.is_null() {
            continue;
        }
        let polymorphic = !matches!(ctx.schema.resolve(&rel.target), Some(TypeRef::Node(_)));
        for (member, ops, member_path) in nested::member_inputs(ctx.schema, rel, value, &path.child(name))? {
            let mut list = row.clone().dot(name.as_str());
            if polymorphic {
                list = list.dot(member.name.as_str());
            }
            let create_path = member_path.child("create");
            let ops = expect_map(ops, name, &member_path)?;
            let Some(item_shape) = argument(ops, "create").as_list().and_then(|items| items.first()) else {
                continue;
            };
            let item_shape = expect_map(item_shape, "create", &create_path)?;

            let item = ctx.namer.var();
            let child = ctx.namer.node();
            let item_source = Source::Row {
                shape: item_shape,
                base: item.clone(),
                row: Expr::var(&item),
            };
            let node_path = create_path.child("node");
            let node_source = item_source
                .child("node", &create_path)?
                .ok_or_else(|| invalid_argument("node", "a node input is required", &node_path))?;
            let attach = Attach {
                parent: var,
                rel,
                edge: item_source.child("edge", &create_path)?,
            };
            let mut body = vec![Clause::Unwind(UnwindClause {
                expr: list.dot("create"),
                var: item,
            })];
            body.extend(create_node(ctx, member, &child, &node_source, Some(attach), &node_path)?);
            clauses.push(nested::unit_call(ctx, vec![var.clone(), base.clone()], body));
        }
    }
    Ok(clauses)
}

/// Returns true if `input` only sets attributes and creates related nodes,
/// all the way down.
fn batchable(schema: &SchemaModel, node: &NodeType, input: &Value) -> bool {
    let Some(map) = input.as_map() else {
        return false;
    };
    map.iter().all(|(key, value)| {
        let Some(rel) = node.relationships.get(key) else {
            return true;
        };
        if value.is_null() {
            return true;
        }
        let targets: Option<Vec<(&NodeType, &Value)>> = match schema.resolve(&rel.target) {
            Some(TypeRef::Node(target)) => Some(vec![(target, value)]),
            _ => value.as_map().and_then(|by_member| {
                let members = schema.members(&rel.target);
                by_member
                    .iter()
                    .map(|(name, ops)| members.iter().find(|m| m.name == *name).map(|m| (*m, ops)))
                    .collect()
            }),
        };
        targets.is_some_and(|targets| {
            targets.into_iter().all(|(target, ops)| {
                ops.as_map().is_some_and(|ops| {
                    ops.iter().all(|(op, items)| {
                        op == "create"
                            && items
                                .as_list()
                                .is_some_and(|items| items.iter().all(|item| batchable_item(schema, target, item)))
                    })
                })
            })
        })
    })
}

fn batchable_item(schema: &SchemaModel, target: &NodeType, item: &Value) -> bool {
    item.as_map().is_some_and(|item| {
        item.keys().all(|key| key == "node" || key == "edge")
            && item.get("node").is_some_and(|node| batchable(schema, target, node))
            && item.get("edge").is_none_or(|edge| edge.is_null() || edge.as_map().is_some())
    })
}

/// Translates a root create.
pub(crate) fn translate_create<'a>(ctx: &mut Context<'a>, request: &MutationRequest) -> Result<Statement> {
    let path = ArgPath::root(format!("create{}", request.target));
    let node = mutation_target(ctx.schema, request, &path)?;
    let input_path = path.child("input");
    let inputs = one_or_many(argument(&request.args, "input"));
    if inputs.is_empty() {
        return Err(invalid_argument("input", "at least one input is required", &input_path));
    }

    let mut clauses = Vec::new();
    let var = if inputs.iter().all(|input| batchable(ctx.schema, node, input)) {
        let row = ctx.namer.var();
        let rows = ctx.namer.param(Value::List(inputs.iter().map(|v| (*v).clone()).collect()));
        let shape = merge_shape(&inputs);
        let shape = expect_map(&shape, "input", &input_path)?;
        clauses.push(Clause::Unwind(UnwindClause {
            expr: rows,
            var: row.clone(),
        }));
        let var = ctx.namer.node();
        let source = Source::Row {
            shape,
            base: row.clone(),
            row: Expr::var(&row),
        };
        clauses.extend(create_node(ctx, node, &var, &source, None, &input_path)?);
        var
    } else {
        let result = ctx.namer.var();
        let mut branches = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            let item_path = input_path.index(i);
            let input = expect_map(input, "input", &item_path)?;
            let child = ctx.namer.node();
            let mut branch = create_node(ctx, node, &child, &Source::Params(input), None, &item_path)?;
            branch.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                Expr::var(&child),
                &result,
            ))));
            branches.push(branch);
        }
        clauses.push(Clause::Call(CallClause::union(Vec::new(), branches)));
        result
    };
    clauses.extend(returning(ctx, node, &var, &request.selection, &path)?);
    Ok(Statement::new(clauses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslatorConfig;
    use crate::query::fixtures::{args, render, schema, selection};
    use neoql_adapters::AuthContext;
    use neoql_adapters::query::MutationKind;
    use neoql_common::Error;
    use neoql_common::utils::error::TranslationError;

    fn create(target: &str, input: &str) -> Result<String> {
        let schema = schema();
        let auth = AuthContext::anonymous();
        let config = TranslatorConfig::default();
        let mut ctx = Context::new(&schema, &auth, &config);
        let request = MutationRequest {
            kind: MutationKind::Create,
            target: target.to_string(),
            args: args(&format!(r#"{{ "input": {input} }}"#)),
            selection: selection(r#"{ "fields": [ { "name": "title" } ] }"#),
        };
        Ok(render(&translate_create(&mut ctx, &request)?))
    }

    #[test]
    fn test_batched_create_applies_generated_values() {
        let text = create(
            "Movie",
            r#"[ { "title": "Heat", "runtime": 170 }, { "title": "Ronin", "views": 5 } ]"#,
        )
        .unwrap();
        let expected = "\
UNWIND $param0 AS var0
CREATE (this1:Movie)
SET this1.id = randomUUID(), this1.createdAt = datetime(), this1.title = var0.title, \
this1.runtime = var0.runtime, this1.views = coalesce(var0.views, $param1)
RETURN this1 { .title } AS data";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_batched_nested_create() {
        let text = create(
            "Movie",
            r#"[ { "title": "Heat",
                   "actors": { "create": [ { "node": { "name": "Al" }, "edge": { "role": "Vincent" } } ] } } ]"#,
        )
        .unwrap();
        let expected = "\
UNWIND $param0 AS var0
CREATE (this1:Movie)
SET this1.id = randomUUID(), this1.createdAt = datetime(), this1.title = var0.title, this1.views = $param1
WITH *
CALL {
    WITH this1, var0
    UNWIND var0.actors.create AS var2
    CREATE (this3:Actor)
    SET this3.name = var2.node.name
    MERGE (this1)<-[edge4:ACTED_IN]-(this3)
    SET edge4.role = var2.edge.role
}
RETURN this1 { .title } AS data";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_connect_falls_back_to_one_branch_per_input() {
        let text = create(
            "Movie",
            r#"{ "title": "Heat", "genres": { "connect": [ { "where": { "node": { "name": "Crime" } } } ] } }"#,
        )
        .unwrap();
        let expected = "\
CALL {
    CREATE (this1:Movie)
    SET this1.id = randomUUID(), this1.createdAt = datetime(), this1.title = $param0, this1.views = $param1
    WITH *
    CALL {
        WITH this1
        MATCH (this2:Genre)
        WHERE this2.name = $param2
        MERGE (this1)-[:IN_GENRE]->(this2)
    }
    RETURN this1 AS var0
}
RETURN var0 { .title } AS data";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_after_guard_follows_creation() {
        let schema = schema();
        let auth = AuthContext::anonymous().claim("sub", "u1");
        let config = TranslatorConfig::default();
        let mut ctx = Context::new(&schema, &auth, &config);
        let request = MutationRequest {
            kind: MutationKind::Create,
            target: "Post".to_string(),
            args: args(r#"{ "input": [ { "content": "hi", "authorId": "u1" } ] }"#),
            selection: selection(r#"{ "fields": [ { "name": "content" } ] }"#),
        };
        let text = render(&translate_create(&mut ctx, &request).unwrap());
        let set = text.find("SET this1.id = randomUUID()").unwrap();
        let guard = text.find("type=Post op=CREATE when=AFTER").unwrap();
        let ret = text.find("RETURN this1").unwrap();
        assert!(set < guard && guard < ret, "{text}");
        assert!(!text.contains("when=BEFORE"));
    }

    #[test]
    fn test_create_errors() {
        let err = create("Movie", r#"[ { "id": "x" } ]"#).unwrap_err();
        assert!(matches!(err, Error::Translation(TranslationError::InvalidArgument { .. })));

        let err = create("Movie", r#"[ { "nope": 1 } ]"#).unwrap_err();
        match err {
            Error::Translation(TranslationError::UnknownField { type_name, field, path }) => {
                assert_eq!(type_name, "Movie");
                assert_eq!(field, "nope");
                assert_eq!(path, "createMovie.input.nope");
            }
            other => panic!("Expected UnknownField, got {other}"),
        }

        let err = create("Movie", "[]").unwrap_err();
        assert!(matches!(err, Error::Translation(TranslationError::InvalidArgument { .. })));

        let err = create("Production", r#"[ { "title": "x" } ]"#).unwrap_err();
        assert!(matches!(
            err,
            Error::Translation(TranslationError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_batchable() {
        let schema = schema();
        let movie = schema.node("Movie").unwrap();
        let value = |json: &str| crate::query::fixtures::value(json);
        assert!(batchable(&schema, movie, &value(r#"{ "title": "x" }"#)));
        assert!(batchable(
            &schema,
            movie,
            &value(r#"{ "actors": { "create": [ { "node": { "name": "a" } } ] } }"#)
        ));
        assert!(!batchable(
            &schema,
            movie,
            &value(r#"{ "actors": { "connect": [ { "where": { "node": { "name": "a" } } } ] } }"#)
        ));
        assert!(!batchable(
            &schema,
            movie,
            &value(r#"{ "actors": { "create": { "node": { "name": "a" } } } }"#)
        ));
    }
}
