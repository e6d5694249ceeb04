//! Mutations: create, update, delete and the relationship operations.
//!
//! Every mutation but delete returns the written nodes in column `data`,
//! projected with the read machinery after the After-timing guards:
//!
//! ```text
//! MATCH (this0:Movie)
//! WHERE this0.title = $param0
//! SET this0.updatedAt = datetime(), this0.runtime = this0.runtime + $param1
//! RETURN this0 { .title, .runtime } AS data
//! ```
//!
//! Creates live in [`super::create`], relationship operations nested in an
//! input in [`super::nested`].

use super::auth;
use super::context::{ArgPath, Context, argument, expect_map, invalid_argument, unknown_field, unknown_type};
use super::create;
use super::nested::{self, NestedOp, Operation};
use super::plan::{
    ArithmeticOp, Clause, DeleteClause, Expr, NodePattern, Pattern, PatternDirection, ProjectionItem,
    RelPattern, ReturnClause, SetClause, SetItem, Statement, Var,
};
use super::predicate::{FilterMode, FilterTarget, PredicateCompiler, Subject, wrap_kind};
use super::projection::{check_type_conditions, project_node};
use super::read::{match_node, node_pattern, unsupported};
use indexmap::IndexMap;
use neoql_adapters::query::{Arguments, MutationKind, MutationRequest, SelectionSet};
use neoql_common::types::{AuthOperation, AuthTiming, Value};
use neoql_common::utils::error::Result;
use neoql_core::schema::{
    Attribute, NodeType, RelationshipDirection, RelationshipField, ScalarType, SchemaModel, TypeRef,
    ValueKind,
};

/// Column holding mutation results.
pub const MUTATION_COLUMN: &str = "data";

// === Input values ===

/// Where the values of one input object come from.
#[derive(Debug, Clone)]
pub(crate) enum Source<'v> {
    /// A request object; each value becomes a parameter.
    Params(&'v IndexMap<String, Value>),
    /// A row of an unwound batch. `shape` holds every key any row of the
    /// batch carries; values are read as `row.key`.
    Row {
        shape: &'v IndexMap<String, Value>,
        base: Var,
        row: Expr,
    },
}

impl<'v> Source<'v> {
    pub fn map(&self) -> &'v IndexMap<String, Value> {
        match self {
            Source::Params(map) | Source::Row { shape: map, .. } => map,
        }
    }

    pub fn is_batched(&self) -> bool {
        matches!(self, Source::Row { .. })
    }

    /// The value under `key`, as an expression.
    pub fn value(&self, ctx: &mut Context<'_>, key: &str) -> Expr {
        match self {
            Source::Params(map) => ctx.namer.param(map.get(key).cloned().unwrap_or_default()),
            Source::Row { row, .. } => row.clone().dot(key),
        }
    }

    /// The object under `key`, if any.
    pub fn child(&self, key: &str, path: &ArgPath) -> Result<Option<Source<'v>>> {
        let value = match self.map().get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(value) => expect_map(value, key, &path.child(key))?,
        };
        Ok(Some(match self {
            Source::Params(_) => Source::Params(value),
            Source::Row { base, row, .. } => Source::Row {
                shape: value,
                base: base.clone(),
                row: row.clone().dot(key),
            },
        }))
    }
}

/// Merges the objects of a batch into one object carrying every key any of
/// them carries. Nested lists merge into a one-element list.
pub(crate) fn merge_shape(values: &[&Value]) -> Value {
    let values: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();
    if values.iter().all(|v| matches!(v, Value::Map(_))) && !values.is_empty() {
        let mut keys: IndexMap<String, Vec<&Value>> = IndexMap::new();
        for value in &values {
            if let Value::Map(map) = value {
                for (key, item) in map {
                    keys.entry(key.clone()).or_default().push(item);
                }
            }
        }
        return Value::Map(
            keys.into_iter()
                .map(|(key, items)| (key, merge_shape(&items)))
                .collect(),
        );
    }
    if values.iter().all(|v| matches!(v, Value::List(_))) && !values.is_empty() {
        let items: Vec<&Value> = values.iter().filter_map(|v| v.as_list()).flatten().collect();
        let merged = merge_shape(&items);
        return Value::List(if merged.is_null() { Vec::new() } else { vec![merged] });
    }
    values.first().map(|v| (*v).clone()).unwrap_or_default()
}

// === Property writes ===

/// Which write an input is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Write {
    Create,
    Update,
}

/// `SET` items produced for one input object.
#[derive(Debug, Default)]
pub(crate) struct PropertyWrites<'a> {
    /// Ids and timestamps.
    pub generated: Vec<SetItem>,
    /// Values taken from the input.
    pub provided: Vec<SetItem>,
    /// Defaults of attributes the input leaves out.
    pub defaults: Vec<SetItem>,
    /// Attributes the input sets, for their field guards.
    pub attributes: Vec<&'a Attribute>,
}

impl PropertyWrites<'_> {
    /// Everything, in `SET` order.
    pub fn all(self) -> Vec<SetItem> {
        let mut items = self.generated;
        items.extend(self.provided);
        items.extend(self.defaults);
        items
    }

    /// What only a newly created entity receives.
    pub fn on_create(&mut self) -> Vec<SetItem> {
        let mut items = std::mem::take(&mut self.generated);
        items.append(&mut self.defaults);
        items
    }
}

const UPDATE_OPERATORS: [&str; 8] = [
    "INCREMENT", "DECREMENT", "ADD", "SUBTRACT", "MULTIPLY", "DIVIDE", "PUSH", "POP",
];

/// `runtime_INCREMENT` → (`runtime`, `INCREMENT`).
fn split_update_key<'k>(attributes: &IndexMap<String, Attribute>, key: &'k str) -> (&'k str, Option<&'static str>) {
    if attributes.contains_key(key) {
        return (key, None);
    }
    for op in UPDATE_OPERATORS {
        if let Some(name) = key.strip_suffix(op).and_then(|k| k.strip_suffix('_')) {
            return (name, Some(op));
        }
    }
    (key, None)
}

fn now(attr: &Attribute) -> Expr {
    let constructor = attr.kind.temporal().map_or("datetime", |t| t.constructor());
    Expr::function(constructor, Vec::new())
}

/// `this0.runtime + $param1`, `this0.tags[..size(this0.tags) - $param2]`...
fn update_operator(
    ctx: &mut Context<'_>,
    attr: &Attribute,
    op: &str,
    property: Expr,
    operand: Expr,
    operand_is_list: bool,
    key: &str,
    path: &ArgPath,
) -> Result<Expr> {
    let integer = matches!(attr.kind, ValueKind::Scalar(ScalarType::Int | ScalarType::BigInt));
    let float = attr.kind == ValueKind::Scalar(ScalarType::Float);
    let expr = match op {
        "INCREMENT" if integer && !attr.list => Expr::arithmetic(property, ArithmeticOp::Add, operand),
        "DECREMENT" if integer && !attr.list => Expr::arithmetic(property, ArithmeticOp::Sub, operand),
        "ADD" if float && !attr.list => Expr::arithmetic(property, ArithmeticOp::Add, operand),
        "SUBTRACT" if float && !attr.list => Expr::arithmetic(property, ArithmeticOp::Sub, operand),
        "MULTIPLY" if float && !attr.list => Expr::arithmetic(property, ArithmeticOp::Mul, operand),
        "DIVIDE" if float && !attr.list => Expr::arithmetic(property, ArithmeticOp::Div, operand),
        "PUSH" if attr.list => {
            let pushed = wrap_kind(ctx, attr, operand, operand_is_list);
            Expr::arithmetic(property, ArithmeticOp::Add, pushed)
        }
        "POP" if attr.list => Expr::Slice {
            list: Box::new(property.clone()),
            from: None,
            to: Some(Box::new(Expr::arithmetic(
                Expr::function("size", vec![property]),
                ArithmeticOp::Sub,
                operand,
            ))),
        },
        _ => {
            return Err(invalid_argument(
                key,
                format!("{op} does not apply to {} '{}'", attr.kind, attr.name),
                path,
            ));
        }
    };
    Ok(expr)
}

/// Builds the `SET` items writing `source` into the entity bound to `var`.
/// Keys naming relationship fields are left to the caller.
pub(crate) fn property_writes<'a>(
    ctx: &mut Context<'_>,
    type_name: &str,
    attributes: &'a IndexMap<String, Attribute>,
    relationships: Option<&IndexMap<String, RelationshipField>>,
    var: &Var,
    source: Option<&Source<'_>>,
    write: Write,
    path: &ArgPath,
) -> Result<PropertyWrites<'a>> {
    let mut writes = PropertyWrites::default();
    for attr in attributes.values() {
        let caps = &attr.capabilities;
        let value = match write {
            Write::Create if caps.autogenerate => Expr::function("randomUUID", Vec::new()),
            Write::Create if caps.timestamp_on_create => now(attr),
            Write::Update if caps.timestamp_on_update => now(attr),
            _ => continue,
        };
        writes.generated.push(SetItem::new(var, &attr.stored_name, value));
    }

    let input = source.map(Source::map);
    if let Some(source) = source {
        for (key, raw) in source.map() {
            if relationships.is_some_and(|rels| rels.contains_key(key)) {
                continue;
            }
            let key_path = path.child(key);
            let (name, op) = match write {
                Write::Create => (key.as_str(), None),
                Write::Update => split_update_key(attributes, key),
            };
            let attr = attributes
                .get(name)
                .ok_or_else(|| unknown_field(type_name, key, &key_path))?;
            let settable = match write {
                Write::Create => attr.capabilities.settable_on_create,
                Write::Update => attr.capabilities.settable_on_update,
            };
            if !settable || attr.is_computed() {
                return Err(invalid_argument(
                    key,
                    format!("'{}' cannot be set", attr.name),
                    &key_path,
                ));
            }
            let operand = source.value(ctx, key);
            let value = match op {
                Some(op) => update_operator(
                    ctx,
                    attr,
                    op,
                    Expr::property(var, &attr.stored_name),
                    operand,
                    matches!(raw, Value::List(_)),
                    key,
                    &key_path,
                )?,
                None => {
                    let value = wrap_kind(ctx, attr, operand, attr.list);
                    match (&attr.capabilities.default, write) {
                        (Some(default), Write::Create) if source.is_batched() => {
                            let fallback = ctx.namer.param(default.clone());
                            Expr::function("coalesce", vec![value, fallback])
                        }
                        _ => value,
                    }
                }
            };
            writes.provided.push(SetItem::new(var, &attr.stored_name, value));
            if !writes.attributes.iter().any(|a| std::ptr::eq(*a, attr)) {
                writes.attributes.push(attr);
            }
        }
    }

    if write == Write::Create {
        for attr in attributes.values() {
            let Some(default) = &attr.capabilities.default else {
                continue;
            };
            if input.is_some_and(|map| map.contains_key(&attr.name)) {
                continue;
            }
            let value = ctx.namer.param(default.clone());
            let value = wrap_kind(ctx, attr, value, attr.list);
            writes.defaults.push(SetItem::new(var, &attr.stored_name, value));
        }
    }
    Ok(writes)
}

pub(crate) fn set_clause(items: Vec<SetItem>) -> Option<Clause> {
    (!items.is_empty()).then(|| Clause::Set(SetClause { items }))
}

// === Patterns ===

/// `(parent)-[edge:TYPE]->(child)` for writes. Undirected relationships are
/// written outgoing from the field's owner.
pub(crate) fn write_pattern(parent: &Var, rel: &RelationshipField, edge: Option<&Var>, child: &Var) -> Pattern {
    let direction = match rel.direction {
        RelationshipDirection::Out | RelationshipDirection::Undirected => PatternDirection::Out,
        RelationshipDirection::In => PatternDirection::In,
    };
    Pattern::node(NodePattern::var(parent)).hop(
        RelPattern {
            var: edge.cloned(),
            rel_type: rel.rel_type.clone(),
            direction,
            properties: Vec::new(),
        },
        NodePattern::var(child),
    )
}

/// The node type a root mutation writes. Interfaces and unions have no
/// root mutations.
pub(crate) fn mutation_target<'a>(schema: &'a SchemaModel, request: &MutationRequest, path: &ArgPath) -> Result<&'a NodeType> {
    match schema.resolve(&request.target) {
        Some(TypeRef::Node(node)) => {
            let exposed = match request.kind {
                MutationKind::Create => node.exposure.create,
                MutationKind::Delete => node.exposure.delete,
                MutationKind::Update
                | MutationKind::Connect
                | MutationKind::Disconnect
                | MutationKind::ConnectOrCreate => node.exposure.update,
            };
            if exposed {
                Ok(node)
            } else {
                Err(unsupported(
                    &node.name,
                    request.kind.as_str(),
                    "the operation is not exposed for this type",
                ))
            }
        }
        Some(_) => Err(unsupported(
            &request.target,
            request.kind.as_str(),
            "mutations need a concrete node type",
        )),
        None => Err(unknown_type(&request.target, path)),
    }
}

/// Projection sub-calls and `RETURN var { .. } AS data`.
pub(crate) fn returning<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    var: &Var,
    selection: &SelectionSet,
    path: &ArgPath,
) -> Result<Vec<Clause>> {
    check_type_conditions(ctx.schema, selection, &node.name, path)?;
    let mut projection = project_node(ctx, node, var, selection, false, path)?;
    let mut clauses = projection.take_clauses();
    clauses.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
        projection.expr(var),
        &Var::new(MUTATION_COLUMN),
    ))));
    Ok(clauses)
}

fn root_match<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    args: &Arguments,
    var: &Var,
    operation: AuthOperation,
    path: &ArgPath,
) -> Result<Vec<Clause>> {
    let predicate = PredicateCompiler::new(FilterMode::Request).compile(
        ctx,
        argument(args, "where"),
        &Subject::new(var, FilterTarget::Node(node)),
        &path.child("where"),
    )?;
    match_node(ctx, node_pattern(None, node, var, None), predicate, node, var, operation)
}

// === Entry ===

/// Translates a root mutation.
pub fn translate_mutation<'a>(ctx: &mut Context<'a>, request: &MutationRequest) -> Result<Statement> {
    match request.kind {
        MutationKind::Create => create::translate_create(ctx, request),
        MutationKind::Delete => translate_delete(ctx, request),
        MutationKind::Update
        | MutationKind::Connect
        | MutationKind::Disconnect
        | MutationKind::ConnectOrCreate => translate_update(ctx, request),
    }
}

/// The argument a relationship-only mutation cannot do without.
fn required_argument(kind: MutationKind) -> Option<&'static str> {
    match kind {
        MutationKind::Connect => Some("connect"),
        MutationKind::Disconnect => Some("disconnect"),
        MutationKind::ConnectOrCreate => Some("connectOrCreate"),
        _ => None,
    }
}

fn translate_update<'a>(ctx: &mut Context<'a>, request: &MutationRequest) -> Result<Statement> {
    let path = ArgPath::root(format!("{}{}", request.kind.as_str(), request.target));
    let node = mutation_target(ctx.schema, request, &path)?;
    if let Some(name) = required_argument(request.kind) {
        if argument(&request.args, name).is_null() {
            return Err(invalid_argument(name, "argument is required", &path.child(name)));
        }
    }

    let var = ctx.namer.node();
    let mut clauses = root_match(ctx, node, &request.args, &var, AuthOperation::Update, &path)?;

    let update_path = path.child("update");
    let update = match argument(&request.args, "update") {
        Value::Null => None,
        value => Some(Source::Params(expect_map(value, "update", &update_path)?)),
    };
    let writes = property_writes(
        ctx,
        &node.name,
        &node.attributes,
        Some(&node.relationships),
        &var,
        update.as_ref(),
        Write::Update,
        &update_path,
    )?;
    let written = writes.attributes.clone();
    clauses.extend(auth::field_guards(
        ctx,
        node,
        &var,
        &written,
        AuthOperation::Update,
        AuthTiming::Before,
    )?);
    clauses.extend(set_clause(writes.all()));

    let mut operations: Vec<Operation<'a, '_>> = match &update {
        Some(source) => nested::from_input(ctx.schema, node, source.map(), &NestedOp::ALL, &update_path)?,
        None => Vec::new(),
    };
    for op in NestedOp::ROOT {
        let name = op.argument();
        let value = argument(&request.args, name);
        if !value.is_null() {
            operations.extend(nested::from_argument(ctx.schema, node, op, value, &path.child(name))?);
        }
    }
    clauses.extend(nested::emit(ctx, node, &var, operations)?);

    clauses.extend(auth::guards(
        ctx,
        node,
        &var,
        &written,
        AuthOperation::Update,
        AuthTiming::After,
    )?);
    clauses.extend(returning(ctx, node, &var, &request.selection, &path)?);
    Ok(Statement::new(clauses))
}

fn translate_delete<'a>(ctx: &mut Context<'a>, request: &MutationRequest) -> Result<Statement> {
    let path = ArgPath::root(format!("delete{}", request.target));
    let node = mutation_target(ctx.schema, request, &path)?;
    let var = ctx.namer.node();
    let mut clauses = root_match(ctx, node, &request.args, &var, AuthOperation::Delete, &path)?;
    let nested_deletes = argument(&request.args, "delete");
    if !nested_deletes.is_null() {
        let operations = nested::from_argument(ctx.schema, node, NestedOp::Delete, nested_deletes, &path.child("delete"))?;
        clauses.extend(nested::emit(ctx, node, &var, operations)?);
    }
    clauses.push(Clause::Delete(DeleteClause {
        detach: true,
        vars: vec![var],
    }));
    Ok(Statement::new(clauses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslatorConfig;
    use crate::query::fixtures::{args, render, schema, selection, value};
    use neoql_adapters::AuthContext;
    use neoql_common::Error;
    use neoql_common::utils::error::TranslationError;

    fn mutate_as(auth: &AuthContext, kind: MutationKind, target: &str, arguments: &str, fields: &str) -> Result<String> {
        let schema = schema();
        let config = TranslatorConfig::default();
        let mut ctx = Context::new(&schema, auth, &config);
        let request = MutationRequest {
            kind,
            target: target.to_string(),
            args: args(arguments),
            selection: selection(fields),
        };
        Ok(render(&translate_mutation(&mut ctx, &request)?))
    }

    fn mutate(kind: MutationKind, target: &str, arguments: &str, fields: &str) -> Result<String> {
        mutate_as(&AuthContext::anonymous(), kind, target, arguments, fields)
    }

    #[test]
    fn test_update_properties_and_operators() {
        let text = mutate(
            MutationKind::Update,
            "Movie",
            r#"{ "where": { "title": "Heat" },
                 "update": { "runtime_INCREMENT": 5, "rating_MULTIPLY": 1.5, "tags_POP": 1, "released": "1995-12-15T00:00:00Z" } }"#,
            r#"{ "fields": [ { "name": "title" } ] }"#,
        )
        .unwrap();
        let expected = "\
MATCH (this0:Movie)
WHERE this0.title = $param0
SET this0.updatedAt = datetime(), this0.runtime = this0.runtime + $param1, \
this0.rating = this0.rating * $param2, this0.tags = this0.tags[..size(this0.tags) - $param3], \
this0.released = datetime($param4)
RETURN this0 { .title } AS data";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_update_rejects_invalid_writes() {
        for update in [
            r#"{ "update": { "id": "x" } }"#,
            r#"{ "update": { "updatedAt": "2020-01-01T00:00:00Z" } }"#,
            r#"{ "update": { "actorCount": 3 } }"#,
            r#"{ "update": { "title_INCREMENT": 1 } }"#,
            r#"{ "update": { "runtime_ADD": 1 } }"#,
        ] {
            let err = mutate(MutationKind::Update, "Movie", update, r#"{ "fields": [] }"#).unwrap_err();
            assert!(
                matches!(err, Error::Translation(TranslationError::InvalidArgument { .. })),
                "{update}: {err}"
            );
        }
        let err = mutate(
            MutationKind::Update,
            "Movie",
            r#"{ "update": { "nope": 1 } }"#,
            r#"{ "fields": [] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Translation(TranslationError::UnknownField { .. })));
    }

    #[test]
    fn test_update_guards_surround_the_write() {
        let auth = AuthContext::anonymous().claim("sub", "u1");
        let text = mutate_as(
            &auth,
            MutationKind::Update,
            "Post",
            r#"{ "update": { "content": "edited" } }"#,
            r#"{ "fields": [ { "name": "content" } ] }"#,
        )
        .unwrap();
        let set = text.find("SET this0.content").unwrap();
        let guard = text.find("type=Post op=UPDATE when=AFTER").unwrap();
        let ret = text.find("RETURN").unwrap();
        assert!(set < guard && guard < ret, "{text}");
        assert!(text.starts_with("MATCH (this0:Post)\nWHERE $isAuthenticated = true"));
    }

    #[test]
    fn test_delete_cascades_bottom_up() {
        let text = mutate(
            MutationKind::Delete,
            "Actor",
            r#"{ "where": { "name": "Val" },
                 "delete": { "movies": [ { "where": { "node": { "title": "Heat" } },
                     "delete": { "genres": [ { "where": { "node": { "name": "Crime" } } } ] } } ] } }"#,
            r#"{ "fields": [] }"#,
        )
        .unwrap();
        let expected = "\
MATCH (this0:Actor)
WHERE this0.name = $param0
CALL {
    WITH this0
    MATCH (this0)-[edge2:ACTED_IN]->(this1:Movie)
    WHERE this1.title = $param1
    CALL {
        WITH this1
        MATCH (this1)-[:IN_GENRE]->(this3:Genre)
        WHERE this3.name = $param2
        DETACH DELETE this3
    }
    DETACH DELETE this1
}
DETACH DELETE this0";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_exposure_and_polymorphic_targets() {
        let err = mutate(MutationKind::Delete, "Post", "{}", r#"{ "fields": [] }"#).unwrap_err();
        match err {
            Error::Translation(TranslationError::UnsupportedOperation { type_name, operation, .. }) => {
                assert_eq!(type_name, "Post");
                assert_eq!(operation, "delete");
            }
            other => panic!("Expected UnsupportedOperation, got {other}"),
        }
        let err = mutate(MutationKind::Update, "Production", "{}", r#"{ "fields": [] }"#).unwrap_err();
        assert!(matches!(
            err,
            Error::Translation(TranslationError::UnsupportedOperation { .. })
        ));
        let err = mutate(MutationKind::Connect, "Movie", "{}", r#"{ "fields": [] }"#).unwrap_err();
        assert!(matches!(err, Error::Translation(TranslationError::InvalidArgument { .. })));
    }

    #[test]
    fn test_merge_shape() {
        let rows = value(
            r#"[ { "title": "A", "actors": { "create": [ { "node": { "name": "x" } } ] } },
                 { "runtime": 3, "actors": { "create": [ { "node": { "born": 1 }, "edge": { "role": "r" } } ] } } ]"#,
        );
        let rows: Vec<&Value> = rows.as_list().unwrap().iter().collect();
        let shape = merge_shape(&rows);
        let expected = value(
            r#"{ "title": "A", "actors": { "create": [ { "node": { "name": "x", "born": 1 }, "edge": { "role": "r" } } ] }, "runtime": 3 }"#,
        );
        assert_eq!(shape, expected);
    }
}
