//! Relationship operations nested in mutation inputs.
//!
//! Each item of an operation becomes one unit sub-call correlated on the
//! parent node, so items never see each other's rows:
//!
//! ```text
//! CALL {
//!     WITH this0
//!     MATCH (this1:Genre)
//!     WHERE this1.name = $param1
//!     MERGE (this0)-[:IN_GENRE]->(this1)
//! }
//! ```
//!
//! Relationship fields targeting an interface or union take member-keyed
//! inputs, `{ Movie: [...], Series: [...] }`, one operation per member.

use super::auth;
use super::context::{ArgPath, Context, argument, expect_map, invalid_argument, one_or_many, traverse, unknown_field};
use super::create::{self, Attach};
use super::mutation::{PropertyWrites, Source, Write, property_writes, set_clause, write_pattern};
use super::plan::{
    AggregateFunction, CallClause, Clause, DeleteClause, Expr, MergeClause, NodePattern, Pattern, ProjectionItem,
    ReturnClause, Var,
};
use super::predicate::{FilterMode, FilterTarget, PredicateCompiler, Subject, wrap_kind};
use super::read::match_node;
use indexmap::IndexMap;
use neoql_common::types::{AuthOperation, AuthTiming, Value};
use neoql_common::utils::error::Result;
use neoql_core::schema::{NodeType, PropertyType, RelationshipField, SchemaModel, TypeRef};

/// A relationship operation. Operations on one relationship field run in
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum NestedOp {
    Update,
    Connect,
    ConnectOrCreate,
    Disconnect,
    Create,
    Delete,
}

impl NestedOp {
    pub const ALL: [NestedOp; 6] = [
        NestedOp::Update,
        NestedOp::Connect,
        NestedOp::ConnectOrCreate,
        NestedOp::Disconnect,
        NestedOp::Create,
        NestedOp::Delete,
    ];

    /// What an update or a relationship mutation takes as root arguments.
    /// The root `update` argument is the node input itself.
    pub const ROOT: [NestedOp; 5] = [
        NestedOp::Connect,
        NestedOp::ConnectOrCreate,
        NestedOp::Disconnect,
        NestedOp::Create,
        NestedOp::Delete,
    ];

    /// What a nested create may contain.
    pub const CREATE: [NestedOp; 3] = [NestedOp::Connect, NestedOp::ConnectOrCreate, NestedOp::Create];

    /// The input key naming the operation.
    pub fn argument(self) -> &'static str {
        match self {
            NestedOp::Update => "update",
            NestedOp::Connect => "connect",
            NestedOp::ConnectOrCreate => "connectOrCreate",
            NestedOp::Disconnect => "disconnect",
            NestedOp::Create => "create",
            NestedOp::Delete => "delete",
        }
    }

    fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.argument() == key)
    }
}

/// One operation on one relationship field of a node, for one member of
/// the field's target.
#[derive(Debug, Clone)]
pub(crate) struct Operation<'a, 'v> {
    pub op: NestedOp,
    pub rel: &'a RelationshipField,
    /// Position of `rel` in its node type, for ordering.
    pub index: usize,
    pub member: &'a NodeType,
    pub items: Vec<&'v Value>,
    pub path: ArgPath,
}

/// The concrete types an input for `rel` is given for. Polymorphic targets
/// take one input per member name.
pub(crate) fn member_inputs<'a, 'v>(
    schema: &'a SchemaModel,
    rel: &RelationshipField,
    value: &'v Value,
    path: &ArgPath,
) -> Result<Vec<(&'a NodeType, &'v Value, ArgPath)>> {
    if let Some(TypeRef::Node(node)) = schema.resolve(&rel.target) {
        return Ok(vec![(node, value, path.clone())]);
    }
    let members = schema.members(&rel.target);
    let mut inputs = Vec::new();
    for (name, input) in expect_map(value, &rel.name, path)? {
        let member_path = path.child(name);
        let member = members
            .iter()
            .find(|m| m.name == *name)
            .ok_or_else(|| unknown_field(&rel.target, name, &member_path))?;
        if !input.is_null() {
            inputs.push((*member, input, member_path));
        }
    }
    Ok(inputs)
}

/// Reads the relationship keys of a node input: `{ actors: { create: [..] } }`,
/// one operation map or a list of them per field. Only `allowed` operations
/// may appear.
pub(crate) fn from_input<'a, 'v>(
    schema: &'a SchemaModel,
    node: &'a NodeType,
    input: &'v IndexMap<String, Value>,
    allowed: &[NestedOp],
    path: &ArgPath,
) -> Result<Vec<Operation<'a, 'v>>> {
    let mut operations = Vec::new();
    for (index, (name, rel)) in node.relationships.iter().enumerate() {
        let value = argument(input, name);
        if value.is_null() {
            continue;
        }
        for (member, value, member_path) in member_inputs(schema, rel, value, &path.child(name))? {
            let maps = one_or_many(value);
            let many = maps.len() > 1 || matches!(value, Value::List(_));
            for (i, map) in maps.into_iter().enumerate() {
                let map_path = if many { member_path.index(i) } else { member_path.clone() };
                for (key, items) in expect_map(map, name, &map_path)? {
                    let item_path = map_path.child(key);
                    let op = NestedOp::parse(key)
                        .ok_or_else(|| unknown_field(&member.name, key, &item_path))?;
                    if !allowed.contains(&op) {
                        return Err(invalid_argument(
                            key,
                            format!("'{key}' is not allowed here"),
                            &item_path,
                        ));
                    }
                    operations.push(Operation {
                        op,
                        rel,
                        index,
                        member,
                        items: one_or_many(items),
                        path: item_path,
                    });
                }
            }
        }
    }
    Ok(operations)
}

/// Reads an operation argument keyed by relationship field:
/// `connect: { actors: [..] }`.
pub(crate) fn from_argument<'a, 'v>(
    schema: &'a SchemaModel,
    node: &'a NodeType,
    op: NestedOp,
    value: &'v Value,
    path: &ArgPath,
) -> Result<Vec<Operation<'a, 'v>>> {
    let mut operations = Vec::new();
    for (name, items) in expect_map(value, op.argument(), path)? {
        let rel_path = path.child(name);
        let index = node
            .relationships
            .get_index_of(name)
            .ok_or_else(|| unknown_field(&node.name, name, &rel_path))?;
        let rel = &node.relationships[index];
        if items.is_null() {
            continue;
        }
        for (member, items, member_path) in member_inputs(schema, rel, items, &rel_path)? {
            operations.push(Operation {
                op,
                rel,
                index,
                member,
                items: one_or_many(items),
                path: member_path,
            });
        }
    }
    Ok(operations)
}

/// The properties type of `rel`, if it has one.
pub(crate) fn edge_type<'a>(schema: &'a SchemaModel, rel: &RelationshipField) -> Option<&'a PropertyType> {
    rel.properties.as_deref().and_then(|name| schema.property_type(name))
}

/// Emits `operations` on `parent` bound to `var`, ordered by relationship
/// field then by operation.
pub(crate) fn emit<'a>(
    ctx: &mut Context<'a>,
    parent: &'a NodeType,
    var: &Var,
    mut operations: Vec<Operation<'a, '_>>,
) -> Result<Vec<Clause>> {
    operations.sort_by_key(|operation| (operation.index, operation.op));
    let mut clauses = Vec::new();
    for operation in &operations {
        let many = operation.items.len() > 1;
        for (i, item) in operation.items.iter().enumerate() {
            let path = if many { operation.path.index(i) } else { operation.path.clone() };
            let item = expect_map(item, operation.op.argument(), &path)?;
            let scope = Scope {
                parent,
                var,
                rel: operation.rel,
                member: operation.member,
            };
            let body = match operation.op {
                NestedOp::Update => update(ctx, &scope, item, &path)?,
                NestedOp::Connect => connect(ctx, &scope, item, &path)?,
                NestedOp::ConnectOrCreate => connect_or_create(ctx, &scope, item, &path)?,
                NestedOp::Disconnect => disconnect(ctx, &scope, item, &path)?,
                NestedOp::Create => nested_create(ctx, &scope, item, &path)?,
                NestedOp::Delete => delete(ctx, &scope, item, &path)?,
            };
            clauses.push(unit_call(ctx, vec![var.clone()], body));
        }
    }
    Ok(clauses)
}

/// `CALL { WITH imports ... }` run for its writes. A sub-call cannot
/// conclude with `WITH`, so a body ending in a guard returns a count.
pub(crate) fn unit_call(ctx: &mut Context<'_>, imports: Vec<Var>, mut body: Vec<Clause>) -> Clause {
    if let (Some(Clause::Validate(_)), Some(first)) = (body.last(), imports.first()) {
        let count = Expr::aggregate(AggregateFunction::Count, Expr::var(first), false);
        body.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
            count,
            &ctx.namer.var(),
        ))));
    }
    Clause::Call(CallClause::new(imports, body))
}

/// The parent side of one operation item.
struct Scope<'s, 'a> {
    parent: &'a NodeType,
    var: &'s Var,
    rel: &'a RelationshipField,
    member: &'a NodeType,
}

impl<'a> Scope<'_, 'a> {
    fn edge_type(&self, ctx: &Context<'a>) -> Option<&'a PropertyType> {
        edge_type(ctx.schema, self.rel)
    }

    /// Rejects an `edge` input on a relationship without properties.
    fn edge_input<'v>(
        &self,
        ctx: &Context<'a>,
        item: &'v IndexMap<String, Value>,
        path: &ArgPath,
    ) -> Result<Option<&'v IndexMap<String, Value>>> {
        match argument(item, "edge") {
            Value::Null => Ok(None),
            value if self.edge_type(ctx).is_some() => Ok(Some(expect_map(value, "edge", &path.child("edge"))?)),
            _ => Err(unknown_field(&self.rel.name, "edge", &path.child("edge"))),
        }
    }

    /// `MATCH (parent)-[edge]-(child:Member) WHERE <where> AND <filter rules>`
    /// and the child's Before guard.
    fn match_related(
        &self,
        ctx: &mut Context<'a>,
        item: &IndexMap<String, Value>,
        child: &Var,
        edge: Option<&Var>,
        operation: AuthOperation,
        path: &ArgPath,
    ) -> Result<Vec<Clause>> {
        let node_subject = Subject::new(child, FilterTarget::Node(self.member));
        let edge_subject = match (edge, self.edge_type(ctx)) {
            (Some(edge), Some(props)) => Some(Subject::new(edge, FilterTarget::Edge(props))),
            _ => None,
        };
        let predicate = PredicateCompiler::new(FilterMode::Request).connection_where(
            ctx,
            argument(item, "where"),
            &node_subject,
            edge_subject.as_ref(),
            &path.child("where"),
        )?;
        let pattern = traverse(
            self.var,
            self.rel,
            edge,
            NodePattern::labeled(child, &self.member.labels),
        );
        match_node(ctx, pattern, predicate, self.member, child, operation)
    }

    fn parent_guard(&self, ctx: &mut Context<'a>, operation: AuthOperation, timing: AuthTiming) -> Result<Option<Clause>> {
        auth::type_guard(ctx, self.parent, self.var, operation, timing)
    }

    /// The edge variable, allocated only when the relationship has properties.
    fn edge_var(&self, ctx: &mut Context<'a>) -> Option<Var> {
        self.edge_type(ctx).is_some().then(|| ctx.namer.edge())
    }

    fn edge_writes(
        &self,
        ctx: &mut Context<'a>,
        edge: Option<&Var>,
        input: Option<&IndexMap<String, Value>>,
        write: Write,
        path: &ArgPath,
    ) -> Result<PropertyWrites<'a>> {
        match (edge, self.edge_type(ctx)) {
            (Some(edge), Some(props)) => {
                let source = input.map(Source::Params);
                property_writes(ctx, &props.name, &props.attributes, None, edge, source.as_ref(), write, &path.child("edge"))
            }
            _ => Ok(PropertyWrites::default()),
        }
    }
}

fn update<'a>(ctx: &mut Context<'a>, scope: &Scope<'_, 'a>, item: &IndexMap<String, Value>, path: &ArgPath) -> Result<Vec<Clause>> {
    let child = ctx.namer.node();
    let edge = scope.edge_var(ctx);
    let mut body = scope.match_related(ctx, item, &child, edge.as_ref(), AuthOperation::Update, path)?;

    let update_path = path.child("update");
    let input = match argument(item, "update") {
        Value::Null => None,
        value => Some(expect_map(value, "update", &update_path)?),
    };
    let node_input = match input.map(|input| argument(input, "node")) {
        None | Some(Value::Null) => None,
        Some(value) => Some(expect_map(value, "node", &update_path.child("node"))?),
    };
    let edge_input = match input {
        Some(input) => scope.edge_input(ctx, input, &update_path)?,
        None => None,
    };

    let source = node_input.map(Source::Params);
    let writes = property_writes(
        ctx,
        &scope.member.name,
        &scope.member.attributes,
        Some(&scope.member.relationships),
        &child,
        source.as_ref(),
        Write::Update,
        &update_path.child("node"),
    )?;
    let written = writes.attributes.clone();
    body.extend(auth::field_guards(ctx, scope.member, &child, &written, AuthOperation::Update, AuthTiming::Before)?);
    let mut items = writes.all();
    if edge_input.is_some() {
        items.extend(scope.edge_writes(ctx, edge.as_ref(), edge_input, Write::Update, &update_path)?.all());
    }
    body.extend(set_clause(items));

    if let Some(node_input) = node_input {
        let operations = from_input(ctx.schema, scope.member, node_input, &NestedOp::ALL, &update_path.child("node"))?;
        body.extend(emit(ctx, scope.member, &child, operations)?);
    }
    body.extend(auth::guards(ctx, scope.member, &child, &written, AuthOperation::Update, AuthTiming::After)?);
    Ok(body)
}

/// `MERGE (parent)-[edge:T]->(child)`, edge properties set on creation and
/// provided ones set on every connect.
fn merge_edge<'a>(
    ctx: &mut Context<'a>,
    scope: &Scope<'_, 'a>,
    child: &Var,
    edge_input: Option<&IndexMap<String, Value>>,
    path: &ArgPath,
) -> Result<Vec<Clause>> {
    let edge = scope.edge_var(ctx);
    let mut writes = scope.edge_writes(ctx, edge.as_ref(), edge_input, Write::Create, path)?;
    let on_create = writes.on_create();
    let mut clauses = vec![Clause::Merge(MergeClause {
        pattern: write_pattern(scope.var, scope.rel, edge.as_ref(), child),
        on_create,
        on_match: Vec::new(),
    })];
    clauses.extend(set_clause(writes.provided));
    Ok(clauses)
}

fn connect<'a>(ctx: &mut Context<'a>, scope: &Scope<'_, 'a>, item: &IndexMap<String, Value>, path: &ArgPath) -> Result<Vec<Clause>> {
    let operation = AuthOperation::CreateRelationship;
    let edge_input = scope.edge_input(ctx, item, path)?;
    let child = ctx.namer.node();
    let predicate = PredicateCompiler::new(FilterMode::Request).connection_where(
        ctx,
        argument(item, "where"),
        &Subject::new(&child, FilterTarget::Node(scope.member)),
        None,
        &path.child("where"),
    )?;
    let pattern = Pattern::node(NodePattern::labeled(&child, &scope.member.labels));
    let mut body = match_node(ctx, pattern, predicate, scope.member, &child, operation)?;
    body.extend(scope.parent_guard(ctx, operation, AuthTiming::Before)?);
    body.extend(merge_edge(ctx, scope, &child, edge_input, path)?);

    let nested = argument(item, "connect");
    if !nested.is_null() {
        let operations = from_argument(ctx.schema, scope.member, NestedOp::Connect, nested, &path.child("connect"))?;
        body.extend(emit(ctx, scope.member, &child, operations)?);
    }
    body.extend(scope.parent_guard(ctx, operation, AuthTiming::After)?);
    body.extend(auth::type_guard(ctx, scope.member, &child, operation, AuthTiming::After)?);
    Ok(body)
}

fn connect_or_create<'a>(
    ctx: &mut Context<'a>,
    scope: &Scope<'_, 'a>,
    item: &IndexMap<String, Value>,
    path: &ArgPath,
) -> Result<Vec<Clause>> {
    let operation = AuthOperation::CreateRelationship;
    let where_path = path.child("where");
    let key_path = where_path.child("node");
    let keys = match argument(item, "where") {
        Value::Null => return Err(invalid_argument("where", "a unique key is required", &where_path)),
        value => expect_map(argument(expect_map(value, "where", &where_path)?, "node"), "node", &key_path)?,
    };
    if keys.is_empty() {
        return Err(invalid_argument("node", "a unique key is required", &key_path));
    }
    let on_create_path = path.child("onCreate");
    let on_create = match argument(item, "onCreate") {
        Value::Null => None,
        value => Some(expect_map(value, "onCreate", &on_create_path)?),
    };
    let node_input = match on_create.map(|input| argument(input, "node")) {
        None | Some(Value::Null) => None,
        Some(value) => Some(expect_map(value, "node", &on_create_path.child("node"))?),
    };
    if let Some(node_input) = node_input {
        if let Some(rel) = node_input.keys().find(|k| scope.member.relationships.contains_key(*k)) {
            return Err(invalid_argument(
                rel,
                "relationships cannot be written by connectOrCreate",
                &on_create_path.child("node").child(rel),
            ));
        }
    }
    let edge_input = match on_create {
        Some(input) => scope.edge_input(ctx, input, &on_create_path)?,
        None => None,
    };

    let child = ctx.namer.node();
    let mut key_pattern = NodePattern::labeled(&child, &scope.member.labels);
    for (key, value) in keys {
        let attr = scope
            .member
            .attribute(key)
            .ok_or_else(|| unknown_field(&scope.member.name, key, &key_path.child(key)))?;
        if !attr.capabilities.unique {
            return Err(invalid_argument(
                key,
                format!("'{key}' is not a unique attribute of {}", scope.member.name),
                &key_path.child(key),
            ));
        }
        let param = ctx.namer.param(value.clone());
        key_pattern
            .properties
            .push((attr.stored_name.clone(), wrap_kind(ctx, attr, param, attr.list)));
    }

    let mut body: Vec<Clause> = scope.parent_guard(ctx, operation, AuthTiming::Before)?.into_iter().collect();
    let source = node_input.map(Source::Params);
    let writes = property_writes(
        ctx,
        &scope.member.name,
        &scope.member.attributes,
        None,
        &child,
        source.as_ref(),
        Write::Create,
        &on_create_path.child("node"),
    )?;
    body.push(Clause::Merge(MergeClause {
        pattern: Pattern::node(key_pattern),
        on_create: writes.all(),
        on_match: Vec::new(),
    }));

    let edge = scope.edge_var(ctx);
    let edge_writes = scope.edge_writes(ctx, edge.as_ref(), edge_input, Write::Create, &on_create_path)?;
    body.push(Clause::Merge(MergeClause {
        pattern: write_pattern(scope.var, scope.rel, edge.as_ref(), &child),
        on_create: edge_writes.all(),
        on_match: Vec::new(),
    }));
    body.extend(scope.parent_guard(ctx, operation, AuthTiming::After)?);
    body.extend(auth::type_guard(ctx, scope.member, &child, operation, AuthTiming::After)?);
    Ok(body)
}

fn disconnect<'a>(ctx: &mut Context<'a>, scope: &Scope<'_, 'a>, item: &IndexMap<String, Value>, path: &ArgPath) -> Result<Vec<Clause>> {
    let operation = AuthOperation::DeleteRelationship;
    let child = ctx.namer.node();
    let edge = ctx.namer.edge();
    let mut body = scope.match_related(ctx, item, &child, Some(&edge), operation, path)?;
    body.extend(scope.parent_guard(ctx, operation, AuthTiming::Before)?);
    let nested = argument(item, "disconnect");
    if !nested.is_null() {
        let operations = from_argument(ctx.schema, scope.member, NestedOp::Disconnect, nested, &path.child("disconnect"))?;
        body.extend(emit(ctx, scope.member, &child, operations)?);
    }
    body.push(Clause::Delete(DeleteClause {
        detach: false,
        vars: vec![edge],
    }));
    body.extend(scope.parent_guard(ctx, operation, AuthTiming::After)?);
    body.extend(auth::type_guard(ctx, scope.member, &child, operation, AuthTiming::After)?);
    Ok(body)
}

fn delete<'a>(ctx: &mut Context<'a>, scope: &Scope<'_, 'a>, item: &IndexMap<String, Value>, path: &ArgPath) -> Result<Vec<Clause>> {
    let child = ctx.namer.node();
    let edge = scope.edge_var(ctx);
    let mut body = scope.match_related(ctx, item, &child, edge.as_ref(), AuthOperation::Delete, path)?;
    let nested = argument(item, "delete");
    if !nested.is_null() {
        let operations = from_argument(ctx.schema, scope.member, NestedOp::Delete, nested, &path.child("delete"))?;
        body.extend(emit(ctx, scope.member, &child, operations)?);
    }
    body.push(Clause::Delete(DeleteClause {
        detach: true,
        vars: vec![child],
    }));
    Ok(body)
}

fn nested_create<'a>(
    ctx: &mut Context<'a>,
    scope: &Scope<'_, 'a>,
    item: &IndexMap<String, Value>,
    path: &ArgPath,
) -> Result<Vec<Clause>> {
    let node_path = path.child("node");
    let node_input = expect_map(argument(item, "node"), "node", &node_path)?;
    let edge_input = scope.edge_input(ctx, item, path)?;
    let child = ctx.namer.node();
    let attach = Attach {
        parent: scope.var,
        rel: scope.rel,
        edge: edge_input.map(Source::Params),
    };
    create::create_node(ctx, scope.member, &child, &Source::Params(node_input), Some(attach), &node_path)
}
