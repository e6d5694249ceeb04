//! Aggregate reads: `count` and per-attribute statistics.
//!
//! Aggregates match rows exactly as list reads do (request filter, filter
//! rules and guards for `READ`), then fold them in one `RETURN`:
//!
//! ```text
//! MATCH (this0:Movie)
//! RETURN { count: count(this0), runtime: { max: max(this0.runtime) } } AS this
//! ```
//!
//! A `<rel>Aggregate` field folds the related rows inside a correlated
//! sub-call and may aggregate the relationship properties under `edge`.

use super::auth;
use super::context::{ArgPath, Context, argument, invalid_argument, traverse, unknown_field, unknown_type};
use super::plan::{
    AggregateFunction, CallClause, Clause, CompareOp, Expr, MatchClause, NodePattern, Pattern,
    ProjectionItem, ReturnClause, Statement, ValidateClause, Var,
};
use super::predicate::{FilterMode, FilterTarget, PredicateCompiler, Subject};
use super::read::{READ_COLUMN, Target, check_exposed, match_node, node_pattern, unsupported};
use neoql_adapters::query::{Field, ReadRequest, SelectionSet};
use neoql_common::types::{AuthOperation, AuthTiming};
use neoql_common::utils::error::{AuthorizationError, Result};
use neoql_core::schema::{Attribute, AuthPhase, NodeType, PropertyType, RelationshipField};

fn fold(function: AggregateFunction, value: Expr) -> Expr {
    Expr::aggregate(function, value, false)
}

/// `reduce(acc = head(collect(x)), v IN collect(x) | CASE WHEN size(v) < size(acc) THEN v ELSE acc END)`
fn extreme_length(ctx: &mut Context<'_>, value: Expr, op: CompareOp) -> Expr {
    let acc = ctx.namer.var();
    let current = ctx.namer.var();
    let size = |var: &Var| Expr::function("size", vec![Expr::var(var)]);
    Expr::Reduce {
        init: Box::new(Expr::function("head", vec![Expr::collect(value.clone())])),
        list: Box::new(Expr::collect(value)),
        expr: Box::new(Expr::Case {
            whens: vec![(Expr::compare(size(&current), op, size(&acc)), Expr::var(&current))],
            otherwise: Some(Box::new(Expr::var(&acc))),
        }),
        acc,
        var: current,
    }
}

/// `{ min: .., max: .. }` for one attribute of the rows bound to `var`.
fn attribute_aggregate(
    ctx: &mut Context<'_>,
    var: &Var,
    attr: &Attribute,
    selection: &SelectionSet,
    path: &ArgPath,
) -> Result<Expr> {
    if attr.list || attr.is_computed() {
        return Err(invalid_argument(
            &attr.name,
            format!("'{}' cannot be aggregated", attr.name),
            path,
        ));
    }
    let value = Expr::property(var, &attr.stored_name);
    let numeric = attr.kind.is_numeric();
    let temporal = attr.kind.temporal().is_some() && attr.kind.is_ordered();
    let textual = attr.kind.is_textual();

    let mut entries = Vec::with_capacity(selection.fields.len());
    for field in &selection.fields {
        let expr = match field.name.as_str() {
            "min" | "max" if numeric || temporal => {
                let function = if field.name == "min" {
                    AggregateFunction::Min
                } else {
                    AggregateFunction::Max
                };
                let folded = fold(function, value.clone());
                if temporal {
                    Expr::function("toString", vec![folded])
                } else {
                    folded
                }
            }
            "sum" if numeric => fold(AggregateFunction::Sum, value.clone()),
            "average" if numeric => fold(AggregateFunction::Avg, value.clone()),
            "shortest" if textual => extreme_length(ctx, value.clone(), CompareOp::Lt),
            "longest" if textual => extreme_length(ctx, value.clone(), CompareOp::Gt),
            "__typename" => continue,
            other => {
                return Err(invalid_argument(
                    &attr.name,
                    format!("{} values do not support '{other}'", attr.kind),
                    &path.child(field.response_key()),
                ));
            }
        };
        entries.push((field.response_key().to_string(), expr));
    }
    Ok(Expr::Map(entries))
}

/// Aggregates the attributes named in `selection`. Returns the map and the
/// attributes it reads, for their field guards.
fn attributes_map<'a>(
    ctx: &mut Context<'_>,
    var: &Var,
    type_name: &str,
    lookup: impl Fn(&str) -> Option<&'a Attribute>,
    selection: &SelectionSet,
    path: &ArgPath,
) -> Result<(Expr, Vec<&'a Attribute>)> {
    let mut entries = Vec::with_capacity(selection.fields.len());
    let mut read = Vec::new();
    for field in &selection.fields {
        if field.name == "__typename" {
            continue;
        }
        let field_path = path.child(field.response_key());
        let attr = lookup(&field.name).ok_or_else(|| unknown_field(type_name, &field.name, &field_path))?;
        let value = attribute_aggregate(ctx, var, attr, &field.selection, &field_path)?;
        entries.push((field.response_key().to_string(), value));
        read.push(attr);
    }
    Ok((Expr::Map(entries), read))
}

/// Matches the rows of a polymorphic target: no label on the pattern, each
/// member admitted by its label and its own filter rules, and each member's
/// validate rules applied to its rows only.
fn polymorphic_match<'a>(
    ctx: &mut Context<'a>,
    target: Target<'a>,
    pattern: Pattern,
    predicate: Expr,
    var: &Var,
) -> Result<Vec<Clause>> {
    let schema = ctx.schema;
    let members = schema.members(target.name());
    let mut allowed = Vec::with_capacity(members.len());
    let mut guards = Vec::new();
    for member in members {
        let label = Expr::HasLabels {
            var: var.clone(),
            labels: member.labels.clone(),
        };
        let rules = auth::filter(ctx, member, var, AuthOperation::Read)?;
        allowed.push(Expr::and(std::iter::once(label.clone()).chain(rules)));

        let subject = Subject::new(var, FilterTarget::Node(member));
        if let Some(rule) = auth::rules_predicate(
            ctx,
            &member.auth,
            &subject,
            AuthPhase::Validate,
            AuthOperation::Read,
            AuthTiming::Before,
        )? {
            guards.push(Clause::Validate(ValidateClause {
                predicate: Expr::or([Expr::not(label), rule]),
                tag: AuthorizationError::new(&member.name, AuthOperation::Read, AuthTiming::Before).to_tag(),
            }));
        }
    }
    let predicate = Expr::and([predicate, Expr::or(allowed)]);
    let mut clauses = vec![Clause::Match(MatchClause::new(pattern, predicate.into_predicate()))];
    clauses.extend(guards);
    Ok(clauses)
}

fn check_aggregatable(target: Target<'_>) -> Result<()> {
    check_exposed(target, "read", |node| node.exposure.read)?;
    check_exposed(target, "aggregate", |node| node.exposure.aggregate)
}

fn node_filter<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    field: &Field,
    var: &Var,
    path: &ArgPath,
) -> Result<Expr> {
    PredicateCompiler::new(FilterMode::Request).compile(
        ctx,
        argument(&field.args, "where"),
        &Subject::new(var, FilterTarget::Node(node)),
        &path.child("where"),
    )
}

/// Translates a root aggregate read; the result is one row in column
/// `this`.
pub fn translate_aggregate<'a>(ctx: &mut Context<'a>, request: &ReadRequest) -> Result<Statement> {
    let path = ArgPath::root(format!("{}Aggregate", request.target));
    let target = Target::resolve(ctx.schema, &request.target, &path)?;
    let Target::Node(node) = target else {
        return Err(unsupported(
            target.name(),
            "aggregate",
            "root aggregations need a concrete node type",
        ));
    };
    check_aggregatable(target)?;

    let var = ctx.namer.node();
    let predicate = PredicateCompiler::new(FilterMode::Request).compile(
        ctx,
        argument(&request.args, "where"),
        &Subject::new(&var, FilterTarget::Node(node)),
        &path.child("where"),
    )?;
    let mut clauses = match_node(
        ctx,
        node_pattern(None, node, &var, None),
        predicate,
        node,
        &var,
        AuthOperation::Read,
    )?;

    let mut entries = Vec::with_capacity(request.selection.fields.len());
    let mut read = Vec::new();
    for field in &request.selection.fields {
        let key = field.response_key();
        let field_path = path.child(key);
        let value = match field.name.as_str() {
            "count" => fold(AggregateFunction::Count, Expr::var(&var)),
            "__typename" => continue,
            name => {
                let attr = node
                    .attribute(name)
                    .ok_or_else(|| unknown_field(&node.name, name, &field_path))?;
                read.push(attr);
                attribute_aggregate(ctx, &var, attr, &field.selection, &field_path)?
            }
        };
        entries.push((key.to_string(), value));
    }
    clauses.extend(auth::field_guards(
        ctx,
        node,
        &var,
        &read,
        AuthOperation::Read,
        AuthTiming::Before,
    )?);
    clauses.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
        Expr::Map(entries),
        &Var::new(READ_COLUMN),
    ))));
    Ok(Statement::new(clauses))
}

/// A `<rel>Aggregate` field as a correlated sub-call on `parent`. Returns
/// the call and the column holding the aggregate map.
pub(crate) fn relationship_aggregate<'a>(
    ctx: &mut Context<'a>,
    parent: &Var,
    rel: &'a RelationshipField,
    field: &Field,
    path: &ArgPath,
) -> Result<(Clause, Var)> {
    let schema = ctx.schema;
    let target = Target::resolve(schema, &rel.target, path)?;
    check_aggregatable(target)?;
    let type_name = format!("{}Aggregate", rel.name);
    let properties: Option<&'a PropertyType> = match rel.properties.as_deref() {
        Some(name) => Some(schema.property_type(name).ok_or_else(|| unknown_type(name, path))?),
        None => None,
    };
    let edge_field = field.selection.field("edge");
    if edge_field.is_some() && properties.is_none() {
        return Err(unknown_field(&type_name, "edge", &path.child("edge")));
    }

    let result = ctx.namer.var();
    let child = ctx.namer.node();
    let edge = edge_field.map(|_| ctx.namer.edge());

    let mut body = match target {
        Target::Node(node) => {
            let predicate = node_filter(ctx, node, field, &child, path)?;
            match_node(
                ctx,
                node_pattern(Some((parent, rel)), node, &child, edge.as_ref()),
                predicate,
                node,
                &child,
                AuthOperation::Read,
            )?
        }
        Target::Interface(iface) => {
            let predicate = PredicateCompiler::new(FilterMode::Request).compile(
                ctx,
                argument(&field.args, "where"),
                &Subject::new(&child, FilterTarget::Interface(iface)),
                &path.child("where"),
            )?;
            let pattern = traverse(parent, rel, edge.as_ref(), NodePattern::var(&child));
            polymorphic_match(ctx, target, pattern, predicate, &child)?
        }
        Target::Union(union) => {
            if !argument(&field.args, "where").is_null() {
                return Err(invalid_argument(
                    "where",
                    format!("aggregations over union '{}' cannot be filtered", union.name),
                    &path.child("where"),
                ));
            }
            let pattern = traverse(parent, rel, edge.as_ref(), NodePattern::var(&child));
            polymorphic_match(ctx, target, pattern, Expr::bool(true), &child)?
        }
    };

    let mut entries = Vec::with_capacity(field.selection.fields.len());
    for selected in &field.selection.fields {
        let key = selected.response_key();
        let field_path = path.child(key);
        let value = match selected.name.as_str() {
            "count" => fold(AggregateFunction::Count, Expr::var(&child)),
            "__typename" => continue,
            "node" => {
                let (map, read) = attributes_map(
                    ctx,
                    &child,
                    target.name(),
                    |name| target.attribute(name),
                    &selected.selection,
                    &field_path,
                )?;
                if let Target::Node(node) = target {
                    body.extend(auth::field_guards(
                        ctx,
                        node,
                        &child,
                        &read,
                        AuthOperation::Read,
                        AuthTiming::Before,
                    )?);
                }
                map
            }
            "edge" => match (properties, edge.as_ref()) {
                (Some(properties), Some(edge)) => {
                    attributes_map(
                        ctx,
                        edge,
                        &properties.name,
                        |name| properties.attribute(name),
                        &selected.selection,
                        &field_path,
                    )?
                    .0
                }
                _ => return Err(unknown_field(&type_name, "edge", &field_path)),
            },
            other => return Err(unknown_field(&type_name, other, &field_path)),
        };
        entries.push((key.to_string(), value));
    }
    body.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
        Expr::Map(entries),
        &result,
    ))));
    Ok((Clause::Call(CallClause::new(vec![parent.clone()], body)), result))
}
