//! Selection sets to map projections.
//!
//! A node selection becomes `this0 { .title, actors: var3 }`. Attributes are
//! projected in place; relationship, connection, aggregate and computed
//! fields each become a sub-call whose result column is referenced from the
//! projection. The sub-calls and any field-level read guards are returned
//! alongside the entries for the caller to place before the projection.

use super::auth;
use super::context::{ArgPath, Context, unknown_field};
use super::plan::{CallClause, Clause, Expr, MapEntry, ProjectionItem, RawClause, ReturnClause, Var, WithClause};
use super::{aggregate, connection, read};
use neoql_adapters::query::{Field, SelectionSet};
use neoql_common::types::{AuthOperation, AuthTiming};
use neoql_common::utils::error::{Result, TranslationError};
use neoql_core::schema::{Attribute, NodeType, PropertyType, SchemaModel};

/// Key under which polymorphic results carry their concrete type name.
pub const RESOLVE_TYPE: &str = "__resolveType";

/// The projection of one bound node.
#[derive(Debug, Default)]
pub(crate) struct Projection {
    /// Field-level read guards.
    pub guards: Vec<Clause>,
    /// Sub-calls computing nested fields.
    pub calls: Vec<Clause>,
    /// Map projection entries, in selection order.
    pub entries: Vec<MapEntry>,
}

impl Projection {
    /// The clauses that must run before the projection expression.
    pub fn take_clauses(&mut self) -> Vec<Clause> {
        let mut clauses = std::mem::take(&mut self.guards);
        clauses.append(&mut self.calls);
        clauses
    }

    /// `var { entries }`.
    pub fn expr(self, var: &Var) -> Expr {
        Expr::MapProjection {
            var: var.clone(),
            entries: self.entries,
        }
    }

    /// Returns true if some entry is keyed `key`.
    pub fn has_key(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry_key(entry) == key)
    }

    /// Appends `key: expr` unless the key is already projected.
    pub fn ensure(&mut self, key: &str, expr: Expr) {
        if !self.has_key(key) {
            self.entries.push(MapEntry::Keyed(key.to_string(), expr));
        }
    }
}

fn entry_key(entry: &MapEntry) -> &str {
    match entry {
        MapEntry::Shorthand(property) => property,
        MapEntry::Keyed(key, _) => key,
    }
}

/// The fields that apply to `node`: the common fields, then those under
/// type conditions naming the node or one of its interfaces. The first
/// field wins when two share a response key.
pub(crate) fn fields_for<'s>(selection: &'s SelectionSet, node: &NodeType) -> Vec<&'s Field> {
    let conditional = selection
        .type_conditions
        .iter()
        .filter(|cond| cond.type_name == node.name || node.implements(&cond.type_name))
        .flat_map(|cond| cond.fields.iter());
    let mut out: Vec<&Field> = Vec::new();
    for field in selection.fields.iter().chain(conditional) {
        if !out.iter().any(|f| f.response_key() == field.response_key()) {
            out.push(field);
        }
    }
    out
}

/// Rejects type conditions naming a type that can never be the concrete
/// type of a `field_type` value.
pub(crate) fn check_type_conditions(
    schema: &SchemaModel,
    selection: &SelectionSet,
    field_type: &str,
    path: &ArgPath,
) -> Result<()> {
    let members = schema.members(field_type);
    for cond in &selection.type_conditions {
        let name = cond.type_name.as_str();
        let possible = name == field_type
            || members
                .iter()
                .any(|m| m.name == name || m.implements(name));
        if !possible {
            return Err(TranslationError::AmbiguousTypeCondition {
                field_type: field_type.to_string(),
                type_condition: name.to_string(),
                path: path.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Projects `selection` over `node` bound to `var`. With `resolve_type` the
/// concrete type name is added under [`RESOLVE_TYPE`].
///
/// Type conditions are checked by the caller against the declared type of
/// the field, which may be an interface or union `node` belongs to.
pub(crate) fn project_node<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    var: &Var,
    selection: &SelectionSet,
    resolve_type: bool,
    path: &ArgPath,
) -> Result<Projection> {
    let mut projection = Projection::default();
    let mut guarded: Vec<&'a Attribute> = Vec::new();

    for field in fields_for(selection, node) {
        let key = field.response_key();
        let field_path = path.child(key);
        if field.name == "__typename" {
            projection
                .entries
                .push(MapEntry::Keyed(key.to_string(), Expr::string(&node.name)));
            continue;
        }
        if let Some(attr) = node.attribute(&field.name) {
            if !guarded.iter().any(|a| a.name == attr.name) {
                guarded.push(attr);
            }
            let entry = if let Some(computed) = computed_call(ctx, var, attr) {
                let (call, column) = computed;
                projection.calls.push(call);
                MapEntry::Keyed(key.to_string(), Expr::var(&column))
            } else {
                attribute_entry(ctx, var, attr, key)
            };
            projection.entries.push(entry);
            continue;
        }
        if let Some(rel) = node.relationship(&field.name) {
            let (call, column) = read::relationship_call(ctx, var, rel, field, &field_path)?;
            projection.calls.push(call);
            projection
                .entries
                .push(MapEntry::Keyed(key.to_string(), Expr::var(&column)));
            continue;
        }
        if let Some(rel) = field
            .name
            .strip_suffix("Connection")
            .and_then(|name| node.relationship(name))
        {
            let (call, column) = connection::relationship_connection(ctx, var, rel, field, &field_path)?;
            projection.calls.push(call);
            projection
                .entries
                .push(MapEntry::Keyed(key.to_string(), Expr::var(&column)));
            continue;
        }
        if let Some(rel) = field
            .name
            .strip_suffix("Aggregate")
            .and_then(|name| node.relationship(name))
        {
            let (call, column) = aggregate::relationship_aggregate(ctx, var, rel, field, &field_path)?;
            projection.calls.push(call);
            projection
                .entries
                .push(MapEntry::Keyed(key.to_string(), Expr::var(&column)));
            continue;
        }
        return Err(unknown_field(&node.name, &field.name, &field_path));
    }

    if resolve_type || ctx.config.resolve_concrete_types {
        projection.ensure(RESOLVE_TYPE, Expr::string(&node.name));
    }
    projection.guards = auth::field_guards(
        ctx,
        node,
        var,
        &guarded,
        AuthOperation::Read,
        AuthTiming::Before,
    )?;
    Ok(projection)
}

/// Projects the attributes of relationship properties bound to `var`.
pub(crate) fn project_edge(
    ctx: &mut Context<'_>,
    properties: &PropertyType,
    var: &Var,
    selection: &SelectionSet,
    path: &ArgPath,
) -> Result<Vec<MapEntry>> {
    let mut entries = Vec::with_capacity(selection.fields.len());
    for field in &selection.fields {
        let key = field.response_key();
        if field.name == "__typename" {
            entries.push(MapEntry::Keyed(key.to_string(), Expr::string(&properties.name)));
            continue;
        }
        let attr = properties
            .attribute(&field.name)
            .ok_or_else(|| unknown_field(&properties.name, &field.name, &path.child(key)))?;
        entries.push(attribute_entry(ctx, var, attr, key));
    }
    Ok(entries)
}

/// The projected value of a stored attribute. Temporals come back as
/// strings, points as `{ point, crs }`.
pub(crate) fn attribute_value(ctx: &mut Context<'_>, var: &Var, attr: &Attribute) -> Expr {
    let stored = Expr::property(var, &attr.stored_name);
    if !attr.kind.is_spatial() && attr.kind.temporal().is_none() {
        return stored;
    }
    if attr.list {
        let item = ctx.namer.var();
        let map = convert(Expr::var(&item), attr);
        return Expr::ListComprehension {
            var: item,
            list: Box::new(stored),
            filter: None,
            map: Some(Box::new(map)),
        };
    }
    convert(stored, attr)
}

fn convert(value: Expr, attr: &Attribute) -> Expr {
    if attr.kind.is_spatial() {
        Expr::Case {
            whens: vec![(
                value.clone().is_not_null(),
                Expr::Map(vec![
                    ("point".to_string(), value.clone()),
                    ("crs".to_string(), value.dot("crs")),
                ]),
            )],
            otherwise: None,
        }
    } else {
        Expr::function("toString", vec![value])
    }
}

fn attribute_entry(ctx: &mut Context<'_>, var: &Var, attr: &Attribute, key: &str) -> MapEntry {
    let plain = !attr.kind.is_spatial() && attr.kind.temporal().is_none();
    if plain && key == attr.name && attr.stored_name == attr.name {
        MapEntry::Shorthand(attr.name.clone())
    } else {
        MapEntry::Keyed(key.to_string(), attribute_value(ctx, var, attr))
    }
}

/// `CALL { WITH var CALL { WITH var WITH var AS this <statement> } RETURN head(collect(column)) AS varN }`
fn computed_call(ctx: &mut Context<'_>, var: &Var, attr: &Attribute) -> Option<(Clause, Var)> {
    let computed = attr.computed.as_ref()?;
    let column = Var::new(computed.column_name.as_str());
    let result = ctx.namer.var();
    let this = Var::new("this");

    let inner = CallClause::new(
        vec![var.clone()],
        vec![
            Clause::With(WithClause::items(vec![ProjectionItem::aliased(Expr::var(var), &this)])),
            Clause::Raw(RawClause {
                text: computed.statement.clone(),
                binds: vec![column.clone()],
            }),
        ],
    );
    let collected = Expr::collect(Expr::var(&column));
    let value = if attr.list {
        collected
    } else {
        Expr::function("head", vec![collected])
    };
    let outer = CallClause::new(
        vec![var.clone()],
        vec![
            Clause::Call(inner),
            Clause::Return(ReturnClause::single(ProjectionItem::aliased(value, &result))),
        ],
    );
    Some((Clause::Call(outer), result))
}
