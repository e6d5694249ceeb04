//! List reads.
//!
//! A root list read matches the target, filters it, sorts and slices it,
//! then projects each row:
//!
//! ```text
//! MATCH (this0:Movie)
//! WHERE this0.title = $param0
//! WITH *
//! ORDER BY this0.title ASC
//! LIMIT $param1
//! CALL { WITH this0 ... RETURN collect(...) AS var2 }
//! RETURN this0 { .title, actors: var2 } AS this
//! ```
//!
//! Interface and union targets read one branch per concrete member inside a
//! union sub-call and sort the combined rows afterwards.

use super::auth;
use super::context::{
    ArgPath, Context, argument, expect_map, invalid_argument, one_or_many, traverse, unknown_field,
    unknown_type,
};
use super::plan::{
    CallClause, Clause, Expr, MatchClause, NodePattern, Pattern, ProjectionItem, ReturnClause,
    SortItem, Statement, Var, WithClause,
};
use super::predicate::{FilterMode, FilterTarget, PredicateCompiler, Subject};
use super::projection::{Projection, check_type_conditions, project_node};
use neoql_adapters::query::{Arguments, Field, ReadRequest, SelectionSet};
use neoql_common::types::{AuthOperation, Value};
use neoql_common::utils::error::{Error, Result, TranslationError};
use neoql_core::schema::catalogue::QueryLimit;
use neoql_core::schema::{
    Attribute, InterfaceType, NodeType, RelationshipField, SchemaModel, TypeRef, UnionType,
};
use tracing::warn;

/// Column holding read results.
pub const READ_COLUMN: &str = "this";

/// The type a read or relationship field returns.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    Node(&'a NodeType),
    Interface(&'a InterfaceType),
    Union(&'a UnionType),
}

impl<'a> Target<'a> {
    pub fn resolve(schema: &'a SchemaModel, name: &str, path: &ArgPath) -> Result<Self> {
        match schema.resolve(name) {
            Some(TypeRef::Node(node)) => Ok(Target::Node(node)),
            Some(TypeRef::Interface(iface)) => Ok(Target::Interface(iface)),
            Some(TypeRef::Union(union)) => Ok(Target::Union(union)),
            None => Err(unknown_type(name, path)),
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            Target::Node(node) => &node.name,
            Target::Interface(iface) => &iface.name,
            Target::Union(union) => &union.name,
        }
    }

    /// An attribute every concrete row carries.
    pub fn attribute(&self, name: &str) -> Option<&'a Attribute> {
        match self {
            Target::Node(node) => node.attribute(name),
            Target::Interface(iface) => iface.attribute(name),
            Target::Union(_) => None,
        }
    }

    /// Pairs each member read with its filter. Union filters are keyed by
    /// member and only the listed members are read; interface filters apply
    /// to every member.
    pub fn members_with_filter<'v>(
        &self,
        schema: &'a SchemaModel,
        filter: &'v Value,
        path: &ArgPath,
    ) -> Result<Vec<(&'a NodeType, &'v Value)>> {
        let members = schema.members(self.name());
        let keyed = match (self, filter) {
            (Target::Union(_), Value::Map(map)) if !map.is_empty() => map,
            _ => return Ok(members.into_iter().map(|m| (m, filter)).collect()),
        };
        let mut out = Vec::with_capacity(keyed.len());
        for (member, filter) in keyed {
            let node = members
                .iter()
                .find(|m| &m.name == member)
                .ok_or_else(|| unknown_field(self.name(), member, &path.child(member)))?;
            out.push((*node, filter));
        }
        Ok(out)
    }
}

pub(crate) fn unsupported(type_name: &str, operation: &str, reason: &str) -> Error {
    TranslationError::UnsupportedOperation {
        type_name: type_name.to_string(),
        operation: operation.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

// === List options ===

/// One requested sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SortKey {
    pub field: String,
    pub descending: bool,
    pub path: ArgPath,
}

/// `options: { sort, limit, offset }`, or the same keys as top-level
/// arguments.
#[derive(Debug, Clone, Default)]
pub(crate) struct ListOptions {
    pub sort: Vec<SortKey>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ListOptions {
    pub fn parse(args: &Arguments, path: &ArgPath) -> Result<Self> {
        let (source, path) = match args.get("options") {
            None | Some(Value::Null) => (args, path.clone()),
            Some(options) => {
                let path = path.child("options");
                (expect_map(options, "options", &path)?, path)
            }
        };
        Ok(Self {
            sort: parse_sort(argument(source, "sort"), &path.child("sort"))?,
            limit: non_negative(source, "limit", &path)?,
            offset: non_negative(source, "offset", &path)?,
        })
    }
}

/// `[{ title: ASC }, { runtime: DESC }]` in caller order. A single map is
/// accepted in place of the list.
pub(crate) fn parse_sort(value: &Value, path: &ArgPath) -> Result<Vec<SortKey>> {
    let mut keys = Vec::new();
    for (i, item) in one_or_many(value).into_iter().enumerate() {
        let item_path = path.index(i);
        for (field, direction) in expect_map(item, "sort", &item_path)? {
            let key_path = item_path.child(field);
            keys.push(SortKey {
                field: field.clone(),
                descending: parse_direction(direction, &key_path)?,
                path: key_path,
            });
        }
    }
    Ok(keys)
}

pub(crate) fn parse_direction(value: &Value, path: &ArgPath) -> Result<bool> {
    match value.as_str() {
        Some("ASC") => Ok(false),
        Some("DESC") => Ok(true),
        _ => Err(invalid_argument("sort", "expected ASC or DESC", path)),
    }
}

pub(crate) fn non_negative(args: &Arguments, name: &str, path: &ArgPath) -> Result<Option<u64>> {
    match argument(args, name) {
        Value::Null => Ok(None),
        value => value
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                invalid_argument(name, "expected a non-negative integer", &path.child(name))
            }),
    }
}

/// The limit a read runs with: the requested one, else the type default,
/// else (for root reads) the configured default, capped by the type maximum.
pub(crate) fn effective_limit(
    ctx: &Context<'_>,
    requested: Option<u64>,
    limits: Option<QueryLimit>,
    root: bool,
    type_name: &str,
) -> Option<u64> {
    let configured = if root { ctx.config.default_limit } else { None };
    let limit = requested
        .or_else(|| limits.and_then(|l| l.default))
        .or(configured);
    match (limit, limits.and_then(|l| l.max)) {
        (Some(limit), Some(max)) if limit > max => {
            warn!(type_name, requested = limit, max, "limit capped by the type maximum");
            Some(max)
        }
        (None, Some(max)) => Some(max),
        (limit, _) => limit,
    }
}

/// Validates sort keys against `target` and maps each to an `ORDER BY` key.
pub(crate) fn sort_items<'a>(
    target: Target<'a>,
    keys: &[SortKey],
    mut expr: impl FnMut(&'a Attribute) -> Expr,
) -> Result<Vec<SortItem>> {
    let mut items = Vec::with_capacity(keys.len());
    for key in keys {
        let attr = sort_attribute(target, key)?;
        items.push(SortItem {
            expr: expr(attr),
            descending: key.descending,
        });
    }
    Ok(items)
}

pub(crate) fn sort_attribute<'a>(target: Target<'a>, key: &SortKey) -> Result<&'a Attribute> {
    if let Target::Union(union) = target {
        return Err(invalid_argument(
            "sort",
            format!("union '{}' has no common attributes to sort by", union.name),
            &key.path,
        ));
    }
    let attr = target
        .attribute(&key.field)
        .ok_or_else(|| unknown_field(target.name(), &key.field, &key.path))?;
    if !attr.capabilities.sortable || attr.is_computed() {
        return Err(invalid_argument(
            "sort",
            format!("'{}' is not sortable", attr.name),
            &key.path,
        ));
    }
    Ok(attr)
}

/// Sorting and slicing of one read.
#[derive(Debug, Default)]
pub(crate) struct Page {
    pub order_by: Vec<SortItem>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
}

impl Page {
    pub fn new(ctx: &mut Context<'_>, order_by: Vec<SortItem>, offset: Option<u64>, limit: Option<u64>) -> Self {
        let mut param = |n: u64| ctx.namer.param(Value::Int64(i64::try_from(n).unwrap_or(i64::MAX)));
        Self {
            order_by,
            skip: offset.map(&mut param),
            limit: limit.map(&mut param),
        }
    }

    /// `WITH * ORDER BY .. SKIP .. LIMIT ..`, or `WITH items ...` when items
    /// are given. Nothing when there is nothing to do.
    pub fn clause(self, items: Vec<ProjectionItem>) -> Option<Clause> {
        if self.order_by.is_empty() && self.skip.is_none() && self.limit.is_none() {
            return None;
        }
        Some(Clause::With(WithClause {
            star: items.is_empty(),
            items,
            order_by: self.order_by,
            skip: self.skip,
            limit: self.limit,
            ..WithClause::default()
        }))
    }
}

// === Matching ===

/// `MATCH pattern WHERE predicate AND <filter rules>` followed by the
/// type-level validate guard for `operation`.
pub(crate) fn match_node<'a>(
    ctx: &mut Context<'a>,
    pattern: Pattern,
    predicate: Expr,
    node: &'a NodeType,
    var: &Var,
    operation: AuthOperation,
) -> Result<Vec<Clause>> {
    let filter = auth::filter(ctx, node, var, operation)?;
    let predicate = Expr::and(std::iter::once(predicate).chain(filter));
    let mut clauses = vec![Clause::Match(MatchClause::new(pattern, predicate.into_predicate()))];
    clauses.extend(auth::type_guard(
        ctx,
        node,
        var,
        operation,
        neoql_common::types::AuthTiming::Before,
    )?);
    Ok(clauses)
}

/// `(parent)-[:T]->(var:Label)`, or a root `(var:Label)`.
pub(crate) fn node_pattern(parent: Option<(&Var, &RelationshipField)>, node: &NodeType, var: &Var, edge: Option<&Var>) -> Pattern {
    let child = NodePattern::labeled(var, &node.labels);
    match parent {
        Some((parent, rel)) => traverse(parent, rel, edge, child),
        None => Pattern::node(child),
    }
}

/// One member read of a polymorphic target.
pub(crate) struct Branch {
    pub var: Var,
    pub edge: Option<Var>,
    pub clauses: Vec<Clause>,
    pub projection: Projection,
}

/// Builds the member reads of a polymorphic target: match, filter, guards
/// and projection sub-calls. `predicate` compiles each member's filter.
pub(crate) fn member_branches<'a, F>(
    ctx: &mut Context<'a>,
    members: Vec<(&'a NodeType, &Value)>,
    parent: Option<(&Var, &RelationshipField)>,
    with_edge: bool,
    selection: &SelectionSet,
    mut predicate: F,
    path: &ArgPath,
) -> Result<Vec<Branch>>
where
    F: FnMut(&mut Context<'a>, &'a NodeType, &Value, &Var, Option<&Var>) -> Result<Expr>,
{
    let mut branches = Vec::with_capacity(members.len());
    for (node, filter) in members {
        let var = ctx.namer.node();
        let edge = with_edge.then(|| ctx.namer.edge());
        let condition = predicate(ctx, node, filter, &var, edge.as_ref())?;
        let pattern = node_pattern(parent, node, &var, edge.as_ref());
        let mut clauses = match_node(ctx, pattern, condition, node, &var, AuthOperation::Read)?;
        let mut projection = project_node(ctx, node, &var, selection, true, path)?;
        clauses.extend(projection.take_clauses());
        branches.push(Branch {
            var,
            edge,
            clauses,
            projection,
        });
    }
    Ok(branches)
}

fn where_path(path: &ArgPath, target: Target<'_>, node: &NodeType) -> ArgPath {
    match target {
        Target::Union(_) => path.child("where").child(&node.name),
        _ => path.child("where"),
    }
}

fn request_filter<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    filter: &Value,
    var: &Var,
    path: &ArgPath,
) -> Result<Expr> {
    PredicateCompiler::new(FilterMode::Request).compile(
        ctx,
        filter,
        &Subject::new(var, FilterTarget::Node(node)),
        path,
    )
}

/// Reads of a polymorphic target, one union branch per member, each
/// returning its projection as `item`. Sort keys are added to every
/// projection so the combined rows can be ordered.
fn polymorphic_reads<'a>(
    ctx: &mut Context<'a>,
    target: Target<'a>,
    parent: Option<(&Var, &RelationshipField)>,
    args: &Arguments,
    selection: &SelectionSet,
    sort: &[SortKey],
    item: &Var,
    path: &ArgPath,
) -> Result<Vec<Vec<Clause>>> {
    let filter = argument(args, "where");
    let members = target.members_with_filter(ctx.schema, filter, &path.child("where"))?;
    let sorted = sort
        .iter()
        .map(|key| sort_attribute(target, key))
        .collect::<Result<Vec<_>>>()?;
    let branches = member_branches(
        ctx,
        members,
        parent,
        false,
        selection,
        |ctx, node, filter, var, _| request_filter(ctx, node, filter, var, &where_path(path, target, node)),
        path,
    )?;
    Ok(branches
        .into_iter()
        .map(|mut branch| {
            for attr in &sorted {
                branch
                    .projection
                    .ensure(&attr.name, Expr::property(&branch.var, &attr.stored_name));
            }
            let mut clauses = branch.clauses;
            clauses.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                branch.projection.expr(&branch.var),
                item,
            ))));
            clauses
        })
        .collect())
}

// === Root reads ===

/// Translates a root list read.
pub fn translate_read<'a>(ctx: &mut Context<'a>, request: &ReadRequest) -> Result<Statement> {
    let path = ArgPath::root(&request.target);
    let target = Target::resolve(ctx.schema, &request.target, &path)?;
    check_exposed(target, "read", |node| node.exposure.read)?;
    check_type_conditions(ctx.schema, &request.selection, target.name(), &path)?;
    let options = ListOptions::parse(&request.args, &path)?;
    let this = Var::new(READ_COLUMN);

    let clauses = match target {
        Target::Node(node) => {
            let var = ctx.namer.node();
            let predicate = request_filter(
                ctx,
                node,
                argument(&request.args, "where"),
                &var,
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
            let order_by = sort_items(target, &options.sort, |attr| {
                Expr::property(&var, &attr.stored_name)
            })?;
            let limit = effective_limit(ctx, options.limit, node.limit, true, &node.name);
            clauses.extend(Page::new(ctx, order_by, options.offset, limit).clause(Vec::new()));
            let mut projection = project_node(ctx, node, &var, &request.selection, false, &path)?;
            clauses.extend(projection.take_clauses());
            clauses.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                projection.expr(&var),
                &this,
            ))));
            clauses
        }
        _ => {
            let branches = polymorphic_reads(
                ctx,
                target,
                None,
                &request.args,
                &request.selection,
                &options.sort,
                &this,
                &path,
            )?;
            let mut clauses = vec![Clause::Call(CallClause::union(Vec::new(), branches))];
            let order_by = sort_items(target, &options.sort, |attr| {
                Expr::property(&this, &attr.name)
            })?;
            let limit = effective_limit(ctx, options.limit, None, true, target.name());
            clauses.extend(
                Page::new(ctx, order_by, options.offset, limit).clause(vec![ProjectionItem::var(&this)]),
            );
            clauses.push(Clause::Return(ReturnClause::single(ProjectionItem::var(&this))));
            clauses
        }
    };
    Ok(Statement::new(clauses))
}

/// Fails when a node target does not expose `operation`.
pub(crate) fn check_exposed(
    target: Target<'_>,
    operation: &str,
    exposed: impl Fn(&NodeType) -> bool,
) -> Result<()> {
    match target {
        Target::Node(node) if !exposed(node) => Err(unsupported(
            &node.name,
            operation,
            "the operation is not exposed for this type",
        )),
        _ => Ok(()),
    }
}

// === Nested reads ===

fn collected(rel: &RelationshipField, value: Expr) -> Expr {
    let collected = Expr::collect(value);
    if rel.list {
        collected
    } else {
        Expr::function("head", vec![collected])
    }
}

/// A relationship field read as a correlated sub-call on `parent`. Returns
/// the call and the column holding the collected projections.
pub(crate) fn relationship_call<'a>(
    ctx: &mut Context<'a>,
    parent: &Var,
    rel: &'a RelationshipField,
    field: &Field,
    path: &ArgPath,
) -> Result<(Clause, Var)> {
    check_type_conditions(ctx.schema, &field.selection, &rel.target, path)?;
    let target = Target::resolve(ctx.schema, &rel.target, path)?;
    let options = ListOptions::parse(&field.args, path)?;
    let result = ctx.namer.var();

    let body = match target {
        Target::Node(node) => {
            let child = ctx.namer.node();
            let predicate = request_filter(
                ctx,
                node,
                argument(&field.args, "where"),
                &child,
                &path.child("where"),
            )?;
            let mut body = match_node(
                ctx,
                node_pattern(Some((parent, rel)), node, &child, None),
                predicate,
                node,
                &child,
                AuthOperation::Read,
            )?;
            let order_by = sort_items(target, &options.sort, |attr| {
                Expr::property(&child, &attr.stored_name)
            })?;
            let limit = effective_limit(ctx, options.limit, node.limit, false, &node.name);
            body.extend(Page::new(ctx, order_by, options.offset, limit).clause(Vec::new()));
            let mut projection = project_node(ctx, node, &child, &field.selection, false, path)?;
            body.extend(projection.take_clauses());
            body.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                collected(rel, projection.expr(&child)),
                &result,
            ))));
            body
        }
        _ => {
            let item = ctx.namer.var();
            let branches = polymorphic_reads(
                ctx,
                target,
                Some((parent, rel)),
                &field.args,
                &field.selection,
                &options.sort,
                &item,
                path,
            )?;
            let mut body = vec![Clause::Call(CallClause::union(vec![parent.clone()], branches))];
            let order_by = sort_items(target, &options.sort, |attr| {
                Expr::property(&item, &attr.name)
            })?;
            body.extend(
                Page::new(ctx, order_by, options.offset, options.limit)
                    .clause(vec![ProjectionItem::var(&item)]),
            );
            body.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                collected(rel, Expr::var(&item)),
                &result,
            ))));
            body
        }
    };
    Ok((Clause::Call(CallClause::new(vec![parent.clone()], body)), result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslatorConfig;
    use crate::query::fixtures::{args, render, schema, selection};
    use neoql_adapters::AuthContext;
    use neoql_adapters::query::ReadShape;

    fn translate_with(
        config: &TranslatorConfig,
        auth: &AuthContext,
        target: &str,
        arguments: &str,
        fields: &str,
    ) -> Result<String> {
        let schema = schema();
        let mut ctx = Context::new(&schema, auth, config);
        let request = ReadRequest {
            target: target.to_string(),
            shape: ReadShape::List,
            args: args(arguments),
            selection: selection(fields),
        };
        let statement = translate_read(&mut ctx, &request)?;
        Ok(render(&statement))
    }

    fn translate(target: &str, arguments: &str, fields: &str) -> Result<String> {
        translate_with(
            &TranslatorConfig::default(),
            &AuthContext::anonymous(),
            target,
            arguments,
            fields,
        )
    }

    #[test]
    fn test_root_read_with_options() {
        let text = translate(
            "Movie",
            r#"{ "where": { "title": "Forrest Gump" },
                 "options": { "sort": [ { "runtime": "DESC" } ], "limit": 5, "offset": 10 } }"#,
            r#"{ "fields": [ { "name": "title" } ] }"#,
        )
        .unwrap();
        let expected = "\
MATCH (this0:Movie)
WHERE this0.title = $param0
WITH *
ORDER BY this0.runtime DESC
SKIP $param1
LIMIT $param2
RETURN this0 { .title } AS this";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_nested_relationship_sub_calls() {
        let text = translate(
            "Movie",
            "{}",
            r#"{ "fields": [
                { "name": "title" },
                { "name": "actors", "args": { "where": { "name_STARTS_WITH": "T" } },
                  "selection": { "fields": [ { "name": "name" } ] } },
                { "name": "director", "selection": { "fields": [ { "name": "name" } ] } }
            ] }"#,
        )
        .unwrap();
        let expected = "\
MATCH (this0:Movie)
CALL {
    WITH this0
    MATCH (this0)<-[:ACTED_IN]-(this2:Actor)
    WHERE this2.name STARTS WITH $param0
    RETURN collect(this2 { .name }) AS var1
}
CALL {
    WITH this0
    MATCH (this0)<-[:DIRECTED]-(this4:Actor)
    RETURN head(collect(this4 { .name })) AS var3
}
RETURN this0 { .title, actors: var1, director: var3 } AS this";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_interface_root_read() {
        let text = translate(
            "Production",
            r#"{ "options": { "sort": [ { "title": "ASC" } ] } }"#,
            r#"{ "fields": [ { "name": "__typename" } ],
                 "on": [ { "type": "Movie", "fields": [ { "name": "runtime" } ] } ] }"#,
        )
        .unwrap();
        let expected = "\
CALL {
    MATCH (this0:Movie)
    RETURN this0 { __typename: \"Movie\", .runtime, __resolveType: \"Movie\", title: this0.title } AS this
    UNION ALL
    MATCH (this1:Series)
    RETURN this1 { __typename: \"Series\", __resolveType: \"Series\", title: this1.title } AS this
}
WITH this
ORDER BY this.title ASC
RETURN this";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_union_relationship_is_member_keyed() {
        let text = translate(
            "Actor",
            "{}",
            r#"{ "fields": [ { "name": "favorites",
                "args": { "where": { "Genre": { "name": "Drama" } } },
                "selection": { "on": [ { "type": "Genre", "fields": [ { "name": "name" } ] } ] } } ] }"#,
        )
        .unwrap();
        let expected = "\
MATCH (this0:Actor)
CALL {
    WITH this0
    CALL {
        WITH this0
        MATCH (this0)-[:LIKES]->(this3:Genre)
        WHERE this3.name = $param0
        RETURN this3 { .name, __resolveType: \"Genre\" } AS var2
    }
    RETURN collect(var2) AS var1
}
RETURN this0 { favorites: var1 } AS this";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_limits() {
        // The type default applies, and requests above the maximum are capped.
        let text = translate("Genre", "{}", r#"{ "fields": [ { "name": "name" } ] }"#).unwrap();
        assert!(text.contains("LIMIT $param0"));

        let schema = schema();
        let auth = AuthContext::anonymous();
        let config = TranslatorConfig::default().with_default_limit(Some(25));
        let ctx = Context::new(&schema, &auth, &config);
        let genre = schema.node("Genre").unwrap();
        assert_eq!(effective_limit(&ctx, None, genre.limit, true, "Genre"), Some(10));
        assert_eq!(effective_limit(&ctx, Some(500), genre.limit, true, "Genre"), Some(50));
        assert_eq!(effective_limit(&ctx, None, None, true, "Movie"), Some(25));
        assert_eq!(effective_limit(&ctx, None, None, false, "Movie"), None);
    }

    #[test]
    fn test_filter_rules_join_the_match() {
        let auth = AuthContext::anonymous().claim("sub", "u1");
        let text = translate_with(
            &TranslatorConfig::default(),
            &auth,
            "Post",
            "{}",
            r#"{ "fields": [ { "name": "content" } ] }"#,
        )
        .unwrap();
        assert_eq!(
            text,
            "MATCH (this0:Post)\nWHERE $isAuthenticated = true AND $jwt.sub IS NOT NULL AND this0.authorId = $jwt.sub\nRETURN this0 { .content } AS this"
        );
    }

    #[test]
    fn test_malformed_options() {
        let fields = r#"{ "fields": [ { "name": "title" } ] }"#;
        for arguments in [
            r#"{ "options": { "limit": -1 } }"#,
            r#"{ "options": { "sort": [ { "title": "UP" } ] } }"#,
            r#"{ "options": { "sort": [ { "actorCount": "ASC" } ] } }"#,
        ] {
            let err = translate("Movie", arguments, fields).unwrap_err();
            assert!(
                matches!(err, Error::Translation(TranslationError::InvalidArgument { .. })),
                "{arguments}: {err}"
            );
        }
        let err = translate("Search", r#"{ "sort": { "name": "ASC" } }"#, fields).unwrap_err();
        assert!(matches!(err, Error::Translation(TranslationError::InvalidArgument { .. })));
    }

    #[test]
    fn test_unknown_type_and_condition() {
        let err = translate("Nope", "{}", r#"{ "fields": [] }"#).unwrap_err();
        assert!(matches!(err, Error::Translation(TranslationError::UnknownType { .. })));

        let err = translate(
            "Movie",
            "{}",
            r#"{ "on": [ { "type": "Series", "fields": [ { "name": "title" } ] } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Translation(TranslationError::AmbiguousTypeCondition { .. })
        ));
    }
}
