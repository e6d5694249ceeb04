//! Connection reads: `totalCount`, sorted edges and cursor pagination.
//!
//! Matches are collected into a list before slicing so the total is known:
//!
//! ```text
//! WITH collect({ node: this2, relationship: edge3 }) AS var4
//! WITH var4, size(var4) AS var5
//! CALL {
//!     WITH var4
//!     UNWIND var4 AS var7
//!     WITH var7.node AS this8, var7.relationship AS edge9
//!     WITH *
//!     ORDER BY edge9.role ASC
//!     LIMIT $param0
//!     RETURN collect({ node: this8 { .name }, properties: edge9 { .role } }) AS var6
//! }
//! RETURN { edges: var6, totalCount: var5 } AS var1
//! ```
//!
//! Cursors and `pageInfo` are not part of the statement; the serving layer
//! derives them from the request arguments with [`PageWindow`].

use super::context::{
    ArgPath, Context, argument, expect_map, invalid_argument, one_or_many, unknown_field, unknown_type,
};
use super::plan::{
    CallClause, Clause, Expr, MapEntry, ProjectionItem, ReturnClause, SortItem, Statement, UnwindClause,
    Var, WithClause,
};
use super::predicate::{FilterMode, FilterTarget, PredicateCompiler, Subject};
use super::projection::{check_type_conditions, project_edge, project_node};
use super::read::{
    Page, READ_COLUMN, SortKey, Target, check_exposed, effective_limit, match_node, member_branches,
    node_pattern, non_negative, parse_direction, parse_sort, sort_attribute,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use neoql_adapters::query::{Arguments, Field, ReadRequest, SelectionSet};
use neoql_common::types::{AuthOperation, Value};
use neoql_common::utils::error::Result;
use neoql_core::schema::{NodeType, PropertyType, RelationshipField};
use serde::Serialize;

const CURSOR_PREFIX: &str = "arrayconnection:";

/// Opaque edge cursors: base64 of `arrayconnection:<offset>`.
pub struct Cursor;

impl Cursor {
    /// The cursor of the edge at absolute `offset`.
    #[must_use]
    pub fn encode(offset: u64) -> String {
        STANDARD.encode(format!("{CURSOR_PREFIX}{offset}"))
    }

    /// The offset a cursor points at, or `None` if it is not a cursor.
    #[must_use]
    pub fn decode(cursor: &str) -> Option<u64> {
        let bytes = STANDARD.decode(cursor).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        text.strip_prefix(CURSOR_PREFIX)?.parse().ok()
    }
}

/// The slice of a connection a request asks for.
///
/// `after` resumes at the offset after the cursor; `first` bounds the page
/// size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageWindow {
    offset: u64,
    first: Option<u64>,
}

/// `pageInfo` of a returned page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Cursor of the first returned edge.
    pub start_cursor: Option<String>,
    /// Cursor of the last returned edge.
    pub end_cursor: Option<String>,
    /// Whether edges precede the page.
    pub has_previous_page: bool,
    /// Whether edges follow the page.
    pub has_next_page: bool,
}

impl PageWindow {
    /// A window starting at `offset`.
    #[must_use]
    pub fn new(offset: u64, first: Option<u64>) -> Self {
        Self { offset, first }
    }

    /// Reads `first` and `after` from connection arguments.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a negative `first` or a malformed cursor.
    pub fn from_args(args: &Arguments) -> Result<Self> {
        Self::parse(args, &ArgPath::root("args"))
    }

    pub(crate) fn parse(args: &Arguments, path: &ArgPath) -> Result<Self> {
        let first = non_negative(args, "first", path)?;
        let offset = match argument(args, "after") {
            Value::Null => 0,
            after => after
                .as_str()
                .and_then(Cursor::decode)
                .and_then(|offset| offset.checked_add(1))
                .ok_or_else(|| invalid_argument("after", "not a valid cursor", &path.child("after")))?,
        };
        Ok(Self { offset, first })
    }

    /// Absolute offset of the first edge in the page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Requested page size.
    #[must_use]
    pub fn first(&self) -> Option<u64> {
        self.first
    }

    /// Cursor of the `index`-th returned edge.
    #[must_use]
    pub fn edge_cursor(&self, index: usize) -> String {
        Cursor::encode(self.offset.saturating_add(index as u64))
    }

    /// `pageInfo` for a page of `returned` edges out of `total`.
    #[must_use]
    pub fn page_info(&self, returned: usize, total: u64) -> PageInfo {
        let (start_cursor, end_cursor) = match returned {
            0 => (None, None),
            n => (Some(self.edge_cursor(0)), Some(self.edge_cursor(n - 1))),
        };
        PageInfo {
            start_cursor,
            end_cursor,
            has_previous_page: self.offset > 0,
            has_next_page: self.offset.saturating_add(returned as u64) < total,
        }
    }
}

// === Selection ===

/// What a connection selection asks for.
struct Shape<'s> {
    /// Response keys in selection order; the flag marks `edges`.
    keys: Vec<(&'s str, bool)>,
    edges: Option<EdgesShape<'s>>,
}

struct EdgesShape<'s> {
    node_key: &'s str,
    node: Option<&'s SelectionSet>,
    properties: Option<(&'s str, &'s SelectionSet)>,
}

impl<'s> Shape<'s> {
    fn parse(selection: &'s SelectionSet, type_name: &str, path: &ArgPath) -> Result<Self> {
        let mut keys = Vec::new();
        let mut edges = None;
        for field in &selection.fields {
            match field.name.as_str() {
                "totalCount" => keys.push((field.response_key(), false)),
                "edges" => {
                    keys.push((field.response_key(), true));
                    edges = Some(EdgesShape::parse(field, type_name, &path.child(field.response_key()))?);
                }
                "pageInfo" | "__typename" => {}
                other => return Err(unknown_field(type_name, other, &path.child(field.response_key()))),
            }
        }
        if !keys.iter().any(|(_, is_edges)| !is_edges) {
            keys.push(("totalCount", false));
        }
        Ok(Self { keys, edges })
    }
}

impl<'s> EdgesShape<'s> {
    fn parse(field: &'s Field, type_name: &str, path: &ArgPath) -> Result<Self> {
        let mut shape = Self {
            node_key: "node",
            node: None,
            properties: None,
        };
        for field in &field.selection.fields {
            match field.name.as_str() {
                "node" => {
                    shape.node_key = field.response_key();
                    shape.node = Some(&field.selection);
                }
                "properties" => shape.properties = Some((field.response_key(), &field.selection)),
                "cursor" | "__typename" => {}
                other => return Err(unknown_field(type_name, other, &path.child(field.response_key()))),
            }
        }
        Ok(shape)
    }
}

/// A connection sort key on the node or on the relationship.
struct ConnectionSort {
    on_edge: bool,
    key: SortKey,
}

/// `[{ node: { title: ASC }, edge: { role: DESC } }]`; keys naming node
/// attributes directly are accepted too.
fn parse_connection_sort(value: &Value, path: &ArgPath) -> Result<Vec<ConnectionSort>> {
    let mut keys = Vec::new();
    for (i, item) in one_or_many(value).into_iter().enumerate() {
        let item_path = path.index(i);
        for (key, value) in expect_map(item, "sort", &item_path)? {
            match key.as_str() {
                "node" | "edge" => {
                    let on_edge = key == "edge";
                    for sort in parse_sort(value, &item_path.child(key))? {
                        keys.push(ConnectionSort { on_edge, key: sort });
                    }
                }
                field => {
                    let key_path = item_path.child(field);
                    keys.push(ConnectionSort {
                        on_edge: false,
                        key: SortKey {
                            field: field.to_string(),
                            descending: parse_direction(value, &key_path)?,
                            path: key_path,
                        },
                    });
                }
            }
        }
    }
    Ok(keys)
}

fn edge_attribute<'a>(
    properties: Option<&'a PropertyType>,
    rel_name: &str,
    key: &SortKey,
) -> Result<&'a neoql_core::schema::Attribute> {
    let props = properties.ok_or_else(|| unknown_field(rel_name, &key.field, &key.path))?;
    props
        .attribute(&key.field)
        .ok_or_else(|| unknown_field(&props.name, &key.field, &key.path))
}

// === Translation ===

/// Everything a connection read needs besides the target.
struct Request<'r, 'a> {
    parent: Option<(&'r Var, &'a RelationshipField)>,
    properties: Option<&'a PropertyType>,
    args: &'r Arguments,
    shape: Shape<'r>,
    sort: Vec<ConnectionSort>,
    window: PageWindow,
    path: &'r ArgPath,
}

impl<'r, 'a> Request<'r, 'a> {
    fn new(
        ctx: &Context<'a>,
        parent: Option<(&'r Var, &'a RelationshipField)>,
        type_name: &str,
        args: &'r Arguments,
        selection: &'r SelectionSet,
        path: &'r ArgPath,
    ) -> Result<Self> {
        let properties = match parent.and_then(|(_, rel)| rel.properties.as_deref()) {
            Some(name) => Some(
                ctx.schema
                    .property_type(name)
                    .ok_or_else(|| unknown_type(name, path))?,
            ),
            None => None,
        };
        Ok(Self {
            parent,
            properties,
            args,
            shape: Shape::parse(selection, type_name, path)?,
            sort: parse_connection_sort(argument(args, "sort"), &path.child("sort"))?,
            window: PageWindow::parse(args, path)?,
            path,
        })
    }

    fn nested(&self) -> bool {
        self.parent.is_some()
    }

    fn has_edge(&self) -> bool {
        self.nested() && self.properties.is_some()
    }

    fn rel_name(&self) -> &str {
        self.parent.map_or("edge", |(_, rel)| rel.name.as_str())
    }

    /// The member filter: `{ node, edge }` when nested, a node filter at the root.
    fn predicate(
        &self,
        ctx: &mut Context<'a>,
        node: &'a NodeType,
        filter: &Value,
        var: &Var,
        edge: Option<&Var>,
        path: &ArgPath,
    ) -> Result<Expr> {
        let compiler = PredicateCompiler::new(FilterMode::Request);
        let subject = Subject::new(var, FilterTarget::Node(node));
        if !self.nested() {
            return compiler.compile(ctx, filter, &subject, path);
        }
        let edge = edge
            .zip(self.properties)
            .map(|(edge, props)| Subject::new(edge, FilterTarget::Edge(props)));
        compiler.connection_where(ctx, filter, &subject, edge.as_ref(), path)
    }

    fn page(&self, ctx: &mut Context<'_>, order_by: Vec<SortItem>, limits: Option<&NodeType>, type_name: &str) -> Page {
        let limit = effective_limit(
            ctx,
            self.window.first,
            limits.and_then(|node| node.limit),
            !self.nested(),
            type_name,
        );
        let offset = (self.window.offset > 0).then_some(self.window.offset);
        Page::new(ctx, order_by, offset, limit)
    }

    /// `WITH collect(item) AS edges` and `WITH edges, size(edges) AS total`.
    fn collect(&self, ctx: &mut Context<'_>, item: Expr, clauses: &mut Vec<Clause>) -> (Var, Var) {
        let edges = ctx.namer.var();
        let total = ctx.namer.var();
        clauses.push(Clause::With(WithClause::items(vec![ProjectionItem::aliased(
            Expr::collect(item),
            &edges,
        )])));
        clauses.push(Clause::With(WithClause::items(vec![
            ProjectionItem::var(&edges),
            ProjectionItem::aliased(Expr::function("size", vec![Expr::var(&edges)]), &total),
        ])));
        (edges, total)
    }

    /// `{ edges: page, totalCount: total }` in selection order.
    fn result(&self, page: Option<&Var>, total: &Var) -> Expr {
        Expr::Map(
            self.shape
                .keys
                .iter()
                .filter_map(|(key, is_edges)| {
                    let value = if *is_edges {
                        Expr::var(page?)
                    } else {
                        Expr::var(total)
                    };
                    Some(((*key).to_string(), value))
                })
                .collect(),
        )
    }
}

fn concrete<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    request: &Request<'_, 'a>,
) -> Result<(Vec<Clause>, Expr)> {
    let child = ctx.namer.node();
    let edge = request.has_edge().then(|| ctx.namer.edge());
    let filter = argument(request.args, "where");
    let predicate = request.predicate(ctx, node, filter, &child, edge.as_ref(), &request.path.child("where"))?;
    let mut clauses = match_node(
        ctx,
        node_pattern(request.parent, node, &child, edge.as_ref()),
        predicate,
        node,
        &child,
        AuthOperation::Read,
    )?;

    let mut item = vec![("node".to_string(), Expr::var(&child))];
    if let Some(edge) = &edge {
        item.push(("relationship".to_string(), Expr::var(edge)));
    }
    let (edges, total) = request.collect(ctx, Expr::Map(item), &mut clauses);

    let Some(shape) = &request.shape.edges else {
        return Ok((clauses, request.result(None, &total)));
    };
    let page = ctx.namer.var();
    let row = ctx.namer.var();
    let node_var = ctx.namer.node();
    let edge_var = edge.as_ref().map(|_| ctx.namer.edge());

    let mut unpacked = vec![ProjectionItem::aliased(Expr::var(&row).dot("node"), &node_var)];
    if let Some(edge_var) = &edge_var {
        unpacked.push(ProjectionItem::aliased(Expr::var(&row).dot("relationship"), edge_var));
    }
    let mut body = vec![
        Clause::Unwind(UnwindClause {
            expr: Expr::var(&edges),
            var: row.clone(),
        }),
        Clause::With(WithClause::items(unpacked)),
    ];

    let mut order_by = Vec::with_capacity(request.sort.len());
    for sort in &request.sort {
        let expr = if sort.on_edge {
            let attr = edge_attribute(request.properties, request.rel_name(), &sort.key)?;
            match &edge_var {
                Some(edge_var) => Expr::property(edge_var, &attr.stored_name),
                None => return Err(unknown_field(request.rel_name(), &sort.key.field, &sort.key.path)),
            }
        } else {
            let attr = sort_attribute(Target::Node(node), &sort.key)?;
            Expr::property(&node_var, &attr.stored_name)
        };
        order_by.push(SortItem {
            expr,
            descending: sort.key.descending,
        });
    }
    body.extend(request.page(ctx, order_by, Some(node), &node.name).clause(Vec::new()));

    let edges_path = request.path.child("edges");
    let mut entry = Vec::new();
    if let Some(selection) = shape.node {
        let mut projection = project_node(ctx, node, &node_var, selection, false, &edges_path.child(shape.node_key))?;
        body.extend(projection.take_clauses());
        entry.push((shape.node_key.to_string(), projection.expr(&node_var)));
    }
    if let Some((key, selection)) = shape.properties {
        let (Some(props), Some(edge_var)) = (request.properties, &edge_var) else {
            return Err(unknown_field(request.rel_name(), key, &edges_path.child(key)));
        };
        let entries = project_edge(ctx, props, edge_var, selection, &edges_path.child(key))?;
        entry.push((
            key.to_string(),
            Expr::MapProjection {
                var: edge_var.clone(),
                entries,
            },
        ));
    }
    body.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
        Expr::collect(Expr::Map(entry)),
        &page,
    ))));
    clauses.push(Clause::Call(CallClause::new(vec![edges], body)));
    Ok((clauses, request.result(Some(&page), &total)))
}

fn polymorphic<'a>(
    ctx: &mut Context<'a>,
    target: Target<'a>,
    request: &Request<'_, 'a>,
) -> Result<(Vec<Clause>, Expr)> {
    let filter = argument(request.args, "where");
    let where_path = request.path.child("where");
    let members = target.members_with_filter(ctx.schema, filter, &where_path)?;
    let empty = SelectionSet::default();
    let shape = request.shape.edges.as_ref();
    let node_key = shape.map_or("node", |s| s.node_key);
    let node_selection = shape.and_then(|s| s.node).unwrap_or(&empty);

    let mut node_sorts = Vec::new();
    let mut edge_sorts = Vec::new();
    for sort in &request.sort {
        if sort.on_edge {
            edge_sorts.push(edge_attribute(request.properties, request.rel_name(), &sort.key)?);
        } else {
            node_sorts.push(sort_attribute(target, &sort.key)?);
        }
    }
    let properties_key = shape
        .and_then(|s| s.properties.map(|(key, _)| key))
        .or_else(|| (!edge_sorts.is_empty()).then_some("properties"));

    let item = ctx.namer.var();
    let branches = member_branches(
        ctx,
        members,
        request.parent,
        request.has_edge(),
        node_selection,
        |ctx, node, filter, var, edge| {
            let path = match target {
                Target::Union(_) => where_path.child(&node.name),
                _ => where_path.clone(),
            };
            request.predicate(ctx, node, filter, var, edge, &path)
        },
        request.path,
    )?;

    let mut bodies = Vec::with_capacity(branches.len());
    for mut branch in branches {
        for attr in &node_sorts {
            branch
                .projection
                .ensure(&attr.name, Expr::property(&branch.var, &attr.stored_name));
        }
        let mut entry = vec![(node_key.to_string(), branch.projection.expr(&branch.var))];
        if let (Some(key), Some(props), Some(edge)) = (properties_key, request.properties, &branch.edge) {
            let selection = shape.and_then(|s| s.properties.map(|(_, sel)| sel)).unwrap_or(&empty);
            let mut entries = project_edge(ctx, props, edge, selection, &request.path.child("edges").child(key))?;
            for attr in &edge_sorts {
                let exists = entries.iter().any(|e| matches!(e, MapEntry::Shorthand(p) if p == &attr.name)
                    || matches!(e, MapEntry::Keyed(k, _) if k == &attr.name));
                if !exists {
                    entries.push(MapEntry::Keyed(attr.name.clone(), Expr::property(edge, &attr.stored_name)));
                }
            }
            entry.push((key.to_string(), Expr::MapProjection { var: edge.clone(), entries }));
        }
        let mut clauses = branch.clauses;
        clauses.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
            Expr::Map(entry),
            &item,
        ))));
        bodies.push(clauses);
    }

    let imports = request.parent.map(|(parent, _)| vec![parent.clone()]).unwrap_or_default();
    let mut clauses = vec![Clause::Call(CallClause::union(imports, bodies))];
    let (edges, total) = request.collect(ctx, Expr::var(&item), &mut clauses);
    if shape.is_none() {
        return Ok((clauses, request.result(None, &total)));
    }

    let page = ctx.namer.var();
    let row = ctx.namer.var();
    let mut order_by = Vec::with_capacity(request.sort.len());
    let (mut nodes, mut rels) = (node_sorts.iter(), edge_sorts.iter());
    for sort in &request.sort {
        let expr = match (sort.on_edge, properties_key) {
            (true, Some(key)) => rels
                .next()
                .map(|attr| Expr::var(&row).dot(key).dot(&attr.name)),
            (false, _) => nodes
                .next()
                .map(|attr| Expr::var(&row).dot(node_key).dot(&attr.name)),
            (true, None) => None,
        };
        if let Some(expr) = expr {
            order_by.push(SortItem {
                expr,
                descending: sort.key.descending,
            });
        }
    }
    let mut body = vec![Clause::Unwind(UnwindClause {
        expr: Expr::var(&edges),
        var: row.clone(),
    })];
    body.extend(request.page(ctx, order_by, None, target.name()).clause(Vec::new()));
    body.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
        Expr::collect(Expr::var(&row)),
        &page,
    ))));
    clauses.push(Clause::Call(CallClause::new(vec![edges], body)));
    Ok((clauses, request.result(Some(&page), &total)))
}

fn build<'a>(
    ctx: &mut Context<'a>,
    target: Target<'a>,
    request: &Request<'_, 'a>,
) -> Result<(Vec<Clause>, Expr)> {
    match target {
        Target::Node(node) => concrete(ctx, node, request),
        _ => polymorphic(ctx, target, request),
    }
}

/// Translates a root connection read; the result is one row in column
/// `this`.
pub fn translate_connection<'a>(ctx: &mut Context<'a>, request: &ReadRequest) -> Result<Statement> {
    let path = ArgPath::root(format!("{}Connection", request.target));
    let target = Target::resolve(ctx.schema, &request.target, &path)?;
    check_exposed(target, "read", |node| node.exposure.read)?;
    if let Some(edges) = request.selection.field("edges") {
        if let Some(node) = edges.selection.field("node") {
            check_type_conditions(ctx.schema, &node.selection, target.name(), &path)?;
        }
    }
    let connection = Request::new(ctx, None, target.name(), &request.args, &request.selection, &path)?;
    let (mut clauses, result) = build(ctx, target, &connection)?;
    clauses.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(
        result,
        &Var::new(READ_COLUMN),
    ))));
    Ok(Statement::new(clauses))
}

/// A `<rel>Connection` field as a correlated sub-call on `parent`.
pub(crate) fn relationship_connection<'a>(
    ctx: &mut Context<'a>,
    parent: &Var,
    rel: &'a RelationshipField,
    field: &Field,
    path: &ArgPath,
) -> Result<(Clause, Var)> {
    let target = Target::resolve(ctx.schema, &rel.target, path)?;
    if let Some(edges) = field.selection.field("edges") {
        if let Some(node) = edges.selection.field("node") {
            check_type_conditions(ctx.schema, &node.selection, &rel.target, path)?;
        }
    }
    let result = ctx.namer.var();
    let type_name = format!("{}Connection", rel.name);
    let request = Request::new(ctx, Some((parent, rel)), &type_name, &field.args, &field.selection, path)?;
    let (mut body, value) = build(ctx, target, &request)?;
    body.push(Clause::Return(ReturnClause::single(ProjectionItem::aliased(value, &result))));
    Ok((Clause::Call(CallClause::new(vec![parent.clone()], body)), result))
}
