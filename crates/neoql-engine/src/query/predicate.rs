//! Compiles filter argument trees into predicate expressions.
//!
//! A filter is a map whose keys name a field plus an optional operator
//! suffix (`title_CONTAINS`, `actors_SOME`, `actorsConnection_NONE`),
//! or one of the logical combinators `AND`, `OR` and `NOT`. Every value is
//! bound as a parameter; the only literals in a compiled predicate are
//! schema-derived (labels, counts of one).

use super::context::{
    ArgPath, Context, claim_expr, expect_map, invalid_argument, traverse, unknown_field, unknown_type,
};
use super::plan::{ArithmeticOp, CompareOp, Expr, NodePattern, Pattern, SubPattern, Var};
use neoql_common::types::Value;
use neoql_common::utils::error::{Result, TranslationError};
use neoql_core::schema::{
    Attribute, InterfaceType, NodeType, PropertyType, RelationshipField, TargetKind,
};

/// Where a filter comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// A request argument. Every value is data.
    Request,
    /// An authorization rule. String values of the form `"$jwt.path"` refer
    /// to the caller's claims.
    Authorization,
}

/// The quantifier applied to a relationship filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// At least one related node matches.
    Some,
    /// No related node matches.
    None,
    /// Every related node matches.
    All,
    /// Exactly one related node matches.
    Single,
}

impl Quantifier {
    /// The key suffix naming the quantifier.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Quantifier::Some => "SOME",
            Quantifier::None => "NONE",
            Quantifier::All => "ALL",
            Quantifier::Single => "SINGLE",
        }
    }

    /// Quantifies over one or more branches, each a pattern from the filtered
    /// variable to a related node and the predicate the related node must
    /// satisfy. Polymorphic relationships contribute one branch per member.
    ///
    /// - `SOME(R, P) = EXISTS { R WHERE P }`
    /// - `NONE(R, P) = NOT EXISTS { R WHERE P }`
    /// - `ALL(R, P) = NOT EXISTS { R WHERE NOT P }`
    /// - `SINGLE(R, P) = COUNT { R WHERE P } = 1`
    #[must_use]
    pub fn over(self, branches: Vec<(Pattern, Expr)>) -> Expr {
        let sub = |pattern: Pattern, predicate: Expr| SubPattern {
            pattern,
            predicate: predicate.into_predicate(),
        };
        match self {
            Quantifier::Some => Expr::or(
                branches
                    .into_iter()
                    .map(|(r, p)| Expr::Exists(Box::new(sub(r, p)))),
            ),
            Quantifier::None => Expr::not(Quantifier::Some.over(branches)),
            Quantifier::All => Expr::and(
                branches
                    .into_iter()
                    .map(|(r, p)| Expr::not(Expr::Exists(Box::new(sub(r, Expr::not(p)))))),
            ),
            Quantifier::Single => {
                let total = branches
                    .into_iter()
                    .map(|(r, p)| Expr::Count(Box::new(sub(r, p))))
                    .reduce(|acc, count| Expr::arithmetic(acc, ArithmeticOp::Add, count));
                match total {
                    Some(total) => {
                        Expr::compare(total, CompareOp::Eq, Expr::Literal(Value::Int64(1)))
                    }
                    None => Expr::bool(false),
                }
            }
        }
    }
}

/// A filter operator, parsed from a key suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operator {
    Equal,
    NotEqual,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Matches,
    Lt,
    Lte,
    Gt,
    Gte,
    Includes,
    NotIncludes,
    Distance,
    Quantified(Quantifier),
}

static NULL: Value = Value::Null;

/// Longest suffixes first, so `_NOT_IN` wins over `_IN`.
const SUFFIXES: &[(&str, Operator)] = &[
    ("_NOT_STARTS_WITH", Operator::NotStartsWith),
    ("_NOT_ENDS_WITH", Operator::NotEndsWith),
    ("_NOT_CONTAINS", Operator::NotContains),
    ("_NOT_INCLUDES", Operator::NotIncludes),
    ("_STARTS_WITH", Operator::StartsWith),
    ("_ENDS_WITH", Operator::EndsWith),
    ("_CONTAINS", Operator::Contains),
    ("_INCLUDES", Operator::Includes),
    ("_DISTANCE", Operator::Distance),
    ("_MATCHES", Operator::Matches),
    ("_NOT_IN", Operator::NotIn),
    ("_SINGLE", Operator::Quantified(Quantifier::Single)),
    ("_NONE", Operator::Quantified(Quantifier::None)),
    ("_SOME", Operator::Quantified(Quantifier::Some)),
    ("_ALL", Operator::Quantified(Quantifier::All)),
    ("_NOT", Operator::NotEqual),
    ("_LTE", Operator::Lte),
    ("_GTE", Operator::Gte),
    ("_LT", Operator::Lt),
    ("_GT", Operator::Gt),
    ("_IN", Operator::In),
];

impl Operator {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Operator::Equal => "EQUALS",
            Operator::NotEqual => "NOT",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::Contains => "CONTAINS",
            Operator::NotContains => "NOT_CONTAINS",
            Operator::StartsWith => "STARTS_WITH",
            Operator::NotStartsWith => "NOT_STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::NotEndsWith => "NOT_ENDS_WITH",
            Operator::Matches => "MATCHES",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::Includes => "INCLUDES",
            Operator::NotIncludes => "NOT_INCLUDES",
            Operator::Distance => "DISTANCE",
            Operator::Quantified(q) => q.suffix(),
        }
    }

    fn is_textual(self) -> bool {
        matches!(
            self,
            Operator::Contains
                | Operator::NotContains
                | Operator::StartsWith
                | Operator::NotStartsWith
                | Operator::EndsWith
                | Operator::NotEndsWith
                | Operator::Matches
        )
    }

    fn is_ordered(self) -> bool {
        matches!(
            self,
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte
        )
    }

    /// Splits a key into a name and the operator its suffix selects, for
    /// keys whose name is not checked against a schema (claims).
    pub(crate) fn split(key: &str) -> (&str, Operator) {
        SUFFIXES
            .iter()
            .find_map(|(suffix, op)| {
                key.strip_suffix(suffix)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name, *op))
            })
            .unwrap_or((key, Operator::Equal))
    }

    /// Builds `left <op> right` for the scalar operators.
    pub(crate) fn compare(self, left: Expr, right: Expr) -> Option<Expr> {
        let cmp = |op| Some(Expr::compare(left.clone(), op, right.clone()));
        let negated = |op| Some(Expr::not(Expr::compare(left.clone(), op, right.clone())));
        match self {
            Operator::Equal => cmp(CompareOp::Eq),
            Operator::NotEqual => negated(CompareOp::Eq),
            Operator::In => cmp(CompareOp::In),
            Operator::NotIn => negated(CompareOp::In),
            Operator::Contains => cmp(CompareOp::Contains),
            Operator::NotContains => negated(CompareOp::Contains),
            Operator::StartsWith => cmp(CompareOp::StartsWith),
            Operator::NotStartsWith => negated(CompareOp::StartsWith),
            Operator::EndsWith => cmp(CompareOp::EndsWith),
            Operator::NotEndsWith => negated(CompareOp::EndsWith),
            Operator::Matches => cmp(CompareOp::Regex),
            Operator::Lt => cmp(CompareOp::Lt),
            Operator::Lte => cmp(CompareOp::Le),
            Operator::Gt => cmp(CompareOp::Gt),
            Operator::Gte => cmp(CompareOp::Ge),
            Operator::Includes => Some(Expr::compare(right.clone(), CompareOp::In, left.clone())),
            Operator::NotIncludes => Some(Expr::not(Expr::compare(
                right.clone(),
                CompareOp::In,
                left.clone(),
            ))),
            Operator::Distance | Operator::Quantified(_) => None,
        }
    }
}

/// The type a filter applies to.
#[derive(Debug, Clone, Copy)]
pub enum FilterTarget<'a> {
    /// A concrete node type.
    Node(&'a NodeType),
    /// An interface; its members share its attributes.
    Interface(&'a InterfaceType),
    /// The properties of a relationship.
    Edge(&'a PropertyType),
}

impl<'a> FilterTarget<'a> {
    /// The type name, for error messages.
    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            FilterTarget::Node(node) => &node.name,
            FilterTarget::Interface(iface) => &iface.name,
            FilterTarget::Edge(props) => &props.name,
        }
    }

    fn attribute(&self, name: &str) -> Option<&'a Attribute> {
        match self {
            FilterTarget::Node(node) => node.attribute(name),
            FilterTarget::Interface(iface) => iface.attribute(name),
            FilterTarget::Edge(props) => props.attribute(name),
        }
    }

    fn relationship(&self, name: &str) -> Option<&'a RelationshipField> {
        match self {
            FilterTarget::Node(node) => node.relationship(name),
            _ => None,
        }
    }
}

/// A variable and the type it is bound to.
#[derive(Debug, Clone)]
pub struct Subject<'a> {
    /// The bound variable.
    pub var: Var,
    /// Its type.
    pub target: FilterTarget<'a>,
}

impl<'a> Subject<'a> {
    /// Creates a subject.
    #[must_use]
    pub fn new(var: &Var, target: FilterTarget<'a>) -> Self {
        Self {
            var: var.clone(),
            target,
        }
    }
}

#[derive(Clone, Copy)]
enum FilterField<'a> {
    Attribute(&'a Attribute),
    Relationship(&'a RelationshipField),
    Connection(&'a RelationshipField),
    Aggregate(&'a RelationshipField),
}

fn resolve_field<'a>(target: FilterTarget<'a>, name: &str) -> Option<FilterField<'a>> {
    if let Some(attr) = target.attribute(name) {
        return Some(FilterField::Attribute(attr));
    }
    if let Some(rel) = target.relationship(name) {
        return Some(FilterField::Relationship(rel));
    }
    if let Some(rel) = name
        .strip_suffix("Connection")
        .and_then(|n| target.relationship(n))
    {
        return Some(FilterField::Connection(rel));
    }
    name.strip_suffix("Aggregate")
        .and_then(|n| target.relationship(n))
        .map(FilterField::Aggregate)
}

fn parse_key<'a>(target: FilterTarget<'a>, key: &str) -> Option<(FilterField<'a>, Operator)> {
    if let Some(field) = resolve_field(target, key) {
        return Some((field, Operator::Equal));
    }
    SUFFIXES.iter().find_map(|(suffix, op)| {
        key.strip_suffix(suffix)
            .and_then(|name| resolve_field(target, name))
            .map(|field| (field, *op))
    })
}

fn invalid_operator(type_name: &str, field: &str, op: Operator, path: &ArgPath) -> neoql_common::Error {
    TranslationError::InvalidFilterOperator {
        type_name: type_name.to_string(),
        field: field.to_string(),
        operator: op.name().to_string(),
        path: path.to_string(),
    }
    .into()
}

/// Compiles filters in one mode.
#[derive(Debug, Clone, Copy)]
pub struct PredicateCompiler {
    mode: FilterMode,
}

impl PredicateCompiler {
    /// Creates a compiler.
    #[must_use]
    pub fn new(mode: FilterMode) -> Self {
        Self { mode }
    }

    /// Compiles a `where` map over `subject`. A null or empty filter is
    /// always true.
    pub fn compile<'a>(
        &self,
        ctx: &mut Context<'a>,
        filter: &Value,
        subject: &Subject<'a>,
        path: &ArgPath,
    ) -> Result<Expr> {
        if filter.is_null() {
            return Ok(Expr::bool(true));
        }
        let map = expect_map(filter, "where", path)?;
        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            let path = path.child(key);
            let part = match key.as_str() {
                "AND" | "OR" => {
                    let items = value.as_list().ok_or_else(|| {
                        invalid_argument(key, "expected a list of filters", &path)
                    })?;
                    let mut compiled = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        compiled.push(self.compile(ctx, item, subject, &path.index(i))?);
                    }
                    if key == "AND" {
                        Expr::and(compiled)
                    } else {
                        Expr::or(compiled)
                    }
                }
                "NOT" => ctx.hoist_claims(|ctx| Ok(Expr::not(self.compile(ctx, value, subject, &path)?)))?,
                "typename_IN" => typename_in(ctx, subject, value, &path)?,
                _ => self.field(ctx, subject, key, value, &path)?,
            };
            parts.push(part);
        }
        Ok(Expr::and(parts))
    }

    fn field<'a>(
        &self,
        ctx: &mut Context<'a>,
        subject: &Subject<'a>,
        key: &str,
        value: &Value,
        path: &ArgPath,
    ) -> Result<Expr> {
        let type_name = subject.target.name();
        let (field, op) =
            parse_key(subject.target, key).ok_or_else(|| unknown_field(type_name, key, path))?;
        match field {
            FilterField::Attribute(attr) => self.attribute(ctx, subject, attr, op, value, path),
            FilterField::Relationship(rel) => {
                let quantifier = relationship_quantifier(op)
                    .ok_or_else(|| invalid_operator(type_name, &rel.name, op, path))?;
                self.relationship(ctx, subject, rel, quantifier, value, path)
            }
            FilterField::Connection(rel) => {
                let quantifier = relationship_quantifier(op)
                    .ok_or_else(|| invalid_operator(type_name, key, op, path))?;
                self.connection(ctx, subject, rel, quantifier, value, path)
            }
            FilterField::Aggregate(rel) => {
                if op != Operator::Equal {
                    return Err(invalid_operator(type_name, key, op, path));
                }
                self.aggregate(ctx, subject, rel, value, path)
            }
        }
    }

    // === Attributes ===

    fn attribute(
        &self,
        ctx: &mut Context<'_>,
        subject: &Subject<'_>,
        attr: &Attribute,
        op: Operator,
        value: &Value,
        path: &ArgPath,
    ) -> Result<Expr> {
        let type_name = subject.target.name();
        let kind = &attr.kind;
        let valid = attr.capabilities.filterable
            && match op {
                Operator::Equal | Operator::NotEqual | Operator::In | Operator::NotIn => true,
                _ if op.is_textual() => kind.is_textual() && !attr.list,
                _ if op.is_ordered() => (kind.is_ordered() || kind.is_spatial()) && !attr.list,
                Operator::Includes | Operator::NotIncludes => attr.list,
                Operator::Distance => kind.is_spatial() && !attr.list,
                _ => false,
            };
        if !valid {
            return Err(invalid_operator(type_name, &attr.name, op, path));
        }

        let property = Expr::property(&subject.var, &attr.stored_name);
        if value.is_null() {
            return match op {
                Operator::Equal => Ok(property.is_null()),
                Operator::NotEqual => Ok(property.is_not_null()),
                _ => Err(invalid_argument(
                    &attr.name,
                    "null is only valid for equality",
                    path,
                )),
            };
        }

        if kind.is_spatial() && (op.is_ordered() || op == Operator::Distance) {
            return self.distance(ctx, attr, property, op, value, path);
        }

        let membership = matches!(op, Operator::In | Operator::NotIn);
        let (operand, guard) = self.operand(ctx, value);
        if membership && guard.is_none() && value.as_list().is_none() {
            return Err(invalid_argument(&attr.name, "expected a list", path));
        }
        let element = matches!(op, Operator::Includes | Operator::NotIncludes);
        let operand = wrap_kind(ctx, attr, operand, membership || (attr.list && !element));
        let comparison = op
            .compare(property, operand)
            .ok_or_else(|| invalid_operator(type_name, &attr.name, op, path))?;
        Ok(Expr::and(guard.into_iter().chain([comparison])))
    }

    /// `point.distance(n.location, point($p.point)) < $p.distance`.
    fn distance(
        &self,
        ctx: &mut Context<'_>,
        attr: &Attribute,
        property: Expr,
        op: Operator,
        value: &Value,
        path: &ArgPath,
    ) -> Result<Expr> {
        let valid = value
            .as_map()
            .is_some_and(|m| m.contains_key("point") && m.contains_key("distance"));
        if !valid {
            return Err(invalid_argument(
                &attr.name,
                "expected { point, distance }",
                path,
            ));
        }
        let param = ctx.namer.param(value.clone());
        let distance = Expr::function(
            "point.distance",
            vec![property, Expr::function("point", vec![param.clone().dot("point")])],
        );
        let cmp = match op {
            Operator::Lt => CompareOp::Lt,
            Operator::Lte => CompareOp::Le,
            Operator::Gt => CompareOp::Gt,
            Operator::Gte => CompareOp::Ge,
            _ => CompareOp::Eq,
        };
        Ok(Expr::compare(distance, cmp, param.dot("distance")))
    }

    /// A value as an expression, plus the guard a claim reference needs.
    fn operand(&self, ctx: &mut Context<'_>, value: &Value) -> (Expr, Option<Expr>) {
        if self.mode == FilterMode::Authorization {
            if let Some(claim) = claim_path(value) {
                return (claim_expr(ctx, claim), ctx.claim_guard(claim));
            }
        }
        (ctx.namer.param(value.clone()), None)
    }

    // === Relationships ===

    fn relationship<'a>(
        &self,
        ctx: &mut Context<'a>,
        subject: &Subject<'a>,
        rel: &'a RelationshipField,
        quantifier: Quantifier,
        value: &Value,
        path: &ArgPath,
    ) -> Result<Expr> {
        // `actors: null` asks for nodes without related nodes.
        let (quantifier, value) = if value.is_null() {
            match quantifier {
                Quantifier::Some => (Quantifier::None, &NULL),
                Quantifier::None => (Quantifier::Some, &NULL),
                _ => {
                    return Err(invalid_argument(
                        &rel.name,
                        "null is only valid without a quantifier",
                        path,
                    ));
                }
            }
        } else {
            (quantifier, value)
        };

        ctx.hoist_claims(|ctx| {
            let mut branches = Vec::new();
            for (member, filter) in self.related(ctx, rel, value, path)? {
                let child = ctx.namer.node();
                let path = member_path(path, member.as_deref());
                let (node, guard, target) = related_node(ctx, rel, member.as_deref(), &child, &path)?;
                let predicate = self.compile(ctx, filter, &Subject::new(&child, target), &path)?;
                let pattern = traverse(&subject.var, rel, None, node);
                branches.push((pattern, Expr::and(guard.into_iter().chain([predicate]))));
            }
            Ok(quantifier.over(branches))
        })
    }

    fn connection<'a>(
        &self,
        ctx: &mut Context<'a>,
        subject: &Subject<'a>,
        rel: &'a RelationshipField,
        quantifier: Quantifier,
        value: &Value,
        path: &ArgPath,
    ) -> Result<Expr> {
        let schema = ctx.schema;
        let properties = rel.properties.as_deref().and_then(|p| schema.property_type(p));
        ctx.hoist_claims(|ctx| {
            let mut branches = Vec::new();
            for (member, filter) in self.related(ctx, rel, value, path)? {
                let child = ctx.namer.node();
                let edge = ctx.namer.edge();
                let path = member_path(path, member.as_deref());
                let (node, guard, target) = related_node(ctx, rel, member.as_deref(), &child, &path)?;
                let node_subject = Subject::new(&child, target);
                let edge_subject = properties.map(|p| Subject::new(&edge, FilterTarget::Edge(p)));
                let predicate =
                    self.connection_where(ctx, filter, &node_subject, edge_subject.as_ref(), &path)?;
                let pattern = traverse(&subject.var, rel, Some(&edge), node);
                branches.push((pattern, Expr::and(guard.into_iter().chain([predicate]))));
            }
            Ok(quantifier.over(branches))
        })
    }

    /// Compiles a connection `where`: `{ node, edge, AND, OR, NOT }`.
    pub fn connection_where<'a>(
        &self,
        ctx: &mut Context<'a>,
        filter: &Value,
        node: &Subject<'a>,
        edge: Option<&Subject<'a>>,
        path: &ArgPath,
    ) -> Result<Expr> {
        if filter.is_null() {
            return Ok(Expr::bool(true));
        }
        let map = expect_map(filter, "where", path)?;
        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            let path = path.child(key);
            let part = match key.as_str() {
                "node" => self.compile(ctx, value, node, &path)?,
                "edge" => match edge {
                    Some(edge) => self.compile(ctx, value, edge, &path)?,
                    None => return Err(unknown_field(node.target.name(), key, &path)),
                },
                "AND" | "OR" => {
                    let items = value.as_list().ok_or_else(|| {
                        invalid_argument(key, "expected a list of filters", &path)
                    })?;
                    let mut compiled = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        compiled.push(self.connection_where(ctx, item, node, edge, &path.index(i))?);
                    }
                    if key == "AND" {
                        Expr::and(compiled)
                    } else {
                        Expr::or(compiled)
                    }
                }
                "NOT" => ctx.hoist_claims(|ctx| Ok(Expr::not(self.connection_where(ctx, value, node, edge, &path)?)))?,
                other => return Err(unknown_field(node.target.name(), other, &path)),
            };
            parts.push(part);
        }
        Ok(Expr::and(parts))
    }

    /// Splits a relationship filter per concrete target. Union targets take
    /// member-keyed filters; other targets a single filter.
    fn related<'v>(
        &self,
        ctx: &Context<'_>,
        rel: &RelationshipField,
        value: &'v Value,
        path: &ArgPath,
    ) -> Result<Vec<(Option<String>, &'v Value)>> {
        if rel.target_kind != TargetKind::Union {
            return Ok(vec![(None, value)]);
        }
        let members = ctx.schema.members(&rel.target);
        let keyed = match value {
            Value::Null => None,
            other => Some(expect_map(other, &rel.name, path)?),
        };
        match keyed {
            Some(map) if !map.is_empty() => {
                let mut out = Vec::with_capacity(map.len());
                for (member, filter) in map {
                    if !members.iter().any(|m| &m.name == member) {
                        return Err(unknown_field(&rel.target, member, &path.child(member)));
                    }
                    out.push((Some(member.clone()), filter));
                }
                Ok(out)
            }
            _ => Ok(members
                .iter()
                .map(|m| (Some(m.name.clone()), &NULL))
                .collect()),
        }
    }

    // === Aggregates ===

    fn aggregate(
        &self,
        ctx: &mut Context<'_>,
        subject: &Subject<'_>,
        rel: &RelationshipField,
        value: &Value,
        path: &ArgPath,
    ) -> Result<Expr> {
        let map = expect_map(value, &rel.name, path)?;
        let mut parts = Vec::with_capacity(map.len());
        for (key, inner) in map {
            let path = path.child(key);
            let part = match key.as_str() {
                "AND" | "OR" => {
                    let items = inner.as_list().ok_or_else(|| {
                        invalid_argument(key, "expected a list of filters", &path)
                    })?;
                    let mut compiled = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        compiled.push(self.aggregate(ctx, subject, rel, item, &path.index(i))?);
                    }
                    if key == "AND" {
                        Expr::and(compiled)
                    } else {
                        Expr::or(compiled)
                    }
                }
                "NOT" => Expr::not(self.aggregate(ctx, subject, rel, inner, &path)?),
                _ => {
                    let (name, op) = Operator::split(key);
                    if name != "count" {
                        return Err(unknown_field(&format!("{}Aggregate", rel.name), key, &path));
                    }
                    let valid = matches!(
                        op,
                        Operator::Equal | Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte
                    );
                    if !valid {
                        return Err(invalid_operator(subject.target.name(), key, op, &path));
                    }
                    if inner.as_i64().is_none_or(|n| n < 0) {
                        return Err(invalid_argument(key, "expected a non-negative integer", &path));
                    }
                    let count = related_count(ctx, &subject.var, rel);
                    let param = ctx.namer.param(inner.clone());
                    op.compare(count, param)
                        .ok_or_else(|| invalid_operator(subject.target.name(), key, op, &path))?
                }
            };
            parts.push(part);
        }
        Ok(Expr::and(parts))
    }
}

fn relationship_quantifier(op: Operator) -> Option<Quantifier> {
    match op {
        Operator::Equal => Some(Quantifier::Some),
        Operator::NotEqual => Some(Quantifier::None),
        Operator::Quantified(q) => Some(q),
        _ => None,
    }
}

fn member_path(path: &ArgPath, member: Option<&str>) -> ArgPath {
    match member {
        Some(member) => path.child(member),
        None => path.clone(),
    }
}

/// The related node pattern for one branch, the label guard it needs and the
/// type its filter is compiled against.
fn related_node<'a>(
    ctx: &Context<'a>,
    rel: &RelationshipField,
    member: Option<&str>,
    child: &Var,
    path: &ArgPath,
) -> Result<(NodePattern, Option<Expr>, FilterTarget<'a>)> {
    let schema = ctx.schema;
    let name = member.unwrap_or(&rel.target);
    if let Some(node) = schema.node(name) {
        return Ok((NodePattern::labeled(child, &node.labels), None, FilterTarget::Node(node)));
    }
    let iface = schema
        .interface(name)
        .ok_or_else(|| unknown_type(name, path))?;
    Ok((
        NodePattern::var(child),
        Some(member_guard(schema.members(&iface.name), child)),
        FilterTarget::Interface(iface),
    ))
}

/// `child:Movie OR child:Series`.
pub(crate) fn member_guard(members: Vec<&NodeType>, var: &Var) -> Expr {
    Expr::or(members.into_iter().map(|m| Expr::HasLabels {
        var: var.clone(),
        labels: m.labels.clone(),
    }))
}

/// `COUNT { (parent)-[:T]->(child:Label) }`.
pub(crate) fn related_count(ctx: &mut Context<'_>, parent: &Var, rel: &RelationshipField) -> Expr {
    let child = ctx.namer.node();
    let schema = ctx.schema;
    let (node, guard) = match schema.node(&rel.target) {
        Some(node) => (NodePattern::labeled(&child, &node.labels), None),
        None => (
            NodePattern::var(&child),
            Some(member_guard(schema.members(&rel.target), &child)),
        ),
    };
    Expr::Count(Box::new(SubPattern {
        pattern: traverse(parent, rel, None, node),
        predicate: guard,
    }))
}

fn typename_in(ctx: &Context<'_>, subject: &Subject<'_>, value: &Value, path: &ArgPath) -> Result<Expr> {
    let names = value
        .as_list()
        .ok_or_else(|| invalid_argument("typename_IN", "expected a list of type names", path))?;
    let members = ctx.schema.members(subject.target.name());
    let mut parts = Vec::with_capacity(names.len());
    for name in names {
        let name = name
            .as_str()
            .ok_or_else(|| invalid_argument("typename_IN", "expected a list of type names", path))?;
        let member = members.iter().find(|m| m.name == name).ok_or_else(|| {
            invalid_argument(
                "typename_IN",
                format!("'{name}' is not a member of '{}'", subject.target.name()),
                path,
            )
        })?;
        parts.push(match subject.target {
            FilterTarget::Node(_) => Expr::bool(true),
            _ => Expr::HasLabels {
                var: subject.var.clone(),
                labels: member.labels.clone(),
            },
        });
    }
    Ok(Expr::or(parts))
}

/// The claim path of a `"$jwt.path"` reference.
pub(crate) fn claim_path(value: &Value) -> Option<&str> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix("$jwt."))
        .filter(|p| !p.is_empty())
}


/// Wraps a value in the constructor of a temporal or spatial kind.
/// List values are converted element-wise.
pub(crate) fn wrap_kind(ctx: &mut Context<'_>, attr: &Attribute, operand: Expr, list: bool) -> Expr {
    let constructor = match (&attr.kind.temporal(), attr.kind.is_spatial()) {
        (Some(temporal), _) => temporal.constructor(),
        (None, true) => "point",
        (None, false) => return operand,
    };
    if list {
        let item = ctx.namer.var();
        Expr::ListComprehension {
            var: item.clone(),
            list: Box::new(operand),
            filter: None,
            map: Some(Box::new(Expr::function(constructor, vec![Expr::var(&item)]))),
        }
    } else {
        Expr::function(constructor, vec![operand])
    }
}
