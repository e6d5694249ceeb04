//! The builder tree: an intermediate representation of Cypher statements.
//!
//! Translators never concatenate statement text. They build a [`Statement`]
//! out of the clause and expression variants below, allocating every
//! variable and parameter through the [`Namer`](super::namer::Namer); the
//! [`Renderer`](super::render::Renderer) turns the finished tree into text
//! and the parameter map in one pass, checking scoping as it goes.

use neoql_common::types::Value;
use std::fmt;
use std::sync::Arc;

/// A statement variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(Arc<str>);

impl Var {
    /// Creates a variable with a fixed name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bound parameter: its name and the value it carries.
///
/// The value travels inside the tree and is collected into the parameter
/// map by the renderer, so a parameter can never be referenced without
/// being bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Name, without the `$`.
    pub name: Arc<str>,
    /// Bound value.
    pub value: Value,
}

/// A complete statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    /// Clauses in execution order.
    pub clauses: Vec<Clause>,
}

impl Statement {
    /// Creates a statement from clauses.
    #[must_use]
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }
}

/// A clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `MATCH` / `OPTIONAL MATCH` with an optional `WHERE`.
    Match(MatchClause),

    /// `UNWIND list AS x`.
    Unwind(UnwindClause),

    /// `WITH` projection, optionally ordered, sliced and filtered.
    With(WithClause),

    /// `CALL { ... }` sub-call, possibly a union of branches.
    Call(CallClause),

    /// `CREATE`.
    Create(CreateClause),

    /// `MERGE` with `ON CREATE SET` / `ON MATCH SET`.
    Merge(MergeClause),

    /// `SET`.
    Set(SetClause),

    /// `DELETE` / `DETACH DELETE`.
    Delete(DeleteClause),

    /// A validation guard that aborts the statement when its predicate fails.
    Validate(ValidateClause),

    /// `RETURN`.
    Return(ReturnClause),

    /// Pre-validated statement text passed through verbatim.
    Raw(RawClause),
}

impl Clause {
    /// Returns true for clauses that write to the graph.
    #[must_use]
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            Clause::Create(_) | Clause::Merge(_) | Clause::Set(_) | Clause::Delete(_)
        )
    }
}

/// Match a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    /// Whether this is an `OPTIONAL MATCH`.
    pub optional: bool,
    /// The pattern.
    pub pattern: Pattern,
    /// `WHERE` predicate.
    pub predicate: Option<Expr>,
}

impl MatchClause {
    /// A non-optional match.
    #[must_use]
    pub fn new(pattern: Pattern, predicate: Option<Expr>) -> Self {
        Self {
            optional: false,
            pattern,
            predicate,
        }
    }
}

/// A path pattern: a start node and zero or more hops.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    /// Start node.
    pub start: NodePattern,
    /// Relationship hops.
    pub hops: Vec<Hop>,
}

impl Pattern {
    /// A single-node pattern.
    #[must_use]
    pub fn node(start: NodePattern) -> Self {
        Self {
            start,
            hops: Vec::new(),
        }
    }

    /// Appends a hop.
    #[must_use]
    pub fn hop(mut self, rel: RelPattern, node: NodePattern) -> Self {
        self.hops.push(Hop { rel, node });
        self
    }

    /// Variables named anywhere in the pattern, in order.
    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        std::iter::once(self.start.var.as_ref())
            .chain(
                self.hops
                    .iter()
                    .flat_map(|h| [h.rel.var.as_ref(), h.node.var.as_ref()]),
            )
            .flatten()
    }
}

/// One relationship hop.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    /// The relationship.
    pub rel: RelPattern,
    /// The node it leads to.
    pub node: NodePattern,
}

/// `(var:Label { key: value })`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    /// Variable.
    pub var: Option<Var>,
    /// Labels.
    pub labels: Vec<String>,
    /// Inline property constraints.
    pub properties: Vec<(String, Expr)>,
}

impl NodePattern {
    /// A node already bound (or to bind) without labels.
    #[must_use]
    pub fn var(var: &Var) -> Self {
        Self {
            var: Some(var.clone()),
            labels: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// A node with labels.
    #[must_use]
    pub fn labeled(var: &Var, labels: &[String]) -> Self {
        Self {
            var: Some(var.clone()),
            labels: labels.to_vec(),
            properties: Vec::new(),
        }
    }
}

/// Direction of a relationship in a pattern, read left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternDirection {
    /// `-[]->`
    Out,
    /// `<-[]-`
    In,
    /// `-[]-`
    Both,
}

/// `-[var:TYPE { key: value }]->`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    /// Variable.
    pub var: Option<Var>,
    /// Relationship type.
    pub rel_type: String,
    /// Direction.
    pub direction: PatternDirection,
    /// Inline property constraints.
    pub properties: Vec<(String, Expr)>,
}

/// `UNWIND expr AS var`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnwindClause {
    /// The list.
    pub expr: Expr,
    /// The element variable.
    pub var: Var,
}

/// A projected item with an optional alias.
///
/// Without an alias the expression must be a variable, which is passed
/// through under its own name.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    /// The expression.
    pub expr: Expr,
    /// The name it is bound to.
    pub alias: Option<Var>,
}

impl ProjectionItem {
    /// Passes a variable through.
    #[must_use]
    pub fn var(var: &Var) -> Self {
        Self {
            expr: Expr::Var(var.clone()),
            alias: None,
        }
    }

    /// Binds an expression to a name.
    #[must_use]
    pub fn aliased(expr: Expr, alias: &Var) -> Self {
        Self {
            expr,
            alias: Some(alias.clone()),
        }
    }

    /// The name the item is visible under afterwards.
    #[must_use]
    pub fn output(&self) -> Option<&Var> {
        match (&self.alias, &self.expr) {
            (Some(alias), _) => Some(alias),
            (None, Expr::Var(var)) => Some(var),
            (None, _) => None,
        }
    }
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortItem {
    /// Sort expression.
    pub expr: Expr,
    /// Descending order.
    pub descending: bool,
}

/// `WITH`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WithClause {
    /// Whether `*` keeps every visible variable.
    pub star: bool,
    /// Projected items.
    pub items: Vec<ProjectionItem>,
    /// `WITH DISTINCT`.
    pub distinct: bool,
    /// `ORDER BY` keys.
    pub order_by: Vec<SortItem>,
    /// `SKIP`.
    pub skip: Option<Expr>,
    /// `LIMIT`.
    pub limit: Option<Expr>,
    /// `WHERE` after the projection.
    pub predicate: Option<Expr>,
}

impl WithClause {
    /// `WITH *`.
    #[must_use]
    pub fn star() -> Self {
        Self {
            star: true,
            ..Self::default()
        }
    }

    /// `WITH items`.
    #[must_use]
    pub fn items(items: Vec<ProjectionItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }
}

/// `CALL { ... }`.
///
/// Each branch runs with only `imports` visible. With more than one branch
/// the bodies are combined with `UNION ALL` and must return the same
/// columns. Branches ending in `RETURN` (or a raw clause) export their
/// columns to the caller; others form a unit sub-call run for its writes.
#[derive(Debug, Clone, PartialEq)]
pub struct CallClause {
    /// Variables imported into every branch.
    pub imports: Vec<Var>,
    /// The branch bodies.
    pub branches: Vec<Vec<Clause>>,
}

impl CallClause {
    /// A single-body sub-call.
    #[must_use]
    pub fn new(imports: Vec<Var>, body: Vec<Clause>) -> Self {
        Self {
            imports,
            branches: vec![body],
        }
    }

    /// A union sub-call.
    #[must_use]
    pub fn union(imports: Vec<Var>, branches: Vec<Vec<Clause>>) -> Self {
        Self { imports, branches }
    }
}

/// `CREATE pattern`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateClause {
    /// The created pattern.
    pub pattern: Pattern,
}

/// `MERGE pattern`.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeClause {
    /// The merged pattern.
    pub pattern: Pattern,
    /// Applied only when the pattern was created.
    pub on_create: Vec<SetItem>,
    /// Applied only when the pattern already existed.
    pub on_match: Vec<SetItem>,
}

/// `SET`.
#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    /// Assignments.
    pub items: Vec<SetItem>,
}

/// `target.property = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct SetItem {
    /// Node or relationship variable.
    pub target: Var,
    /// Stored property name.
    pub property: String,
    /// New value.
    pub value: Expr,
}

impl SetItem {
    /// Creates an assignment.
    #[must_use]
    pub fn new(target: &Var, property: impl Into<String>, value: Expr) -> Self {
        Self {
            target: target.clone(),
            property: property.into(),
            value,
        }
    }
}

/// `DELETE` / `DETACH DELETE`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteClause {
    /// Detach relationships before deleting nodes.
    pub detach: bool,
    /// Deleted variables.
    pub vars: Vec<Var>,
}

/// A validation guard.
///
/// Rendered as `WITH *` followed by
/// `WHERE apoc.util.validatePredicate(NOT (predicate), tag, [0])`, which
/// aborts the statement with `tag` as the message when `predicate` does not
/// hold for some row.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidateClause {
    /// The condition every row must satisfy.
    pub predicate: Expr,
    /// The failure message.
    pub tag: String,
}

/// `RETURN`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnClause {
    /// Returned items.
    pub items: Vec<ProjectionItem>,
    /// `RETURN DISTINCT`.
    pub distinct: bool,
}

impl ReturnClause {
    /// Returns one item.
    #[must_use]
    pub fn single(item: ProjectionItem) -> Self {
        Self {
            items: vec![item],
            distinct: false,
        }
    }
}

/// Statement text passed through as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClause {
    /// The text; it ends with its own `RETURN`.
    pub text: String,
    /// Columns the text returns.
    pub binds: Vec<Var>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A schema-derived constant. Request values are always parameters.
    Literal(Value),

    /// A parameter reference.
    Param(Param),

    /// A variable reference.
    Var(Var),

    /// Property or map key access.
    Property(Box<Expr>, String),

    /// Map literal (`{ a: x }`).
    Map(Vec<(String, Expr)>),

    /// Map projection (`this0 { .title, actors: var1 }`).
    MapProjection {
        /// The projected variable.
        var: Var,
        /// Entries in order.
        entries: Vec<MapEntry>,
    },

    /// List literal.
    List(Vec<Expr>),

    /// Binary comparison.
    Compare {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: CompareOp,
        /// Right operand.
        right: Box<Expr>,
    },

    /// Binary arithmetic.
    Arithmetic {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: ArithmeticOp,
        /// Right operand.
        right: Box<Expr>,
    },

    /// Conjunction; empty is true.
    And(Vec<Expr>),

    /// Disjunction; empty is false.
    Or(Vec<Expr>),

    /// Negation.
    Not(Box<Expr>),

    /// `x IS NULL`.
    IsNull(Box<Expr>),

    /// `x IS NOT NULL`.
    IsNotNull(Box<Expr>),

    /// `var:Label1:Label2`.
    HasLabels {
        /// The node variable.
        var: Var,
        /// Labels that must all be present.
        labels: Vec<String>,
    },

    /// Scalar function call.
    Function {
        /// Function name.
        name: &'static str,
        /// Arguments.
        args: Vec<Expr>,
    },

    /// Aggregating function call.
    Aggregate {
        /// The function.
        function: AggregateFunction,
        /// Its argument.
        arg: Box<Expr>,
        /// `DISTINCT` inside the call.
        distinct: bool,
    },

    /// `EXISTS { MATCH pattern WHERE predicate }`.
    Exists(Box<SubPattern>),

    /// `COUNT { MATCH pattern WHERE predicate }`.
    Count(Box<SubPattern>),

    /// `CASE WHEN .. THEN .. ELSE .. END`.
    Case {
        /// Conditions and results.
        whens: Vec<(Expr, Expr)>,
        /// Fallback.
        otherwise: Option<Box<Expr>>,
    },

    /// `[var IN list WHERE filter | map]`.
    ListComprehension {
        /// Element variable.
        var: Var,
        /// Source list.
        list: Box<Expr>,
        /// Element filter.
        filter: Option<Box<Expr>>,
        /// Element mapping.
        map: Option<Box<Expr>>,
    },

    /// `reduce(acc = init, var IN list | expr)`.
    Reduce {
        /// Accumulator variable.
        acc: Var,
        /// Initial accumulator.
        init: Box<Expr>,
        /// Element variable.
        var: Var,
        /// Source list.
        list: Box<Expr>,
        /// Step expression.
        expr: Box<Expr>,
    },

    /// `list[from..to]`.
    Slice {
        /// Source list.
        list: Box<Expr>,
        /// Start index.
        from: Option<Box<Expr>>,
        /// End index (exclusive, negative counts from the end).
        to: Option<Box<Expr>>,
    },
}

/// A map projection entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEntry {
    /// `.property`, keyed by the property name.
    Shorthand(String),
    /// `key: expr`.
    Keyed(String, Expr),
}

/// A sub-pattern inside `EXISTS` or `COUNT`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubPattern {
    /// The pattern.
    pub pattern: Pattern,
    /// `WHERE` predicate.
    pub predicate: Option<Expr>,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `IN`
    In,
    /// `CONTAINS`
    Contains,
    /// `STARTS WITH`
    StartsWith,
    /// `ENDS WITH`
    EndsWith,
    /// `=~`
    Regex,
}

impl CompareOp {
    /// The operator's text.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::In => "IN",
            CompareOp::Contains => "CONTAINS",
            CompareOp::StartsWith => "STARTS WITH",
            CompareOp::EndsWith => "ENDS WITH",
            CompareOp::Regex => "=~",
        }
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl ArithmeticOp {
    /// The operator's text.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
        }
    }
}

/// Aggregating functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    /// `count`
    Count,
    /// `collect`
    Collect,
    /// `min`
    Min,
    /// `max`
    Max,
    /// `sum`
    Sum,
    /// `avg`
    Avg,
}

impl AggregateFunction {
    /// The function name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Collect => "collect",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
        }
    }
}

impl Expr {
    /// A boolean constant.
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Expr::Literal(Value::Bool(value))
    }

    /// A literal string constant.
    #[must_use]
    pub fn string(value: &str) -> Self {
        Expr::Literal(Value::from(value))
    }

    /// A variable reference.
    #[must_use]
    pub fn var(var: &Var) -> Self {
        Expr::Var(var.clone())
    }

    /// `var.property`.
    #[must_use]
    pub fn property(var: &Var, property: impl Into<String>) -> Self {
        Expr::Property(Box::new(Expr::Var(var.clone())), property.into())
    }

    /// `self.key`.
    #[must_use]
    pub fn dot(self, key: impl Into<String>) -> Self {
        Expr::Property(Box::new(self), key.into())
    }

    /// A comparison.
    #[must_use]
    pub fn compare(left: Expr, op: CompareOp, right: Expr) -> Self {
        Expr::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// An arithmetic expression.
    #[must_use]
    pub fn arithmetic(left: Expr, op: ArithmeticOp, right: Expr) -> Self {
        Expr::Arithmetic {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// A scalar function call.
    #[must_use]
    pub fn function(name: &'static str, args: Vec<Expr>) -> Self {
        Expr::Function { name, args }
    }

    /// An aggregate call.
    #[must_use]
    pub fn aggregate(function: AggregateFunction, arg: Expr, distinct: bool) -> Self {
        Expr::Aggregate {
            function,
            arg: Box::new(arg),
            distinct,
        }
    }

    /// `collect(expr)`.
    #[must_use]
    pub fn collect(arg: Expr) -> Self {
        Self::aggregate(AggregateFunction::Collect, arg, false)
    }

    /// Returns the boolean constant, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Expr::Literal(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Conjunction with constant folding: `true` operands are dropped, a
    /// `false` operand wins, nested conjunctions are flattened.
    #[must_use]
    pub fn and(items: impl IntoIterator<Item = Expr>) -> Self {
        let mut out = Vec::new();
        for item in items {
            match item {
                Expr::Literal(Value::Bool(true)) => {}
                Expr::Literal(Value::Bool(false)) => return Expr::bool(false),
                Expr::And(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Expr::bool(true),
            1 => out.pop().unwrap_or_else(|| Expr::bool(true)),
            _ => Expr::And(out),
        }
    }

    /// Disjunction with constant folding.
    #[must_use]
    pub fn or(items: impl IntoIterator<Item = Expr>) -> Self {
        let mut out = Vec::new();
        for item in items {
            match item {
                Expr::Literal(Value::Bool(false)) => {}
                Expr::Literal(Value::Bool(true)) => return Expr::bool(true),
                Expr::Or(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Expr::bool(false),
            1 => out.pop().unwrap_or_else(|| Expr::bool(false)),
            _ => Expr::Or(out),
        }
    }

    /// Negation with constant folding.
    #[must_use]
    pub fn not(expr: Expr) -> Self {
        match expr {
            Expr::Literal(Value::Bool(b)) => Expr::bool(!b),
            Expr::Not(inner) => *inner,
            other => Expr::Not(Box::new(other)),
        }
    }

    /// `self IS NULL`.
    #[must_use]
    pub fn is_null(self) -> Self {
        Expr::IsNull(Box::new(self))
    }

    /// `self IS NOT NULL`.
    #[must_use]
    pub fn is_not_null(self) -> Self {
        Expr::IsNotNull(Box::new(self))
    }

    /// Returns the predicate, or `None` when it folds to `true`.
    #[must_use]
    pub fn into_predicate(self) -> Option<Expr> {
        if self.as_bool() == Some(true) {
            None
        } else {
            Some(self)
        }
    }
}
