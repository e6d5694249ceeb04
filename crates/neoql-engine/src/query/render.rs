//! Renders a builder tree into Cypher text and its parameter map.
//!
//! Rendering is one depth-first pass. Alongside the text the renderer keeps
//! a stack of scopes mirroring the statement's variable visibility, and
//! rejects trees that reference a variable nothing bound, bind a name
//! already allocated in the enclosing scope chain, or bind one parameter
//! name to two values. Those are translator bugs, reported as
//! [`BuilderError`].

use super::plan::{
    CallClause, Clause, Expr, MapEntry, MatchClause, MergeClause, NodePattern, Pattern,
    PatternDirection, ProjectionItem, RelPattern, SetItem, SubPattern, Var, WithClause,
};
use neoql_common::types::{ParameterMap, Value};
use neoql_common::utils::error::BuilderError;
use neoql_common::utils::hash::FxHashSet;
use neoql_core::schema::attribute::is_identifier;

/// Rendered statement text and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    /// Statement text.
    pub text: String,
    /// Bound parameters, in first-use order.
    pub params: ParameterMap,
}

/// Renders builder trees.
#[derive(Debug, Clone)]
pub struct Renderer {
    indent: usize,
}

impl Renderer {
    /// Creates a renderer with four-space indentation.
    #[must_use]
    pub fn new() -> Self {
        Self { indent: 4 }
    }

    /// Sets the indentation width of sub-call bodies.
    #[must_use]
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Renders a statement.
    ///
    /// # Errors
    ///
    /// Returns a [`BuilderError`] if the tree is malformed.
    pub fn render(&self, statement: &super::plan::Statement) -> Result<Rendered> {
        let mut state = State {
            indent: self.indent,
            depth: 0,
            lines: Vec::new(),
            params: ParameterMap::new(),
            scopes: vec![Scope::default()],
        };
        state.clauses(&statement.clauses)?;
        Ok(Rendered {
            text: state.lines.join("\n"),
            params: state.params,
        })
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct Scope {
    /// Names usable at the current point.
    visible: FxHashSet<String>,
    /// Every name bound in this scope so far, visible or not.
    allocated: FxHashSet<String>,
}

struct State {
    indent: usize,
    depth: usize,
    lines: Vec<String>,
    params: ParameterMap,
    scopes: Vec<Scope>,
}

type Result<T> = std::result::Result<T, BuilderError>;

impl State {
    fn line(&mut self, text: impl AsRef<str>) {
        let pad = " ".repeat(self.indent * self.depth);
        self.lines.push(format!("{pad}{}", text.as_ref()));
    }

    fn scope(&self) -> &Scope {
        // The root scope is never popped.
        &self.scopes[self.scopes.len() - 1]
    }

    fn scope_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn is_visible(&self, name: &str) -> bool {
        self.scope().visible.contains(name)
    }

    fn reference(&self, var: &Var, context: &'static str) -> Result<()> {
        if self.is_visible(var.name()) {
            Ok(())
        } else {
            Err(BuilderError::UnboundVariable {
                name: var.name().to_string(),
                context,
            })
        }
    }

    fn bind(&mut self, name: &str, context: &'static str) -> Result<()> {
        let taken = self.is_visible(name) || self.scopes.iter().any(|s| s.allocated.contains(name));
        if taken {
            return Err(BuilderError::ConflictingName {
                name: name.to_string(),
                context,
            });
        }
        let scope = self.scope_mut();
        scope.allocated.insert(name.to_string());
        scope.visible.insert(name.to_string());
        Ok(())
    }

    /// Pattern variables refer to visible bindings or introduce new ones.
    fn bind_or_reference(&mut self, var: &Var, context: &'static str) -> Result<()> {
        if self.is_visible(var.name()) {
            Ok(())
        } else {
            self.bind(var.name(), context)
        }
    }

    fn push_inherited(&mut self) {
        let visible = self.scope().visible.clone();
        self.scopes.push(Scope {
            visible,
            allocated: FxHashSet::default(),
        });
    }

    // === Clauses ===

    /// Renders a clause list and returns the columns it exports.
    fn clauses(&mut self, clauses: &[Clause]) -> Result<Vec<String>> {
        let mut after_update = false;
        for clause in clauses {
            if after_update && matches!(clause, Clause::Match(_) | Clause::Unwind(_) | Clause::Call(_)) {
                self.line("WITH *");
            }
            after_update = clause.is_update();
            self.clause(clause)?;
        }
        Ok(match clauses.last() {
            Some(Clause::Return(ret)) => ret
                .items
                .iter()
                .filter_map(ProjectionItem::output)
                .map(|v| v.name().to_string())
                .collect(),
            Some(Clause::Raw(raw)) => raw.binds.iter().map(|v| v.name().to_string()).collect(),
            _ => Vec::new(),
        })
    }

    fn clause(&mut self, clause: &Clause) -> Result<()> {
        match clause {
            Clause::Match(m) => self.match_clause(m),
            Clause::Unwind(u) => {
                let list = self.expr(&u.expr)?;
                self.bind(u.var.name(), "UNWIND")?;
                self.line(format!("UNWIND {list} AS {}", u.var));
                Ok(())
            }
            Clause::With(w) => self.with_clause(w),
            Clause::Call(c) => self.call_clause(c),
            Clause::Create(c) => {
                let pattern = self.pattern(&c.pattern, "CREATE")?;
                self.line(format!("CREATE {pattern}"));
                Ok(())
            }
            Clause::Merge(m) => self.merge_clause(m),
            Clause::Set(s) => {
                let items = self.set_items(&s.items)?;
                self.line(format!("SET {items}"));
                Ok(())
            }
            Clause::Delete(d) => {
                for var in &d.vars {
                    self.reference(var, "DELETE")?;
                }
                let names: Vec<&str> = d.vars.iter().map(Var::name).collect();
                let keyword = if d.detach { "DETACH DELETE" } else { "DELETE" };
                self.line(format!("{keyword} {}", names.join(", ")));
                Ok(())
            }
            Clause::Validate(v) => {
                let predicate = self.expr(&v.predicate)?;
                let tag = literal(&Value::from(v.tag.as_str()));
                self.line("WITH *");
                self.line(format!(
                    "WHERE apoc.util.validatePredicate(NOT ({predicate}), {tag}, [0])"
                ));
                Ok(())
            }
            Clause::Return(r) => {
                let items = self.projection(&r.items, "RETURN")?;
                let distinct = if r.distinct { "DISTINCT " } else { "" };
                self.line(format!("RETURN {distinct}{items}"));
                Ok(())
            }
            Clause::Raw(raw) => {
                for text in raw.text.lines() {
                    self.line(text.trim_end());
                }
                for var in &raw.binds {
                    self.bind(var.name(), "raw statement")?;
                }
                Ok(())
            }
        }
    }

    fn match_clause(&mut self, m: &MatchClause) -> Result<()> {
        let pattern = self.pattern(&m.pattern, "MATCH")?;
        let keyword = if m.optional { "OPTIONAL MATCH" } else { "MATCH" };
        self.line(format!("{keyword} {pattern}"));
        if let Some(predicate) = &m.predicate {
            let predicate = self.expr(predicate)?;
            self.line(format!("WHERE {predicate}"));
        }
        Ok(())
    }

    fn with_clause(&mut self, w: &WithClause) -> Result<()> {
        let mut parts = Vec::with_capacity(w.items.len() + 1);
        if w.star {
            parts.push("*".to_string());
        }
        let items = self.projection(&w.items, "WITH")?;
        if !items.is_empty() {
            parts.push(items);
        }
        if !w.star {
            let outputs: FxHashSet<String> = w
                .items
                .iter()
                .filter_map(ProjectionItem::output)
                .map(|v| v.name().to_string())
                .collect();
            self.scope_mut().visible = outputs;
        }

        let distinct = if w.distinct { "DISTINCT " } else { "" };
        self.line(format!("WITH {distinct}{}", parts.join(", ")));

        if !w.order_by.is_empty() {
            let mut keys = Vec::with_capacity(w.order_by.len());
            for item in &w.order_by {
                let expr = self.expr(&item.expr)?;
                let dir = if item.descending { "DESC" } else { "ASC" };
                keys.push(format!("{expr} {dir}"));
            }
            self.line(format!("ORDER BY {}", keys.join(", ")));
        }
        if let Some(skip) = &w.skip {
            let skip = self.expr(skip)?;
            self.line(format!("SKIP {skip}"));
        }
        if let Some(limit) = &w.limit {
            let limit = self.expr(limit)?;
            self.line(format!("LIMIT {limit}"));
        }
        if let Some(predicate) = &w.predicate {
            let predicate = self.expr(predicate)?;
            self.line(format!("WHERE {predicate}"));
        }
        Ok(())
    }

    /// Renders projection items, then binds their aliases.
    fn projection(&mut self, items: &[ProjectionItem], context: &'static str) -> Result<String> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let expr = self.expr(&item.expr)?;
            match &item.alias {
                Some(alias) => parts.push(format!("{expr} AS {alias}")),
                None => parts.push(expr),
            }
        }
        for alias in items.iter().filter_map(|i| i.alias.as_ref()) {
            self.bind(alias.name(), context)?;
        }
        Ok(parts.join(", "))
    }

    fn call_clause(&mut self, call: &CallClause) -> Result<()> {
        if call.branches.is_empty() {
            return Err(BuilderError::EmptyUnion { context: "CALL" });
        }
        for var in &call.imports {
            self.reference(var, "CALL import")?;
        }
        let imports: Vec<&str> = call.imports.iter().map(Var::name).collect();

        self.line("CALL {");
        self.depth += 1;
        let mut exported: Option<Vec<String>> = None;
        for (i, branch) in call.branches.iter().enumerate() {
            if i > 0 {
                self.line("UNION ALL");
            }
            self.scopes.push(Scope {
                visible: imports.iter().map(|s| (*s).to_string()).collect(),
                allocated: FxHashSet::default(),
            });
            if !imports.is_empty() {
                self.line(format!("WITH {}", imports.join(", ")));
            }
            let columns = self.clauses(branch);
            self.scopes.pop();
            let columns = columns?;
            match &exported {
                None => exported = Some(columns),
                Some(previous) if *previous != columns => {
                    let name = columns
                        .iter()
                        .find(|c| !previous.contains(c))
                        .or_else(|| previous.first())
                        .cloned()
                        .unwrap_or_default();
                    return Err(BuilderError::ConflictingName {
                        name,
                        context: "union branches return different columns",
                    });
                }
                Some(_) => {}
            }
        }
        self.depth -= 1;
        self.line("}");

        for column in exported.unwrap_or_default() {
            self.bind(&column, "CALL result")?;
        }
        Ok(())
    }

    fn merge_clause(&mut self, m: &MergeClause) -> Result<()> {
        let pattern = self.pattern(&m.pattern, "MERGE")?;
        self.line(format!("MERGE {pattern}"));
        if !m.on_create.is_empty() {
            let items = self.set_items(&m.on_create)?;
            self.line(format!("ON CREATE SET {items}"));
        }
        if !m.on_match.is_empty() {
            let items = self.set_items(&m.on_match)?;
            self.line(format!("ON MATCH SET {items}"));
        }
        Ok(())
    }

    fn set_items(&mut self, items: &[SetItem]) -> Result<String> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            self.reference(&item.target, "SET")?;
            let value = self.expr(&item.value)?;
            parts.push(format!("{}.{} = {value}", item.target, ident(&item.property)));
        }
        Ok(parts.join(", "))
    }

    // === Patterns ===

    fn pattern(&mut self, pattern: &Pattern, context: &'static str) -> Result<String> {
        let mut out = self.node_pattern(&pattern.start, context)?;
        for hop in &pattern.hops {
            out.push_str(&self.rel_pattern(&hop.rel, context)?);
            out.push_str(&self.node_pattern(&hop.node, context)?);
        }
        Ok(out)
    }

    fn node_pattern(&mut self, node: &NodePattern, context: &'static str) -> Result<String> {
        let properties = self.inline_properties(&node.properties)?;
        let mut out = String::from("(");
        if let Some(var) = &node.var {
            self.bind_or_reference(var, context)?;
            out.push_str(var.name());
        }
        for label in &node.labels {
            out.push(':');
            out.push_str(&ident(label));
        }
        out.push_str(&properties);
        out.push(')');
        Ok(out)
    }

    fn rel_pattern(&mut self, rel: &RelPattern, context: &'static str) -> Result<String> {
        let properties = self.inline_properties(&rel.properties)?;
        let mut inner = String::new();
        if let Some(var) = &rel.var {
            self.bind_or_reference(var, context)?;
            inner.push_str(var.name());
        }
        inner.push(':');
        inner.push_str(&ident(&rel.rel_type));
        inner.push_str(&properties);
        Ok(match rel.direction {
            PatternDirection::Out => format!("-[{inner}]->"),
            PatternDirection::In => format!("<-[{inner}]-"),
            PatternDirection::Both => format!("-[{inner}]-"),
        })
    }

    fn inline_properties(&mut self, properties: &[(String, Expr)]) -> Result<String> {
        if properties.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(properties.len());
        for (key, value) in properties {
            parts.push(format!("{}: {}", ident(key), self.expr(value)?));
        }
        Ok(format!(" {{ {} }}", parts.join(", ")))
    }

    fn sub_pattern(&mut self, keyword: &str, sub: &SubPattern) -> Result<String> {
        self.push_inherited();
        let rendered = self.sub_pattern_body(sub);
        self.scopes.pop();
        Ok(format!("{keyword} {{ {} }}", rendered?))
    }

    fn sub_pattern_body(&mut self, sub: &SubPattern) -> Result<String> {
        let pattern = self.pattern(&sub.pattern, "subquery pattern")?;
        Ok(match &sub.predicate {
            Some(predicate) => format!("MATCH {pattern} WHERE {}", self.expr(predicate)?),
            None => format!("MATCH {pattern}"),
        })
    }

    // === Expressions ===

    fn expr(&mut self, expr: &Expr) -> Result<String> {
        Ok(match expr {
            Expr::Literal(value) => literal(value),
            Expr::Param(param) => {
                self.params.bind(&param.name, &param.value)?;
                format!("${}", param.name)
            }
            Expr::Var(var) => {
                self.reference(var, "expression")?;
                var.name().to_string()
            }
            Expr::Property(base, key) => format!("{}.{}", self.atom(base)?, ident(key)),
            Expr::Map(entries) => {
                if entries.is_empty() {
                    "{}".to_string()
                } else {
                    let mut parts = Vec::with_capacity(entries.len());
                    for (key, value) in entries {
                        parts.push(format!("{}: {}", ident(key), self.expr(value)?));
                    }
                    format!("{{ {} }}", parts.join(", "))
                }
            }
            Expr::MapProjection { var, entries } => {
                self.reference(var, "map projection")?;
                if entries.is_empty() {
                    format!("{var} {{}}")
                } else {
                    let mut parts = Vec::with_capacity(entries.len());
                    for entry in entries {
                        parts.push(match entry {
                            MapEntry::Shorthand(property) => format!(".{}", ident(property)),
                            MapEntry::Keyed(key, value) => {
                                format!("{}: {}", ident(key), self.expr(value)?)
                            }
                        });
                    }
                    format!("{var} {{ {} }}", parts.join(", "))
                }
            }
            Expr::List(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(self.expr(item)?);
                }
                format!("[{}]", parts.join(", "))
            }
            Expr::Compare { left, op, right } => {
                format!("{} {} {}", self.operand(left)?, op.as_str(), self.operand(right)?)
            }
            Expr::Arithmetic { left, op, right } => {
                format!("{} {} {}", self.operand(left)?, op.as_str(), self.operand(right)?)
            }
            Expr::And(items) => self.junction(items, " AND ", "true", |e| matches!(e, Expr::Or(_)))?,
            Expr::Or(items) => self.junction(items, " OR ", "false", |e| matches!(e, Expr::And(_)))?,
            Expr::Not(inner) => format!("NOT ({})", self.expr(inner)?),
            Expr::IsNull(inner) => format!("{} IS NULL", self.operand(inner)?),
            Expr::IsNotNull(inner) => format!("{} IS NOT NULL", self.operand(inner)?),
            Expr::HasLabels { var, labels } => {
                self.reference(var, "label predicate")?;
                let labels: Vec<String> = labels.iter().map(|l| ident(l)).collect();
                format!("{var}:{}", labels.join(":"))
            }
            Expr::Function { name, args } => {
                let mut parts = Vec::with_capacity(args.len());
                for arg in args {
                    parts.push(self.expr(arg)?);
                }
                format!("{name}({})", parts.join(", "))
            }
            Expr::Aggregate {
                function,
                arg,
                distinct,
            } => {
                let distinct = if *distinct { "DISTINCT " } else { "" };
                format!("{}({distinct}{})", function.as_str(), self.expr(arg)?)
            }
            Expr::Exists(sub) => self.sub_pattern("EXISTS", sub)?,
            Expr::Count(sub) => self.sub_pattern("COUNT", sub)?,
            Expr::Case { whens, otherwise } => {
                let mut out = String::from("CASE");
                for (condition, result) in whens {
                    out.push_str(&format!(
                        " WHEN {} THEN {}",
                        self.expr(condition)?,
                        self.expr(result)?
                    ));
                }
                if let Some(otherwise) = otherwise {
                    out.push_str(&format!(" ELSE {}", self.expr(otherwise)?));
                }
                out.push_str(" END");
                out
            }
            Expr::ListComprehension {
                var,
                list,
                filter,
                map,
            } => {
                let list = self.expr(list)?;
                self.push_inherited();
                let body = self.comprehension_body(var, filter.as_deref(), map.as_deref());
                self.scopes.pop();
                format!("[{var} IN {list}{}]", body?)
            }
            Expr::Reduce {
                acc,
                init,
                var,
                list,
                expr,
            } => {
                let init = self.expr(init)?;
                let list = self.expr(list)?;
                self.push_inherited();
                let step = self.reduce_step(acc, var, expr);
                self.scopes.pop();
                format!("reduce({acc} = {init}, {var} IN {list} | {})", step?)
            }
            Expr::Slice { list, from, to } => {
                let list = self.atom(list)?;
                let from = match from {
                    Some(e) => self.expr(e)?,
                    None => String::new(),
                };
                let to = match to {
                    Some(e) => self.expr(e)?,
                    None => String::new(),
                };
                format!("{list}[{from}..{to}]")
            }
        })
    }

    fn comprehension_body(&mut self, var: &Var, filter: Option<&Expr>, map: Option<&Expr>) -> Result<String> {
        self.bind(var.name(), "list comprehension")?;
        let mut out = String::new();
        if let Some(filter) = filter {
            out.push_str(&format!(" WHERE {}", self.expr(filter)?));
        }
        if let Some(map) = map {
            out.push_str(&format!(" | {}", self.expr(map)?));
        }
        Ok(out)
    }

    fn reduce_step(&mut self, acc: &Var, var: &Var, expr: &Expr) -> Result<String> {
        self.bind(acc.name(), "reduce")?;
        self.bind(var.name(), "reduce")?;
        self.expr(expr)
    }

    fn junction(
        &mut self,
        items: &[Expr],
        separator: &str,
        empty: &str,
        needs_parens: fn(&Expr) -> bool,
    ) -> Result<String> {
        if items.is_empty() {
            return Ok(empty.to_string());
        }
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let text = self.expr(item)?;
            parts.push(if needs_parens(item) { format!("({text})") } else { text });
        }
        Ok(parts.join(separator))
    }

    /// An operand of a binary operator.
    fn operand(&mut self, expr: &Expr) -> Result<String> {
        let text = self.expr(expr)?;
        Ok(match expr {
            Expr::Compare { .. }
            | Expr::Arithmetic { .. }
            | Expr::And(_)
            | Expr::Or(_)
            | Expr::Not(_)
            | Expr::IsNull(_)
            | Expr::IsNotNull(_)
            | Expr::HasLabels { .. } => format!("({text})"),
            _ => text,
        })
    }

    /// The base of a property access or slice.
    fn atom(&mut self, expr: &Expr) -> Result<String> {
        let text = self.expr(expr)?;
        Ok(match expr {
            Expr::Var(_)
            | Expr::Param(_)
            | Expr::Property(..)
            | Expr::Function { .. }
            | Expr::Aggregate { .. }
            | Expr::List(_)
            | Expr::Slice { .. } => text,
            _ => format!("({text})"),
        })
    }
}

/// Quotes a name unless it is a plain identifier.
fn ident(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// Renders a constant.
fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int64(i) => i.to_string(),
        Value::Float64(f) => format!("{f:?}"),
        Value::String(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
            out
        }
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Map(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", ident(k), literal(v)))
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::plan::{
        DeleteClause, ReturnClause, SetClause, Statement, UnwindClause, ValidateClause,
    };
    use super::*;
    use std::sync::Arc;

    fn v(name: &str) -> Var {
        Var::new(name)
    }

    fn param(name: &str, value: Value) -> Expr {
        Expr::Param(super::super::plan::Param {
            name: Arc::from(name),
            value,
        })
    }

    fn node(var: &str, label: &str) -> NodePattern {
        NodePattern::labeled(&v(var), &[label.to_string()])
    }

    fn render(clauses: Vec<Clause>) -> std::result::Result<Rendered, BuilderError> {
        Renderer::new().render(&Statement::new(clauses))
    }

    #[test]
    fn test_match_return() {
        let rendered = render(vec![
            Clause::Match(MatchClause::new(
                Pattern::node(node("this0", "Movie")),
                Some(Expr::compare(
                    Expr::property(&v("this0"), "title"),
                    super::super::plan::CompareOp::Eq,
                    param("param0", Value::from("Forrest Gump")),
                )),
            )),
            Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                Expr::MapProjection {
                    var: v("this0"),
                    entries: vec![MapEntry::Shorthand("title".into())],
                },
                &v("this"),
            ))),
        ])
        .unwrap();

        assert_eq!(
            rendered.text,
            "MATCH (this0:Movie)\nWHERE this0.title = $param0\nRETURN this0 { .title } AS this"
        );
        assert_eq!(rendered.params.get("param0"), Some(&Value::from("Forrest Gump")));
    }

    #[test]
    fn test_call_imports_and_exports() {
        let rel = RelPattern {
            var: Some(v("edge1")),
            rel_type: "ACTED_IN".into(),
            direction: PatternDirection::In,
            properties: Vec::new(),
        };
        let rendered = render(vec![
            Clause::Match(MatchClause::new(Pattern::node(node("this0", "Movie")), None)),
            Clause::Call(CallClause::new(
                vec![v("this0")],
                vec![
                    Clause::Match(MatchClause::new(
                        Pattern::node(NodePattern::var(&v("this0"))).hop(rel, node("this2", "Actor")),
                        None,
                    )),
                    Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                        Expr::collect(Expr::var(&v("this2"))),
                        &v("var3"),
                    ))),
                ],
            )),
            Clause::Return(ReturnClause::single(ProjectionItem::var(&v("var3")))),
        ])
        .unwrap();

        let expected = "\
MATCH (this0:Movie)
CALL {
    WITH this0
    MATCH (this0)<-[edge1:ACTED_IN]-(this2:Actor)
    RETURN collect(this2) AS var3
}
RETURN var3";
        assert_eq!(rendered.text, expected);
    }

    #[test]
    fn test_call_body_cannot_see_unimported() {
        let err = render(vec![
            Clause::Match(MatchClause::new(Pattern::node(node("this0", "Movie")), None)),
            Clause::Call(CallClause::new(
                Vec::new(),
                vec![Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                    Expr::property(&v("this0"), "title"),
                    &v("var1"),
                )))],
            )),
        ])
        .unwrap_err();
        assert!(matches!(err, BuilderError::UnboundVariable { name, .. } if name == "this0"));
    }

    #[test]
    fn test_rebinding_in_descendant_scope() {
        let err = render(vec![
            Clause::Match(MatchClause::new(Pattern::node(node("this0", "Movie")), None)),
            Clause::With(WithClause::items(vec![ProjectionItem::aliased(
                Expr::property(&v("this0"), "title"),
                &v("var1"),
            )])),
            // `this0` is no longer visible but was allocated in the chain.
            Clause::Call(CallClause::new(
                Vec::new(),
                vec![Clause::Match(MatchClause::new(Pattern::node(node("this0", "Actor")), None))],
            )),
        ])
        .unwrap_err();
        assert!(matches!(err, BuilderError::ConflictingName { name, .. } if name == "this0"));
    }

    #[test]
    fn test_empty_union() {
        let err = render(vec![Clause::Call(CallClause::union(Vec::new(), Vec::new()))]).unwrap_err();
        assert_eq!(err, BuilderError::EmptyUnion { context: "CALL" });
    }

    #[test]
    fn test_union_branches_share_columns() {
        let branch = |var: &str, label: &str, out: &str| {
            vec![
                Clause::Match(MatchClause::new(Pattern::node(node(var, label)), None)),
                Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                    Expr::var(&v(var)),
                    &v(out),
                ))),
            ]
        };
        let rendered = render(vec![
            Clause::Call(CallClause::union(
                Vec::new(),
                vec![branch("this0", "Movie", "var2"), branch("this1", "Series", "var2")],
            )),
            Clause::Return(ReturnClause::single(ProjectionItem::var(&v("var2")))),
        ])
        .unwrap();
        assert!(rendered.text.contains("    RETURN this0 AS var2\n    UNION ALL\n    MATCH (this1:Series)"));

        let err = render(vec![Clause::Call(CallClause::union(
            Vec::new(),
            vec![branch("this0", "Movie", "var2"), branch("this1", "Series", "var3")],
        ))])
        .unwrap_err();
        assert!(matches!(err, BuilderError::ConflictingName { .. }));
    }

    #[test]
    fn test_parameter_bound_twice() {
        let ok = render(vec![
            Clause::Unwind(UnwindClause {
                expr: param("jwt", Value::from("a")),
                var: v("var0"),
            }),
            Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                param("jwt", Value::from("a")),
                &v("var1"),
            ))),
        ]);
        assert!(ok.is_ok());

        let err = render(vec![
            Clause::Unwind(UnwindClause {
                expr: param("param0", Value::from("a")),
                var: v("var0"),
            }),
            Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                param("param0", Value::from("b")),
                &v("var1"),
            ))),
        ])
        .unwrap_err();
        assert!(matches!(err, BuilderError::ConflictingName { name, .. } if name == "param0"));
    }

    #[test]
    fn test_update_then_read_inserts_with() {
        let rendered = render(vec![
            Clause::Match(MatchClause::new(Pattern::node(node("this0", "Movie")), None)),
            Clause::Set(SetClause {
                items: vec![SetItem::new(&v("this0"), "title", param("param0", Value::from("x")))],
            }),
            Clause::Validate(ValidateClause {
                predicate: Expr::bool(true),
                tag: "@neoql/FORBIDDEN type=Movie op=UPDATE when=AFTER".into(),
            }),
            Clause::Match(MatchClause::new(Pattern::node(node("this1", "Actor")), None)),
            Clause::Delete(DeleteClause {
                detach: true,
                vars: vec![v("this1")],
            }),
        ])
        .unwrap();
        let expected = "\
MATCH (this0:Movie)
SET this0.title = $param0
WITH *
WHERE apoc.util.validatePredicate(NOT (true), \"@neoql/FORBIDDEN type=Movie op=UPDATE when=AFTER\", [0])
MATCH (this1:Actor)
DETACH DELETE this1";
        assert_eq!(rendered.text, expected);
    }

    #[test]
    fn test_expression_precedence() {
        let a = Expr::property(&v("this0"), "a");
        let rendered = render(vec![
            Clause::Match(MatchClause::new(Pattern::node(node("this0", "Movie")), None)),
            Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                Expr::And(vec![
                    Expr::Or(vec![a.is_null(), Expr::bool(false)]),
                    Expr::not(Expr::HasLabels {
                        var: v("this0"),
                        labels: vec!["Old Movie".into()],
                    }),
                ]),
                &v("var1"),
            ))),
        ])
        .unwrap();
        assert!(rendered.text.ends_with(
            "RETURN (this0.a IS NULL OR false) AND NOT (this0:`Old Movie`) AS var1"
        ));
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal(&Value::from("say \"hi\"")), r#""say \"hi\"""#);
        assert_eq!(literal(&Value::Float64(2.0)), "2.0");
        assert_eq!(literal(&Value::Null), "NULL");
        assert_eq!(ident("a-b"), "`a-b`");
    }
}
