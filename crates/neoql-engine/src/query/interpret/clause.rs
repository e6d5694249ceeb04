//! Clause execution over materialized row sets.

use super::expr::{contains_aggregate, sort_order, truth};
use super::{Datum, InterpretError, InterpretResult, Interpreter, Row};
use crate::query::plan::{
    CallClause, Clause, DeleteClause, Expr, MatchClause, MergeClause, ProjectionItem, SetItem, WithClause,
};
use std::cmp::Ordering;

/// Rows produced by a clause sequence, with the returned columns when the
/// sequence ended in `RETURN`.
type Output = (Vec<Row>, Option<Vec<String>>);

impl Interpreter<'_> {
    pub(super) fn clauses(&self, clauses: &[Clause], mut rows: Vec<Row>) -> InterpretResult<Output> {
        let mut columns = None;
        for clause in clauses {
            columns = None;
            rows = match clause {
                Clause::Match(clause) => self.match_clause(clause, rows)?,
                Clause::Unwind(clause) => {
                    let mut out = Vec::new();
                    for row in rows {
                        let items = match self.eval(&clause.expr, &row, None)? {
                            Datum::List(items) => items,
                            d if d.is_null() => Vec::new(),
                            scalar => vec![scalar],
                        };
                        for item in items {
                            let mut extended = row.clone();
                            extended.insert(clause.var.name().to_string(), item);
                            out.push(extended);
                        }
                    }
                    out
                }
                Clause::With(clause) => self.with_clause(clause, rows)?,
                Clause::Call(clause) => self.call(clause, rows)?,
                Clause::Create(clause) => {
                    for row in &mut rows {
                        self.create_pattern(&clause.pattern, row)?;
                    }
                    rows
                }
                Clause::Merge(clause) => self.merge(clause, rows)?,
                Clause::Set(clause) => {
                    for row in &rows {
                        self.set(&clause.items, row)?;
                    }
                    rows
                }
                Clause::Delete(clause) => {
                    for row in &rows {
                        self.delete(clause, row)?;
                    }
                    rows
                }
                Clause::Validate(clause) => {
                    for row in &rows {
                        if truth(&self.eval(&clause.predicate, row, None)?)? == Some(false) {
                            return Err(Self::forbidden(&clause.tag));
                        }
                    }
                    rows
                }
                Clause::Return(clause) => {
                    let names = output_names(&clause.items)?;
                    let mut projected: Vec<Row> = self
                        .project(&clause.items, rows)?
                        .into_iter()
                        .map(|(_, row)| row)
                        .collect();
                    if clause.distinct {
                        dedup(&mut projected);
                    }
                    columns = Some(names);
                    projected
                }
                Clause::Raw(_) => {
                    return Err(InterpretError::Unsupported("raw statement text".to_string()));
                }
            };
        }
        Ok((rows, columns))
    }

    fn match_clause(&self, clause: &MatchClause, rows: Vec<Row>) -> InterpretResult<Vec<Row>> {
        let mut out = Vec::new();
        for row in rows {
            let mut found = false;
            for candidate in self.match_pattern(&clause.pattern, &row)? {
                let keep = match &clause.predicate {
                    Some(predicate) => truth(&self.eval(predicate, &candidate, None)?)? == Some(true),
                    None => true,
                };
                if keep {
                    found = true;
                    out.push(candidate);
                }
            }
            if clause.optional && !found {
                let mut row = row;
                for var in clause.pattern.vars() {
                    row.entry(var.name().to_string()).or_insert(Datum::NULL);
                }
                out.push(row);
            }
        }
        Ok(out)
    }

    fn with_clause(&self, clause: &WithClause, rows: Vec<Row>) -> InterpretResult<Vec<Row>> {
        // Sort keys may name variables the projection drops, so each output
        // row keeps the scope it was sorted in.
        let mut scoped: Vec<(Row, Row)> = if clause.star {
            let mut out = Vec::with_capacity(rows.len());
            for mut row in rows {
                for item in &clause.items {
                    let name = item_name(item)?;
                    let value = self.eval(&item.expr, &row, None)?;
                    row.insert(name, value);
                }
                out.push((row.clone(), row));
            }
            out
        } else {
            self.project(&clause.items, rows)?
        };

        if clause.distinct {
            let mut seen: Vec<Row> = Vec::new();
            scoped.retain(|(_, row)| {
                if seen.contains(row) {
                    false
                } else {
                    seen.push(row.clone());
                    true
                }
            });
        }

        if !clause.order_by.is_empty() {
            let mut keyed = Vec::with_capacity(scoped.len());
            for (scope, row) in scoped {
                let mut keys = Vec::with_capacity(clause.order_by.len());
                for item in &clause.order_by {
                    keys.push(self.eval(&item.expr, &scope, None)?);
                }
                keyed.push((keys, scope, row));
            }
            keyed.sort_by(|(a, ..), (b, ..)| {
                for ((x, y), item) in a.iter().zip(b).zip(&clause.order_by) {
                    let ordering = sort_order(x, y);
                    let ordering = if item.descending { ordering.reverse() } else { ordering };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
            scoped = keyed.into_iter().map(|(_, scope, row)| (scope, row)).collect();
        }

        let skip = self.count(clause.skip.as_ref())?.unwrap_or(0);
        let limit = self.count(clause.limit.as_ref())?.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        for (_, row) in scoped.into_iter().skip(skip).take(limit) {
            let keep = match &clause.predicate {
                Some(predicate) => truth(&self.eval(predicate, &row, None)?)? == Some(true),
                None => true,
            };
            if keep {
                out.push(row);
            }
        }
        Ok(out)
    }

    /// Evaluates a `SKIP` or `LIMIT` amount.
    fn count(&self, expr: Option<&Expr>) -> InterpretResult<Option<usize>> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.eval(expr, &Row::new(), None)? {
            Datum::Value(value) => match value.as_i64().and_then(|n| usize::try_from(n).ok()) {
                Some(n) => Ok(Some(n)),
                None if value.is_null() => Ok(None),
                None => Err(InterpretError::TypeMismatch {
                    expected: "non-negative integer",
                    found: value.to_string(),
                }),
            },
            other => Err(InterpretError::TypeMismatch {
                expected: "non-negative integer",
                found: other.describe(),
            }),
        }
    }

    /// Projects rows, grouping by the non-aggregate items when any item
    /// aggregates. Returns each projected row with the scope sort keys are
    /// evaluated in.
    fn project(&self, items: &[ProjectionItem], rows: Vec<Row>) -> InterpretResult<Vec<(Row, Row)>> {
        let names = output_names(items)?;
        if !items.iter().any(|item| contains_aggregate(&item.expr)) {
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let mut projected = Row::with_capacity(items.len());
                for (item, name) in items.iter().zip(&names) {
                    projected.insert(name.clone(), self.eval(&item.expr, &row, None)?);
                }
                let mut scope = row;
                scope.extend(projected.iter().map(|(k, v)| (k.clone(), v.clone())));
                out.push((scope, projected));
            }
            return Ok(out);
        }

        let keys: Vec<usize> = (0..items.len())
            .filter(|&i| !contains_aggregate(&items[i].expr))
            .collect();
        let mut groups: Vec<(Vec<Datum>, Vec<Row>)> = Vec::new();
        for row in rows {
            let mut values = Vec::with_capacity(keys.len());
            for &i in &keys {
                values.push(self.eval(&items[i].expr, &row, None)?);
            }
            match groups.iter_mut().find(|(existing, _)| *existing == values) {
                Some((_, members)) => members.push(row),
                None => groups.push((values, vec![row])),
            }
        }
        if groups.is_empty() && keys.is_empty() {
            groups.push((Vec::new(), Vec::new()));
        }

        let mut out = Vec::with_capacity(groups.len());
        for (values, members) in groups {
            let representative = members.first().cloned().unwrap_or_default();
            let mut key_values = values.into_iter();
            let mut projected = Row::with_capacity(items.len());
            for (i, (item, name)) in items.iter().zip(&names).enumerate() {
                let value = if keys.contains(&i) {
                    key_values.next().unwrap_or(Datum::NULL)
                } else {
                    self.eval(&item.expr, &representative, Some(members.as_slice()))?
                };
                projected.insert(name.clone(), value);
            }
            out.push((projected.clone(), projected));
        }
        Ok(out)
    }

    fn call(&self, clause: &CallClause, rows: Vec<Row>) -> InterpretResult<Vec<Row>> {
        let mut out = Vec::new();
        for row in rows {
            let mut imported = Row::with_capacity(clause.imports.len());
            for var in &clause.imports {
                let value = row
                    .get(var.name())
                    .cloned()
                    .ok_or_else(|| InterpretError::UnboundVariable(var.name().to_string()))?;
                imported.insert(var.name().to_string(), value);
            }
            let mut returned = false;
            for branch in &clause.branches {
                let (branch_rows, columns) = self.clauses(branch, vec![imported.clone()])?;
                let Some(columns) = columns else {
                    continue;
                };
                returned = true;
                for branch_row in branch_rows {
                    let mut joined = row.clone();
                    for column in &columns {
                        let value = branch_row.get(column).cloned().unwrap_or(Datum::NULL);
                        joined.insert(column.clone(), value);
                    }
                    out.push(joined);
                }
            }
            if !returned {
                out.push(row);
            }
        }
        Ok(out)
    }

    fn merge(&self, clause: &MergeClause, rows: Vec<Row>) -> InterpretResult<Vec<Row>> {
        let mut out = Vec::new();
        for row in rows {
            let matches = self.match_pattern(&clause.pattern, &row)?;
            if matches.is_empty() {
                let mut row = row;
                self.create_pattern(&clause.pattern, &mut row)?;
                self.set(&clause.on_create, &row)?;
                out.push(row);
            } else {
                for row in matches {
                    self.set(&clause.on_match, &row)?;
                    out.push(row);
                }
            }
        }
        Ok(out)
    }

    fn set(&self, items: &[SetItem], row: &Row) -> InterpretResult<()> {
        for item in items {
            let target = row
                .get(item.target.name())
                .ok_or_else(|| InterpretError::UnboundVariable(item.target.name().to_string()))?;
            let value = self.eval(&item.value, row, None)?.to_value(self.store);
            match target {
                Datum::Node(id) => self.store.set_node_property(*id, &item.property, value)?,
                Datum::Edge(id) => self.store.set_edge_property(*id, &item.property, value),
                d if d.is_null() => {}
                other => {
                    return Err(InterpretError::TypeMismatch {
                        expected: "node or relationship",
                        found: other.describe(),
                    });
                }
            }
        }
        Ok(())
    }

    fn delete(&self, clause: &DeleteClause, row: &Row) -> InterpretResult<()> {
        for var in &clause.vars {
            match row.get(var.name()) {
                Some(Datum::Node(id)) => {
                    self.store.delete_node(*id, clause.detach)?;
                }
                Some(Datum::Edge(id)) => {
                    self.store.delete_edge(*id);
                }
                Some(d) if d.is_null() => {}
                Some(other) => {
                    return Err(InterpretError::TypeMismatch {
                        expected: "node or relationship",
                        found: other.describe(),
                    });
                }
                None => return Err(InterpretError::UnboundVariable(var.name().to_string())),
            }
        }
        Ok(())
    }
}

fn item_name(item: &ProjectionItem) -> InterpretResult<String> {
    item.output()
        .map(|var| var.name().to_string())
        .ok_or_else(|| InterpretError::Unsupported("projection without alias".to_string()))
}

fn output_names(items: &[ProjectionItem]) -> InterpretResult<Vec<String>> {
    items.iter().map(item_name).collect()
}

fn dedup(rows: &mut Vec<Row>) {
    let mut seen: Vec<Row> = Vec::with_capacity(rows.len());
    rows.retain(|row| {
        if seen.contains(row) {
            false
        } else {
            seen.push(row.clone());
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::{
        AggregateFunction, CreateClause, NodePattern, Param, Pattern, PatternDirection, RelPattern, ReturnClause,
        SortItem, UnwindClause, Var,
    };
    use neoql_common::types::Value;
    use neoql_core::graph::lpg::LpgStore;
    use std::sync::Arc;

    fn movies() -> LpgStore {
        let store = LpgStore::new();
        for (title, year) in [("Heat", 1995), ("Ronin", 1998), ("Alien", 1979)] {
            store.create_node_with_props(&["Movie"], [("title", Value::from(title)), ("year", Value::Int64(year))]);
        }
        store
    }

    fn match_movies(var: &Var) -> Clause {
        Clause::Match(MatchClause::new(
            Pattern::node(NodePattern::labeled(var, &["Movie".to_string()])),
            None,
        ))
    }

    fn param(name: &str, value: Value) -> Expr {
        Expr::Param(Param {
            name: Arc::from(name),
            value,
        })
    }

    fn returning(expr: Expr, alias: &str) -> Clause {
        Clause::Return(ReturnClause::single(ProjectionItem::aliased(expr, &Var::new(alias))))
    }

    #[test]
    fn test_order_skip_limit() {
        let store = movies();
        let this = Var::new("this");
        let statement = vec![
            match_movies(&this),
            Clause::With(WithClause {
                order_by: vec![SortItem {
                    expr: Expr::property(&this, "year"),
                    descending: true,
                }],
                skip: Some(param("param0", Value::Int64(1))),
                limit: Some(param("param1", Value::Int64(1))),
                ..WithClause::items(vec![ProjectionItem::var(&this)])
            }),
            returning(Expr::property(&this, "title"), "title"),
        ];
        let (rows, columns) = Interpreter::new(&store).clauses(&statement, vec![Row::new()]).unwrap();
        assert_eq!(columns, Some(vec!["title".to_string()]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("title"), Some(&Datum::Value(Value::from("Heat"))));
    }

    #[test]
    fn test_aggregation_without_rows_yields_one_group() {
        let store = LpgStore::new();
        let this = Var::new("this");
        let statement = vec![
            match_movies(&this),
            returning(
                Expr::aggregate(AggregateFunction::Count, Expr::var(&this), false),
                "count",
            ),
        ];
        let (rows, _) = Interpreter::new(&store).clauses(&statement, vec![Row::new()]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("count"), Some(&Datum::Value(Value::Int64(0))));
    }

    #[test]
    fn test_call_joins_union_branches() {
        let store = movies();
        let (this, title) = (Var::new("this"), Var::new("title"));
        let branch = |value: &str| {
            vec![returning(param("p", Value::from(value)), "title")]
        };
        let statement = vec![
            match_movies(&this),
            Clause::Call(CallClause::union(vec![this.clone()], vec![branch("a"), branch("b")])),
            Clause::Return(ReturnClause::single(ProjectionItem::var(&title))),
        ];
        let (rows, _) = Interpreter::new(&store).clauses(&statement, vec![Row::new()]).unwrap();
        assert_eq!(rows.len(), 6);

        let unit = vec![
            match_movies(&this),
            Clause::Call(CallClause::new(
                vec![this.clone()],
                vec![Clause::Set(crate::query::plan::SetClause {
                    items: vec![SetItem::new(&this, "seen", Expr::bool(true))],
                })],
            )),
            returning(Expr::property(&this, "seen"), "seen"),
        ];
        let (rows, _) = Interpreter::new(&store).clauses(&unit, vec![Row::new()]).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.get("seen") == Some(&Datum::Value(Value::Bool(true)))));
    }

    #[test]
    fn test_optional_match_binds_null() {
        let store = movies();
        let (this, director) = (Var::new("this"), Var::new("d"));
        let statement = vec![
            match_movies(&this),
            Clause::Match(MatchClause {
                optional: true,
                pattern: Pattern::node(NodePattern::var(&this)).hop(
                    RelPattern {
                        var: None,
                        rel_type: "DIRECTED".to_string(),
                        direction: PatternDirection::In,
                        properties: Vec::new(),
                    },
                    NodePattern::var(&director),
                ),
                predicate: None,
            }),
            Clause::Return(ReturnClause::single(ProjectionItem::var(&director))),
        ];
        let (rows, _) = Interpreter::new(&store).clauses(&statement, vec![Row::new()]).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.get("d") == Some(&Datum::NULL)));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let store = LpgStore::new();
        let genre = Var::new("g");
        let mut node = NodePattern::labeled(&genre, &["Genre".to_string()]);
        node.properties.push(("name".to_string(), param("param0", Value::from("Drama"))));
        let merge = Clause::Merge(MergeClause {
            pattern: Pattern::node(node),
            on_create: vec![SetItem::new(&genre, "created", Expr::bool(true))],
            on_match: vec![SetItem::new(&genre, "matched", Expr::bool(true))],
        });
        let interpreter = Interpreter::new(&store);
        interpreter.clauses(std::slice::from_ref(&merge), vec![Row::new()]).unwrap();
        interpreter.clauses(std::slice::from_ref(&merge), vec![Row::new()]).unwrap();
        let ids = store.nodes_by_label("Genre");
        assert_eq!(ids.len(), 1);
        assert_eq!(store.node_property(ids[0], "created"), Some(Value::Bool(true)));
        assert_eq!(store.node_property(ids[0], "matched"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_unwind_create_and_delete() {
        let store = LpgStore::new();
        let (item, node) = (Var::new("item"), Var::new("n"));
        let mut created = NodePattern::labeled(&node, &["Tag".to_string()]);
        created.properties.push(("name".to_string(), Expr::var(&item)));
        let statement = vec![
            Clause::Unwind(UnwindClause {
                expr: param("param0", Value::List(vec![Value::from("a"), Value::from("b")])),
                var: item.clone(),
            }),
            Clause::Create(CreateClause {
                pattern: Pattern::node(created),
            }),
        ];
        let interpreter = Interpreter::new(&store);
        let (rows, columns) = interpreter.clauses(&statement, vec![Row::new()]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(columns, None);
        assert_eq!(store.node_count(), 2);

        let delete = vec![
            Clause::Match(MatchClause::new(
                Pattern::node(NodePattern::labeled(&node, &["Tag".to_string()])),
                None,
            )),
            Clause::Delete(DeleteClause {
                detach: true,
                vars: vec![node.clone()],
            }),
        ];
        interpreter.clauses(&delete, vec![Row::new()]).unwrap();
        assert_eq!(store.node_count(), 0);
    }
}
