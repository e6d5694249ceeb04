//! Expression evaluation.
//!
//! Logic is three-valued: comparisons involving null yield null, `AND` is
//! false if any operand is false, `OR` is true if any operand is true.

use super::{Datum, InterpretError, InterpretResult, Interpreter, Row};
use crate::query::plan::{AggregateFunction, ArithmeticOp, CompareOp, Expr, MapEntry};
use indexmap::IndexMap;
use neoql_common::types::Value;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::Arc;

/// The truth value of a predicate result.
pub(super) fn truth(datum: &Datum) -> InterpretResult<Option<bool>> {
    match datum {
        Datum::Value(Value::Bool(b)) => Ok(Some(*b)),
        Datum::Value(Value::Null) => Ok(None),
        other => Err(InterpretError::TypeMismatch {
            expected: "boolean",
            found: other.describe(),
        }),
    }
}

fn boolean(value: Option<bool>) -> Datum {
    value.map_or(Datum::NULL, |b| Datum::Value(Value::Bool(b)))
}

fn string(text: impl Into<Arc<str>>) -> Datum {
    Datum::Value(Value::String(text.into()))
}

fn number(datum: &Datum) -> Option<f64> {
    datum.as_value().and_then(Value::as_f64)
}

/// Equality; `None` when either side is null.
pub(super) fn equals(left: &Datum, right: &Datum) -> Option<bool> {
    match (left, right) {
        (l, r) if l.is_null() || r.is_null() => None,
        (Datum::Value(Value::Int64(a)), Datum::Value(Value::Int64(b))) => Some(a == b),
        (Datum::Value(a), Datum::Value(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(_), Some(_)) => Some(a.compare(b) == Some(Ordering::Equal)),
            _ => Some(a == b),
        },
        (Datum::Node(a), Datum::Node(b)) => Some(a == b),
        (Datum::Edge(a), Datum::Edge(b)) => Some(a == b),
        (Datum::List(a), Datum::List(b)) => {
            if a.len() != b.len() {
                return Some(false);
            }
            let mut unknown = false;
            for (x, y) in a.iter().zip(b) {
                match equals(x, y) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            if unknown { None } else { Some(true) }
        }
        (Datum::Map(a), Datum::Map(b)) => {
            if a.len() != b.len() || a.keys().any(|k| !b.contains_key(k)) {
                return Some(false);
            }
            let mut unknown = false;
            for (key, x) in a {
                match b.get(key).and_then(|y| equals(x, y)) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            if unknown { None } else { Some(true) }
        }
        _ => Some(false),
    }
}

/// Ordering between comparable values; `None` when incomparable or null.
pub(super) fn order(left: &Datum, right: &Datum) -> Option<Ordering> {
    match (left.as_value()?, right.as_value()?) {
        (Value::Null, _) | (_, Value::Null) => None,
        (a, b) => a.compare(b),
    }
}

/// A total order for sorting: nulls last, incomparable values equal.
pub(super) fn sort_order(left: &Datum, right: &Datum) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => order(left, right).unwrap_or(Ordering::Equal),
    }
}

/// Returns true if `expr` aggregates outside any sub-pattern.
pub(super) fn contains_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::Aggregate { .. } => true,
        Expr::Literal(_) | Expr::Param(_) | Expr::Var(_) | Expr::HasLabels { .. } => false,
        Expr::Exists(_) | Expr::Count(_) => false,
        Expr::Property(inner, _) | Expr::Not(inner) | Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
            contains_aggregate(inner)
        }
        Expr::Map(entries) => entries.iter().any(|(_, e)| contains_aggregate(e)),
        Expr::MapProjection { entries, .. } => entries.iter().any(|entry| match entry {
            MapEntry::Shorthand(_) => false,
            MapEntry::Keyed(_, e) => contains_aggregate(e),
        }),
        Expr::List(items) | Expr::And(items) | Expr::Or(items) | Expr::Function { args: items, .. } => {
            items.iter().any(contains_aggregate)
        }
        Expr::Compare { left, right, .. } | Expr::Arithmetic { left, right, .. } => {
            contains_aggregate(left) || contains_aggregate(right)
        }
        Expr::Case { whens, otherwise } => {
            whens
                .iter()
                .any(|(w, t)| contains_aggregate(w) || contains_aggregate(t))
                || otherwise.as_deref().is_some_and(contains_aggregate)
        }
        Expr::ListComprehension { list, filter, map, .. } => {
            contains_aggregate(list)
                || filter.as_deref().is_some_and(contains_aggregate)
                || map.as_deref().is_some_and(contains_aggregate)
        }
        Expr::Reduce { init, list, expr, .. } => {
            contains_aggregate(init) || contains_aggregate(list) || contains_aggregate(expr)
        }
        Expr::Slice { list, from, to } => {
            contains_aggregate(list)
                || from.as_deref().is_some_and(contains_aggregate)
                || to.as_deref().is_some_and(contains_aggregate)
        }
    }
}

impl Interpreter<'_> {
    /// Evaluates `expr` in `row`. Aggregates fold over `group`, the rows
    /// sharing `row`'s grouping keys.
    pub(super) fn eval(&self, expr: &Expr, row: &Row, group: Option<&[Row]>) -> InterpretResult<Datum> {
        Ok(match expr {
            Expr::Literal(value) => Datum::from_value(value),
            Expr::Param(param) => Datum::from_value(&param.value),
            Expr::Var(var) => row
                .get(var.name())
                .cloned()
                .ok_or_else(|| InterpretError::UnboundVariable(var.name().to_string()))?,
            Expr::Property(base, key) => {
                let base = self.eval(base, row, group)?;
                self.property(&base, key)?
            }
            Expr::Map(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value, row, group)?);
                }
                Datum::Map(map)
            }
            Expr::MapProjection { var, entries } => {
                let base = row
                    .get(var.name())
                    .ok_or_else(|| InterpretError::UnboundVariable(var.name().to_string()))?;
                if base.is_null() {
                    return Ok(Datum::NULL);
                }
                let mut map = IndexMap::with_capacity(entries.len());
                for entry in entries {
                    match entry {
                        MapEntry::Shorthand(property) => {
                            map.insert(property.clone(), self.property(base, property)?);
                        }
                        MapEntry::Keyed(key, value) => {
                            map.insert(key.clone(), self.eval(value, row, group)?);
                        }
                    }
                }
                Datum::Map(map)
            }
            Expr::List(items) => Datum::List(
                items
                    .iter()
                    .map(|item| self.eval(item, row, group))
                    .collect::<InterpretResult<_>>()?,
            ),
            Expr::Compare { left, op, right } => {
                let left = self.eval(left, row, group)?;
                let right = self.eval(right, row, group)?;
                boolean(compare(&left, *op, &right)?)
            }
            Expr::Arithmetic { left, op, right } => {
                let left = self.eval(left, row, group)?;
                let right = self.eval(right, row, group)?;
                arithmetic(left, *op, right)?
            }
            Expr::And(items) => {
                let mut unknown = false;
                for item in items {
                    match truth(&self.eval(item, row, group)?)? {
                        Some(false) => return Ok(boolean(Some(false))),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                boolean(if unknown { None } else { Some(true) })
            }
            Expr::Or(items) => {
                let mut unknown = false;
                for item in items {
                    match truth(&self.eval(item, row, group)?)? {
                        Some(true) => return Ok(boolean(Some(true))),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                boolean(if unknown { None } else { Some(false) })
            }
            Expr::Not(inner) => boolean(truth(&self.eval(inner, row, group)?)?.map(|b| !b)),
            Expr::IsNull(inner) => boolean(Some(self.eval(inner, row, group)?.is_null())),
            Expr::IsNotNull(inner) => boolean(Some(!self.eval(inner, row, group)?.is_null())),
            Expr::HasLabels { var, labels } => match row.get(var.name()) {
                Some(Datum::Node(id)) => boolean(Some(labels.iter().all(|l| self.store.has_label(*id, l)))),
                Some(d) if d.is_null() => Datum::NULL,
                Some(other) => {
                    return Err(InterpretError::TypeMismatch {
                        expected: "node",
                        found: other.describe(),
                    });
                }
                None => return Err(InterpretError::UnboundVariable(var.name().to_string())),
            },
            Expr::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, row, group))
                    .collect::<InterpretResult<Vec<_>>>()?;
                self.function(name, args)?
            }
            Expr::Aggregate { function, arg, distinct } => {
                let Some(group) = group else {
                    return Err(InterpretError::Unsupported(format!(
                        "{} outside a projection",
                        function.as_str()
                    )));
                };
                let mut values = Vec::with_capacity(group.len());
                for member in group {
                    let value = self.eval(arg, member, None)?;
                    if value.is_null() {
                        continue;
                    }
                    if *distinct && values.iter().any(|v| equals(v, &value) == Some(true)) {
                        continue;
                    }
                    values.push(value);
                }
                aggregate(*function, values)?
            }
            Expr::Exists(sub) => boolean(Some(self.sub_pattern_count(sub, row)? > 0)),
            Expr::Count(sub) => {
                let count = self.sub_pattern_count(sub, row)?;
                Datum::Value(Value::Int64(i64::try_from(count).unwrap_or(i64::MAX)))
            }
            Expr::Case { whens, otherwise } => {
                for (condition, result) in whens {
                    if truth(&self.eval(condition, row, group)?)? == Some(true) {
                        return self.eval(result, row, group);
                    }
                }
                match otherwise {
                    Some(otherwise) => self.eval(otherwise, row, group)?,
                    None => Datum::NULL,
                }
            }
            Expr::ListComprehension { var, list, filter, map } => {
                let items = match self.eval(list, row, group)? {
                    Datum::List(items) => items,
                    d if d.is_null() => return Ok(Datum::NULL),
                    other => return Err(mismatch("list", &other)),
                };
                let mut out = Vec::with_capacity(items.len());
                let mut scope = row.clone();
                for item in items {
                    scope.insert(var.name().to_string(), item.clone());
                    if let Some(filter) = filter {
                        if truth(&self.eval(filter, &scope, group)?)? != Some(true) {
                            continue;
                        }
                    }
                    out.push(match map {
                        Some(map) => self.eval(map, &scope, group)?,
                        None => item,
                    });
                }
                Datum::List(out)
            }
            Expr::Reduce { acc, init, var, list, expr } => {
                let mut value = self.eval(init, row, group)?;
                let items = match self.eval(list, row, group)? {
                    Datum::List(items) => items,
                    d if d.is_null() => return Ok(Datum::NULL),
                    other => return Err(mismatch("list", &other)),
                };
                let mut scope = row.clone();
                for item in items {
                    scope.insert(acc.name().to_string(), value);
                    scope.insert(var.name().to_string(), item);
                    value = self.eval(expr, &scope, group)?;
                }
                value
            }
            Expr::Slice { list, from, to } => {
                let items = match self.eval(list, row, group)? {
                    Datum::List(items) => items,
                    d if d.is_null() => return Ok(Datum::NULL),
                    other => return Err(mismatch("list", &other)),
                };
                let len = items.len() as i64;
                let bound = |expr: &Option<Box<Expr>>, default: i64| -> InterpretResult<Option<i64>> {
                    match expr {
                        None => Ok(Some(default)),
                        Some(expr) => match self.eval(expr, row, group)? {
                            Datum::Value(Value::Int64(i)) => Ok(Some(if i < 0 { (len + i).max(0) } else { i.min(len) })),
                            d if d.is_null() => Ok(None),
                            other => Err(mismatch("integer", &other)),
                        },
                    }
                };
                match (bound(from, 0)?, bound(to, len)?) {
                    (Some(from), Some(to)) if from < to => {
                        Datum::List(items[from as usize..to as usize].to_vec())
                    }
                    (Some(_), Some(_)) => Datum::List(Vec::new()),
                    _ => Datum::NULL,
                }
            }
        })
    }

    fn property(&self, base: &Datum, key: &str) -> InterpretResult<Datum> {
        Ok(match base {
            Datum::Node(id) => self
                .store
                .node_property(*id, key)
                .map_or(Datum::NULL, |v| Datum::from_value(&v)),
            Datum::Edge(id) => self
                .store
                .edge_property(*id, key)
                .map_or(Datum::NULL, |v| Datum::from_value(&v)),
            Datum::Map(map) => map.get(key).cloned().unwrap_or(Datum::NULL),
            d if d.is_null() => Datum::NULL,
            other => return Err(mismatch("node, relationship or map", other)),
        })
    }

    fn sub_pattern_count(&self, sub: &crate::query::plan::SubPattern, row: &Row) -> InterpretResult<usize> {
        let mut count = 0;
        for candidate in self.match_pattern(&sub.pattern, row)? {
            let keep = match &sub.predicate {
                Some(predicate) => truth(&self.eval(predicate, &candidate, None)?)? == Some(true),
                None => true,
            };
            if keep {
                count += 1;
            }
        }
        Ok(count)
    }

    fn function(&self, name: &str, args: Vec<Datum>) -> InterpretResult<Datum> {
        let first = args.first().cloned().unwrap_or(Datum::NULL);
        Ok(match name {
            "size" => match &first {
                Datum::List(items) => Datum::Value(Value::Int64(items.len() as i64)),
                Datum::Value(Value::String(s)) => Datum::Value(Value::Int64(s.chars().count() as i64)),
                d if d.is_null() => Datum::NULL,
                other => return Err(mismatch("list or string", other)),
            },
            "head" => match first {
                Datum::List(items) => items.into_iter().next().unwrap_or(Datum::NULL),
                d if d.is_null() => Datum::NULL,
                other => return Err(mismatch("list", &other)),
            },
            "coalesce" => args.into_iter().find(|d| !d.is_null()).unwrap_or(Datum::NULL),
            "toString" => match &first {
                Datum::Value(Value::Null) => Datum::NULL,
                Datum::Value(Value::String(_)) => first,
                Datum::Value(value) => string(value.to_string()),
                other => return Err(mismatch("scalar", other)),
            },
            "randomUUID" => string(self.uuid()),
            "point" => match first {
                Datum::Map(mut map) => {
                    if !map.contains_key("crs") {
                        let crs = if map.contains_key("longitude") { "wgs-84" } else { "cartesian" };
                        map.insert("crs".to_string(), string(crs));
                    }
                    Datum::Map(map)
                }
                d if d.is_null() => Datum::NULL,
                other => return Err(mismatch("map", &other)),
            },
            "point.distance" => {
                let coordinates = |d: &Datum| -> Option<(f64, f64)> {
                    let Datum::Map(map) = d else { return None };
                    let get = |k: &str| map.get(k).and_then(number);
                    get("x").zip(get("y")).or_else(|| get("longitude").zip(get("latitude")))
                };
                match (args.first().and_then(coordinates), args.get(1).and_then(coordinates)) {
                    (Some((x1, y1)), Some((x2, y2))) => {
                        Datum::Value(Value::Float64((x1 - x2).hypot(y1 - y2)))
                    }
                    _ => Datum::NULL,
                }
            }
            "date" | "datetime" | "localdatetime" | "time" | "localtime" | "duration" => match args.len() {
                0 => self.now(name),
                _ => match first {
                    Datum::Value(Value::String(_) | Value::Null) => first,
                    other => return Err(mismatch("string", &other)),
                },
            },
            other => return Err(InterpretError::Unsupported(format!("function {other}"))),
        })
    }

    fn now(&self, constructor: &str) -> Datum {
        let clock: &str = &self.clock;
        let (date, time) = clock.split_once('T').unwrap_or((clock, "00:00:00Z"));
        match constructor {
            "date" => string(date),
            "time" => string(time),
            "localtime" => string(time.trim_end_matches('Z')),
            "localdatetime" => string(clock.trim_end_matches('Z')),
            "duration" => string("PT0S"),
            _ => string(clock),
        }
    }
}

fn mismatch(expected: &'static str, found: &Datum) -> InterpretError {
    InterpretError::TypeMismatch {
        expected,
        found: found.describe(),
    }
}

fn text(datum: &Datum) -> Option<&str> {
    datum.as_value().and_then(Value::as_str)
}

fn compare(left: &Datum, op: CompareOp, right: &Datum) -> InterpretResult<Option<bool>> {
    if op == CompareOp::In {
        return Ok(match right {
            Datum::List(items) => {
                if left.is_null() {
                    return Ok(None);
                }
                let mut unknown = false;
                for item in items {
                    match equals(left, item) {
                        Some(true) => return Ok(Some(true)),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown { None } else { Some(false) }
            }
            d if d.is_null() => None,
            other => return Err(mismatch("list", other)),
        });
    }
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    Ok(match op {
        CompareOp::Eq => equals(left, right),
        CompareOp::Ne => equals(left, right).map(|b| !b),
        CompareOp::Lt => order(left, right).map(Ordering::is_lt),
        CompareOp::Le => order(left, right).map(Ordering::is_le),
        CompareOp::Gt => order(left, right).map(Ordering::is_gt),
        CompareOp::Ge => order(left, right).map(Ordering::is_ge),
        CompareOp::Contains => text(left).zip(text(right)).map(|(l, r)| l.contains(r)),
        CompareOp::StartsWith => text(left).zip(text(right)).map(|(l, r)| l.starts_with(r)),
        CompareOp::EndsWith => text(left).zip(text(right)).map(|(l, r)| l.ends_with(r)),
        CompareOp::Regex => match text(left).zip(text(right)) {
            Some((l, pattern)) => {
                let regex = Regex::new(&format!("^(?:{pattern})$"))
                    .map_err(|e| InterpretError::Unsupported(format!("regular expression: {e}")))?;
                Some(regex.is_match(l))
            }
            None => None,
        },
        CompareOp::In => None,
    })
}

fn arithmetic(left: Datum, op: ArithmeticOp, right: Datum) -> InterpretResult<Datum> {
    if left.is_null() || right.is_null() {
        return Ok(Datum::NULL);
    }
    if op == ArithmeticOp::Add {
        match (left, right) {
            (Datum::List(mut a), Datum::List(b)) => {
                a.extend(b);
                return Ok(Datum::List(a));
            }
            (Datum::List(mut a), item) => {
                a.push(item);
                return Ok(Datum::List(a));
            }
            (item, Datum::List(b)) => {
                let mut out = vec![item];
                out.extend(b);
                return Ok(Datum::List(out));
            }
            (Datum::Value(Value::String(a)), Datum::Value(b)) => return Ok(string(format!("{a}{}", plain(&b)))),
            (Datum::Value(a), Datum::Value(Value::String(b))) => return Ok(string(format!("{}{b}", plain(&a)))),
            (l, r) => return numeric(&l, op, &r),
        }
    }
    numeric(&left, op, &right)
}

/// A scalar as concatenated into a string.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn numeric(left: &Datum, op: ArithmeticOp, right: &Datum) -> InterpretResult<Datum> {
    if let (Some(Value::Int64(a)), Some(Value::Int64(b))) = (left.as_value(), right.as_value()) {
        let result = match op {
            ArithmeticOp::Add => a.checked_add(*b),
            ArithmeticOp::Sub => a.checked_sub(*b),
            ArithmeticOp::Mul => a.checked_mul(*b),
            ArithmeticOp::Div if *b == 0 => return Err(InterpretError::Arithmetic("division by zero")),
            ArithmeticOp::Div => a.checked_div(*b),
        };
        return result
            .map(|n| Datum::Value(Value::Int64(n)))
            .ok_or(InterpretError::Arithmetic("integer overflow"));
    }
    let (Some(a), Some(b)) = (number(left), number(right)) else {
        let found = if number(left).is_none() { left } else { right };
        return Err(mismatch("number", found));
    };
    Ok(Datum::Value(Value::Float64(match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Sub => a - b,
        ArithmeticOp::Mul => a * b,
        ArithmeticOp::Div => a / b,
    })))
}

fn aggregate(function: AggregateFunction, values: Vec<Datum>) -> InterpretResult<Datum> {
    Ok(match function {
        AggregateFunction::Count => Datum::Value(Value::Int64(values.len() as i64)),
        AggregateFunction::Collect => Datum::List(values),
        AggregateFunction::Min | AggregateFunction::Max => {
            let wanted = if function == AggregateFunction::Min { Ordering::Less } else { Ordering::Greater };
            let mut best: Option<Datum> = None;
            for value in values {
                best = match best {
                    Some(current) if order(&value, &current) != Some(wanted) => Some(current),
                    _ => Some(value),
                };
            }
            best.unwrap_or(Datum::NULL)
        }
        AggregateFunction::Sum => {
            let mut total = Datum::Value(Value::Int64(0));
            for value in values {
                total = numeric(&total, ArithmeticOp::Add, &value)?;
            }
            total
        }
        AggregateFunction::Avg => {
            if values.is_empty() {
                return Ok(Datum::NULL);
            }
            let mut total = 0.0;
            for value in &values {
                total += number(value).ok_or_else(|| mismatch("number", value))?;
            }
            Datum::Value(Value::Float64(total / values.len() as f64))
        }
    })
}
