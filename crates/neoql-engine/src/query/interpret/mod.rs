//! Reference interpreter for compiled statements.
//!
//! Runs a [`Statement`] against an in-memory [`LpgStore`], one materialized
//! row set per clause:
//!
//! - Match: scan and expand a pattern per input row
//! - With / Return: project, group and aggregate, sort, slice
//! - Call: correlated sub-calls, unions and unit sub-calls
//! - Create / Merge / Set / Delete: write to the store
//! - Validate: fail with the guard's tag when the predicate is false
//!
//! The interpreter exists so translation semantics can be checked without a
//! database. Raw statement text (computed fields) is not interpreted.

mod clause;
mod expr;
mod pattern;

use super::plan::{Expr, Statement};
use indexmap::IndexMap;
use neoql_common::types::Value;
use neoql_common::utils::error::AuthorizationError;
use neoql_core::graph::lpg::{EdgeId, GraphError, LpgStore, NodeId};
use std::cell::Cell;
use std::sync::Arc;
use thiserror::Error;

/// Result type for interpretation.
pub type InterpretResult<T> = std::result::Result<T, InterpretError>;

/// Failure while running a statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpretError {
    /// A validation guard carrying an authorization tag failed.
    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),

    /// A validation guard without a recognisable tag failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A variable was read before being bound.
    #[error("unbound variable: {0}")]
    UnboundVariable(String),

    /// An operand had the wrong type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Found value.
        found: String,
    },

    /// Integer overflow or division by zero.
    #[error("arithmetic error: {0}")]
    Arithmetic(&'static str),

    /// A construct the interpreter does not run.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The store rejected a write.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// A value flowing through a statement: a plain value or a graph entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// A scalar; never a list or map.
    Value(Value),
    /// A node.
    Node(NodeId),
    /// A relationship.
    Edge(EdgeId),
    /// A list.
    List(Vec<Datum>),
    /// A map.
    Map(IndexMap<String, Datum>),
}

impl Datum {
    /// Null.
    pub const NULL: Datum = Datum::Value(Value::Null);

    /// Converts a value, lists and maps included.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::List(items) => Datum::List(items.iter().map(Datum::from_value).collect()),
            Value::Map(map) => Datum::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Datum::from_value(v)))
                    .collect(),
            ),
            scalar => Datum::Value(scalar.clone()),
        }
    }

    /// Returns true if this is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Value(Value::Null))
    }

    /// The scalar value, if this is one.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Datum::Value(value) => Some(value),
            _ => None,
        }
    }

    /// A short description for error messages.
    fn describe(&self) -> String {
        match self {
            Datum::Value(value) => value.type_name().to_string(),
            Datum::Node(id) => format!("node {id}"),
            Datum::Edge(id) => format!("relationship {id}"),
            Datum::List(_) => "list".to_string(),
            Datum::Map(_) => "map".to_string(),
        }
    }

    /// Converts to a plain value; entities become their property maps.
    #[must_use]
    pub fn to_value(&self, store: &LpgStore) -> Value {
        match self {
            Datum::Value(value) => value.clone(),
            Datum::Node(id) => store
                .get_node(*id)
                .map_or(Value::Null, |node| Value::Map(node.properties)),
            Datum::Edge(id) => store
                .get_edge(*id)
                .map_or(Value::Null, |edge| Value::Map(edge.properties)),
            Datum::List(items) => Value::List(items.iter().map(|d| d.to_value(store)).collect()),
            Datum::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value(store)))
                    .collect(),
            ),
        }
    }
}

/// Variable bindings of one row.
pub(crate) type Row = IndexMap<String, Datum>;

/// The rows a statement returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Returned column names.
    pub columns: Vec<String>,
    /// Rows, one value per column.
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// The values of one column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().filter_map(|row| row.get(index)).collect())
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no rows were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Runs compiled statements against a store.
pub struct Interpreter<'g> {
    store: &'g LpgStore,
    /// What `datetime()` and friends return.
    clock: Arc<str>,
    next_uuid: Cell<u64>,
}

impl<'g> Interpreter<'g> {
    /// An interpreter over `store`.
    #[must_use]
    pub fn new(store: &'g LpgStore) -> Self {
        Self {
            store,
            clock: Arc::from("2024-01-01T00:00:00Z"),
            next_uuid: Cell::new(0),
        }
    }

    /// Fixes the current time.
    #[must_use]
    pub fn with_clock(mut self, now: &str) -> Self {
        self.clock = Arc::from(now);
        self
    }

    /// The store.
    #[must_use]
    pub fn store(&self) -> &'g LpgStore {
        self.store
    }

    /// Runs a statement.
    pub fn run(&self, statement: &Statement) -> InterpretResult<QueryResult> {
        let (rows, columns) = self.clauses(&statement.clauses, vec![Row::new()])?;
        let Some(columns) = columns else {
            return Ok(QueryResult::default());
        };
        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).map_or(Value::Null, |d| d.to_value(self.store)))
                    .collect()
            })
            .collect();
        Ok(QueryResult { columns, rows })
    }

    /// Evaluates an expression with the given bindings.
    pub fn evaluate(&self, expr: &Expr, bindings: &[(&str, Datum)]) -> InterpretResult<Datum> {
        let row: Row = bindings
            .iter()
            .map(|(name, datum)| ((*name).to_string(), datum.clone()))
            .collect();
        self.eval(expr, &row, None)
    }

    /// Evaluates a predicate for `var` bound to a node: `Some(true)`,
    /// `Some(false)` or `None` for null.
    pub fn holds_for(&self, predicate: &Expr, var: &str, node: NodeId) -> InterpretResult<Option<bool>> {
        let datum = self.evaluate(predicate, &[(var, Datum::Node(node))])?;
        expr::truth(&datum)
    }

    fn uuid(&self) -> String {
        let n = self.next_uuid.get();
        self.next_uuid.set(n + 1);
        format!("00000000-0000-4000-8000-{n:012x}")
    }

    fn forbidden(tag: &str) -> InterpretError {
        AuthorizationError::from_store_message(tag)
            .map_or_else(|| InterpretError::Validation(tag.to_string()), InterpretError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::{
        Clause, CompareOp, MatchClause, NodePattern, Pattern, ProjectionItem, ReturnClause, ValidateClause, Var,
    };

    fn movie_store() -> LpgStore {
        let store = LpgStore::new();
        store.create_node_with_props(&["Movie"], [("title", Value::from("Heat")), ("runtime", Value::Int64(170))]);
        store.create_node_with_props(&["Movie"], [("title", Value::from("Ronin")), ("runtime", Value::Int64(122))]);
        store.create_node_with_props(&["Actor"], [("name", Value::from("Al"))]);
        store
    }

    #[test]
    fn test_match_and_return() {
        let store = movie_store();
        let this = Var::new("this0");
        let statement = Statement::new(vec![
            Clause::Match(MatchClause::new(
                Pattern::node(NodePattern::labeled(&this, &["Movie".to_string()])),
                Some(Expr::compare(
                    Expr::property(&this, "runtime"),
                    CompareOp::Gt,
                    Expr::Literal(Value::Int64(150)),
                )),
            )),
            Clause::Return(ReturnClause::single(ProjectionItem::aliased(
                Expr::property(&this, "title"),
                &Var::new("title"),
            ))),
        ]);
        let result = Interpreter::new(&store).run(&statement).unwrap();
        assert_eq!(result.columns, vec!["title".to_string()]);
        assert_eq!(result.rows, vec![vec![Value::from("Heat")]]);
    }

    #[test]
    fn test_validate_maps_tags() {
        let store = movie_store();
        let this = Var::new("this0");
        let tag = AuthorizationError::new("Movie", neoql_common::types::AuthOperation::Read, neoql_common::types::AuthTiming::Before).to_tag();
        let statement = Statement::new(vec![
            Clause::Match(MatchClause::new(
                Pattern::node(NodePattern::labeled(&this, &["Movie".to_string()])),
                None,
            )),
            Clause::Validate(ValidateClause {
                predicate: Expr::bool(false),
                tag,
            }),
        ]);
        match Interpreter::new(&store).run(&statement) {
            Err(InterpretError::Forbidden(error)) => assert_eq!(error.type_name, "Movie"),
            other => panic!("Expected Forbidden, got {other:?}"),
        }

        let statement = Statement::new(vec![Clause::Validate(ValidateClause {
            predicate: Expr::bool(false),
            tag: "plain".to_string(),
        })]);
        assert_eq!(
            Interpreter::new(&store).run(&statement),
            Err(InterpretError::Validation("plain".to_string()))
        );
    }

    #[test]
    fn test_datum_conversion() {
        let store = movie_store();
        let value = Value::List(vec![Value::Int64(1), Value::Map(IndexMap::from([("a".to_string(), Value::Null)]))]);
        let datum = Datum::from_value(&value);
        assert!(matches!(datum, Datum::List(ref items) if matches!(items[1], Datum::Map(_))));
        assert_eq!(datum.to_value(&store), value);

        let node = Datum::Node(NodeId(2));
        let Value::Map(props) = node.to_value(&store) else {
            panic!("Expected a property map");
        };
        assert_eq!(props.get("name"), Some(&Value::from("Al")));
    }
}
