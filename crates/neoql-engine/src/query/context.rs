//! State shared by every translator during one compilation.

use super::namer::{AUTHENTICATED_PARAM, JWT_PARAM, Namer};
use super::plan::{Expr, NodePattern, Pattern, PatternDirection, RelPattern, Var};
use crate::config::TranslatorConfig;
use indexmap::IndexMap;
use neoql_adapters::AuthContext;
use neoql_common::types::Value;
use neoql_common::utils::error::{Error, Result, TranslationError};
use neoql_core::schema::{RelationshipDirection, RelationshipField, SchemaModel};
use std::fmt;

/// One compilation: the schema, the caller, the options and the namer.
pub struct Context<'a> {
    /// The schema being compiled against.
    pub schema: &'a SchemaModel,
    /// The caller's authentication.
    pub auth: &'a AuthContext,
    /// Options.
    pub config: &'a TranslatorConfig,
    /// Variable and parameter names.
    pub namer: Namer,
    /// Claims referenced under a negation, guarded outside it.
    claims: Option<Vec<String>>,
}

impl<'a> Context<'a> {
    /// Starts a compilation.
    #[must_use]
    pub fn new(schema: &'a SchemaModel, auth: &'a AuthContext, config: &'a TranslatorConfig) -> Self {
        Self {
            schema,
            auth,
            config,
            namer: Namer::new(),
            claims: None,
        }
    }

    /// `$jwt`, the caller's claims.
    #[must_use]
    pub fn jwt(&self) -> Expr {
        self.namer.named_param(JWT_PARAM, self.auth.claims_value())
    }

    /// `$isAuthenticated`.
    #[must_use]
    pub fn is_authenticated(&self) -> Expr {
        self.namer
            .named_param(AUTHENTICATED_PARAM, Value::Bool(self.auth.authenticated))
    }

    /// `$jwt.a.b IS NOT NULL` for a comparison against claim `a.b`, or
    /// `None` while [`Context::hoist_claims`] collects the claim instead.
    pub(crate) fn claim_guard(&mut self, claim: &str) -> Option<Expr> {
        if let Some(collected) = self.claims.as_mut() {
            if !collected.iter().any(|c| c == claim) {
                collected.push(claim.to_string());
            }
            return None;
        }
        Some(claim_expr(self, claim).is_not_null())
    }

    /// Compiles `inner` with the claims it references guarded in front of
    /// it instead of inside it: `$jwt.sub IS NOT NULL AND NOT (..)`. A
    /// missing claim never satisfies the result.
    pub(crate) fn hoist_claims(&mut self, inner: impl FnOnce(&mut Self) -> Result<Expr>) -> Result<Expr> {
        let outer = self.claims.replace(Vec::new());
        let compiled = inner(self);
        let claims = std::mem::replace(&mut self.claims, outer).unwrap_or_default();
        let compiled = compiled?;
        let mut guards = Vec::with_capacity(claims.len() + 1);
        for claim in &claims {
            guards.extend(self.claim_guard(claim));
        }
        guards.push(compiled);
        Ok(Expr::and(guards))
    }
}

/// `$jwt.a.b`.
pub(crate) fn claim_expr(ctx: &Context<'_>, path: &str) -> Expr {
    path.split('.').fold(ctx.jwt(), Expr::dot)
}

/// A dotted path into the request, used to point errors at the offending
/// argument: `movies.where.actors_SOME.name_CONTAINS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgPath(String);

impl ArgPath {
    /// A path starting at a root field.
    pub fn root(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Extends the path by one key.
    #[must_use]
    pub fn child(&self, key: &str) -> Self {
        Self(format!("{}.{key}", self.0))
    }

    /// Extends the path by a list index.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}.{index}", self.0))
    }

    /// The path text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArgPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn unknown_field(type_name: &str, field: &str, path: &ArgPath) -> Error {
    TranslationError::UnknownField {
        type_name: type_name.to_string(),
        field: field.to_string(),
        path: path.to_string(),
    }
    .into()
}

pub(crate) fn unknown_type(type_name: &str, path: &ArgPath) -> Error {
    TranslationError::UnknownType {
        type_name: type_name.to_string(),
        path: path.to_string(),
    }
    .into()
}

pub(crate) fn invalid_argument(argument: &str, reason: impl Into<String>, path: &ArgPath) -> Error {
    TranslationError::InvalidArgument {
        argument: argument.to_string(),
        reason: reason.into(),
        path: path.to_string(),
    }
    .into()
}

/// Reads an argument that must be an object.
pub(crate) fn expect_map<'v>(
    value: &'v Value,
    argument: &str,
    path: &ArgPath,
) -> Result<&'v IndexMap<String, Value>> {
    value.as_map().ok_or_else(|| {
        invalid_argument(
            argument,
            format!("expected an object, found {}", value.type_name()),
            path,
        )
    })
}

static NULL: Value = Value::Null;

/// An argument by name; absent arguments read as null.
pub(crate) fn argument<'v>(args: &'v IndexMap<String, Value>, name: &str) -> &'v Value {
    args.get(name).unwrap_or(&NULL)
}

/// Reads an input that may be one object or a list of objects.
pub(crate) fn one_or_many(value: &Value) -> Vec<&Value> {
    match value {
        Value::Null => Vec::new(),
        Value::List(items) => items.iter().collect(),
        other => vec![other],
    }
}

pub(crate) fn pattern_direction(direction: RelationshipDirection) -> PatternDirection {
    match direction {
        RelationshipDirection::Out => PatternDirection::Out,
        RelationshipDirection::In => PatternDirection::In,
        RelationshipDirection::Undirected => PatternDirection::Both,
    }
}

/// `-[edge:TYPE]->` for a relationship field, read from its owner.
pub(crate) fn rel_pattern(rel: &RelationshipField, edge: Option<&Var>) -> RelPattern {
    RelPattern {
        var: edge.cloned(),
        rel_type: rel.rel_type.clone(),
        direction: pattern_direction(rel.direction),
        properties: Vec::new(),
    }
}

/// `(parent)-[edge:TYPE]->(child)`.
pub(crate) fn traverse(
    parent: &Var,
    rel: &RelationshipField,
    edge: Option<&Var>,
    child: NodePattern,
) -> Pattern {
    Pattern::node(NodePattern::var(parent)).hop(rel_pattern(rel, edge), child)
}
