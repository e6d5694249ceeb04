//! Compiles authorization rules into filter predicates and guard clauses.
//!
//! Filter-phase rules narrow the rows a statement sees and are AND-ed into
//! the owning match. Validate-phase rules become [`ValidateClause`] guards
//! whose tag attributes a failure to a type, field, operation and timing.

use super::context::{ArgPath, Context, claim_expr, expect_map, invalid_argument};
use super::plan::{Clause, CompareOp, Expr, ValidateClause, Var};
use super::predicate::{
    FilterMode, FilterTarget, Operator, PredicateCompiler, Subject,
};
use neoql_common::types::{AuthOperation, AuthTiming, Value};
use neoql_common::utils::error::{AuthorizationError, Result};
use neoql_core::schema::{Attribute, AuthPhase, AuthRules, NodeType};

/// Compiles the rules applying to `operation` into one predicate over
/// `subject`: any applicable rule grants. Returns `None` when no rule
/// applies.
pub fn rules_predicate<'a>(
    ctx: &mut Context<'a>,
    rules: &AuthRules,
    subject: &Subject<'a>,
    phase: AuthPhase,
    operation: AuthOperation,
    timing: AuthTiming,
) -> Result<Option<Expr>> {
    let path = ArgPath::root("@authorization");
    let mut grants = Vec::new();
    for (i, rule) in rules.applicable(phase, operation, timing).enumerate() {
        let mut parts = Vec::with_capacity(2);
        if rule.require_authentication {
            parts.push(Expr::compare(
                ctx.is_authenticated(),
                CompareOp::Eq,
                Expr::bool(true),
            ));
        }
        parts.push(rule_where(ctx, &rule.predicate, subject, &path.index(i))?);
        grants.push(Expr::and(parts));
    }
    if grants.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Expr::or(grants)))
    }
}

/// `{ node, jwt, AND, OR, NOT }`.
fn rule_where<'a>(
    ctx: &mut Context<'a>,
    predicate: &Value,
    subject: &Subject<'a>,
    path: &ArgPath,
) -> Result<Expr> {
    if predicate.is_null() {
        return Ok(Expr::bool(true));
    }
    let map = expect_map(predicate, "where", path)?;
    let mut parts = Vec::with_capacity(map.len());
    for (key, value) in map {
        let path = path.child(key);
        let part = match key.as_str() {
            "node" => PredicateCompiler::new(FilterMode::Authorization)
                .compile(ctx, value, subject, &path)?,
            "jwt" => jwt_filter(ctx, value, &path)?,
            "AND" | "OR" => {
                let items = value
                    .as_list()
                    .ok_or_else(|| invalid_argument(key, "expected a list", &path))?;
                let mut compiled = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    compiled.push(rule_where(ctx, item, subject, &path.index(i))?);
                }
                if key == "AND" {
                    Expr::and(compiled)
                } else {
                    Expr::or(compiled)
                }
            }
            "NOT" => ctx.hoist_claims(|ctx| Ok(Expr::not(rule_where(ctx, value, subject, &path)?)))?,
            other => return Err(invalid_argument(other, "unknown rule key", &path)),
        };
        parts.push(part);
    }
    Ok(Expr::and(parts))
}

/// A filter over the caller's claims: `{ roles_INCLUDES: "admin" }`.
fn jwt_filter(ctx: &mut Context<'_>, filter: &Value, path: &ArgPath) -> Result<Expr> {
    let map = expect_map(filter, "jwt", path)?;
    let mut parts = Vec::with_capacity(map.len());
    for (key, value) in map {
        let path = path.child(key);
        let part = match key.as_str() {
            "AND" | "OR" => {
                let items = value
                    .as_list()
                    .ok_or_else(|| invalid_argument(key, "expected a list", &path))?;
                let mut compiled = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    compiled.push(jwt_filter(ctx, item, &path.index(i))?);
                }
                if key == "AND" {
                    Expr::and(compiled)
                } else {
                    Expr::or(compiled)
                }
            }
            "NOT" => ctx.hoist_claims(|ctx| Ok(Expr::not(jwt_filter(ctx, value, &path)?)))?,
            _ => {
                let (claim, op) = Operator::split(key);
                let left = claim_expr(ctx, claim);
                if value.is_null() {
                    match op {
                        Operator::Equal => left.is_null(),
                        Operator::NotEqual => left.is_not_null(),
                        _ => {
                            return Err(invalid_argument(
                                key,
                                "null is only valid for equality",
                                &path,
                            ));
                        }
                    }
                } else {
                    let right = ctx.namer.param(value.clone());
                    let comparison = op.compare(left.clone(), right).ok_or_else(|| {
                        invalid_argument(
                            key,
                            format!("operator {} does not apply to claims", op.name()),
                            &path,
                        )
                    })?;
                    Expr::and(ctx.claim_guard(claim).into_iter().chain([comparison]))
                }
            }
        };
        parts.push(part);
    }
    Ok(Expr::and(parts))
}

/// The filter-phase predicate for rows of `node` bound to `var`.
pub fn filter<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    var: &Var,
    operation: AuthOperation,
) -> Result<Option<Expr>> {
    rules_predicate(
        ctx,
        &node.auth,
        &Subject::new(var, FilterTarget::Node(node)),
        AuthPhase::Filter,
        operation,
        AuthTiming::Before,
    )
}

/// The type-level validate guard for `node` bound to `var`.
pub fn type_guard<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    var: &Var,
    operation: AuthOperation,
    timing: AuthTiming,
) -> Result<Option<Clause>> {
    let subject = Subject::new(var, FilterTarget::Node(node));
    let predicate = rules_predicate(
        ctx,
        &node.auth,
        &subject,
        AuthPhase::Validate,
        operation,
        timing,
    )?;
    Ok(predicate.map(|predicate| {
        Clause::Validate(ValidateClause {
            predicate,
            tag: AuthorizationError::new(&node.name, operation, timing).to_tag(),
        })
    }))
}

/// One guard per listed attribute carrying field rules for `operation`.
pub fn field_guards<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    var: &Var,
    fields: &[&'a Attribute],
    operation: AuthOperation,
    timing: AuthTiming,
) -> Result<Vec<Clause>> {
    let subject = Subject::new(var, FilterTarget::Node(node));
    let mut clauses = Vec::new();
    for attr in fields {
        if attr.auth.is_empty() {
            continue;
        }
        if let Some(predicate) = rules_predicate(
            ctx,
            &attr.auth,
            &subject,
            AuthPhase::Validate,
            operation,
            timing,
        )? {
            clauses.push(Clause::Validate(ValidateClause {
                predicate,
                tag: AuthorizationError::new(&node.name, operation, timing)
                    .with_field(&attr.name)
                    .to_tag(),
            }));
        }
    }
    Ok(clauses)
}

/// Validate-phase guards for `node` bound to `var`: the type-level guard,
/// then the guards of the listed attributes.
pub fn guards<'a>(
    ctx: &mut Context<'a>,
    node: &'a NodeType,
    var: &Var,
    fields: &[&'a Attribute],
    operation: AuthOperation,
    timing: AuthTiming,
) -> Result<Vec<Clause>> {
    let mut clauses: Vec<Clause> = type_guard(ctx, node, var, operation, timing)?
        .into_iter()
        .collect();
    clauses.extend(field_guards(ctx, node, var, fields, operation, timing)?);
    Ok(clauses)
}
