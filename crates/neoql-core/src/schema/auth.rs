//! Authorization rules attached to node types and attributes.

use super::catalogue::{AuthPhaseDef, AuthRuleDef};
use neoql_common::types::{AuthOperation, AuthTiming, Value};
use neoql_common::utils::error::{SchemaError, SchemaLocation};
use smallvec::SmallVec;

/// Whether a rule restricts results or aborts the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthPhase {
    /// Conjoined into the match predicate; non-matching entities vanish.
    Filter,
    /// Compiled into a guard that aborts the whole statement.
    Validate,
}

/// Operations a filter rule covers when it lists none.
///
/// `CREATE` is absent: there is nothing to filter before a node exists.
const FILTER_DEFAULT: [AuthOperation; 5] = [
    AuthOperation::Read,
    AuthOperation::Update,
    AuthOperation::Delete,
    AuthOperation::CreateRelationship,
    AuthOperation::DeleteRelationship,
];

/// Operations a field-level rule may name.
const FIELD_OPERATIONS: [AuthOperation; 3] = [
    AuthOperation::Read,
    AuthOperation::Create,
    AuthOperation::Update,
];

const PREDICATE_KEYS: [&str; 5] = ["node", "jwt", "AND", "OR", "NOT"];

/// A validated authorization rule.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRule {
    /// The rule phase.
    pub phase: AuthPhase,
    /// Guarded operations (defaults already applied).
    pub operations: SmallVec<[AuthOperation; 6]>,
    /// Validate timings (both when the declaration named none).
    pub timings: SmallVec<[AuthTiming; 2]>,
    /// Whether `$isAuthenticated = true` is conjoined.
    pub require_authentication: bool,
    /// The `{ node, jwt, AND, OR, NOT }` predicate, or `Null`.
    pub predicate: Value,
}

impl AuthRule {
    /// Validates a declared rule.
    ///
    /// Field-level rules must be validate rules over `READ`, `CREATE` or
    /// `UPDATE`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidAuthorizationRule`] for malformed rules.
    pub fn from_def(
        def: &AuthRuleDef,
        location: &SchemaLocation,
        field_level: bool,
    ) -> Result<Self, SchemaError> {
        let invalid = |reason: &str| SchemaError::InvalidAuthorizationRule {
            reason: reason.to_string(),
            location: location.clone(),
        };

        let phase = match def.phase {
            AuthPhaseDef::Filter => AuthPhase::Filter,
            AuthPhaseDef::Validate => AuthPhase::Validate,
        };

        if field_level && phase == AuthPhase::Filter {
            return Err(invalid("field-level rules must be validate rules"));
        }
        if phase == AuthPhase::Filter && !def.when.is_empty() {
            return Err(invalid("timing only applies to validate rules"));
        }

        let mut operations: SmallVec<[AuthOperation; 6]> = SmallVec::new();
        for op in &def.operations {
            if !operations.contains(op) {
                operations.push(*op);
            }
        }
        if operations.is_empty() {
            operations = match (phase, field_level) {
                (AuthPhase::Filter, _) => FILTER_DEFAULT.iter().copied().collect(),
                (AuthPhase::Validate, true) => FIELD_OPERATIONS.iter().copied().collect(),
                (AuthPhase::Validate, false) => AuthOperation::ALL.iter().copied().collect(),
            };
        }

        if phase == AuthPhase::Filter && operations.contains(&AuthOperation::Create) {
            return Err(invalid("CREATE cannot be filtered"));
        }
        if field_level && operations.iter().any(|op| !FIELD_OPERATIONS.contains(op)) {
            return Err(invalid(
                "field-level rules only guard READ, CREATE and UPDATE",
            ));
        }

        let mut timings: SmallVec<[AuthTiming; 2]> = SmallVec::new();
        for timing in &def.when {
            if !timings.contains(timing) {
                timings.push(*timing);
            }
        }
        if timings.is_empty() {
            timings.push(AuthTiming::Before);
            timings.push(AuthTiming::After);
        }

        if def.predicate.is_null() {
            if !def.require_authentication {
                return Err(invalid("rule has neither a predicate nor requires authentication"));
            }
        } else {
            check_predicate(&def.predicate).map_err(|reason| invalid(&reason))?;
        }

        Ok(Self {
            phase,
            operations,
            timings,
            require_authentication: def.require_authentication,
            predicate: def.predicate.clone(),
        })
    }

    /// Returns true if the rule guards `operation` in `phase` at `timing`.
    ///
    /// Timing is ignored for filter rules.
    #[must_use]
    pub fn applies(&self, phase: AuthPhase, operation: AuthOperation, timing: AuthTiming) -> bool {
        self.phase == phase
            && self.operations.contains(&operation)
            && (phase == AuthPhase::Filter || self.timings.contains(&timing))
    }
}

/// Structural check of a rule predicate. Filter keys under `node` and `jwt`
/// are resolved when the rule is compiled.
fn check_predicate(value: &Value) -> Result<(), String> {
    let Some(map) = value.as_map() else {
        return Err(format!("predicate must be a map, found {}", value.type_name()));
    };
    for (key, inner) in map {
        match key.as_str() {
            "node" | "jwt" => {
                if inner.as_map().is_none() {
                    return Err(format!("'{key}' must be a map"));
                }
            }
            "AND" | "OR" => {
                let Some(items) = inner.as_list() else {
                    return Err(format!("'{key}' must be a list"));
                };
                for item in items {
                    check_predicate(item)?;
                }
            }
            "NOT" => check_predicate(inner)?,
            other => {
                return Err(format!(
                    "unknown predicate key '{other}', expected one of {}",
                    PREDICATE_KEYS.join(", ")
                ));
            }
        }
    }
    Ok(())
}

/// The rules carried by one type or attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthRules {
    rules: Vec<AuthRule>,
}

impl AuthRules {
    /// Validates a list of declared rules.
    ///
    /// # Errors
    ///
    /// Returns the first invalid rule's error.
    pub fn from_defs(
        defs: &[AuthRuleDef],
        location: &SchemaLocation,
        field_level: bool,
    ) -> Result<Self, SchemaError> {
        let rules = defs
            .iter()
            .map(|def| AuthRule::from_def(def, location, field_level))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Iterates over rules applying to `operation` in `phase` at `timing`.
    pub fn applicable(
        &self,
        phase: AuthPhase,
        operation: AuthOperation,
        timing: AuthTiming,
    ) -> impl Iterator<Item = &AuthRule> {
        self.rules
            .iter()
            .filter(move |rule| rule.applies(phase, operation, timing))
    }
}
