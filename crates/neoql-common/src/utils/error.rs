//! Error types for Neoql.
//!
//! Four families, each a distinct type so callers can map them precisely:
//!
//! - [`SchemaError`]: build-time, fatal to schema construction
//! - [`TranslationError`]: per-request, fatal to that request only
//! - [`AuthorizationError`]: per-request access denial, attributable to a type
//!   and optionally a field
//! - [`BuilderError`]: internal invariant violation in a translator (a bug,
//!   never caused by the caller)

use crate::types::{AuthOperation, AuthTiming};
use std::fmt;
use thiserror::Error;

/// Result type alias for Neoql operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The top-level error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The type catalogue could not be built into a schema model.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The request could not be translated.
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// The request was denied by an authorization rule.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// A translator produced a malformed builder tree.
    #[error(transparent)]
    Builder(#[from] BuilderError),
}

impl Error {
    /// Returns true for access denials, which the serving layer maps to an
    /// access-denied response instead of a generic failure.
    #[must_use]
    pub fn is_authorization(&self) -> bool {
        matches!(self, Error::Authorization(_))
    }
}

/// Where in the type catalogue a schema error was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLocation {
    /// The type being built.
    pub type_name: String,
    /// The field of that type, if the error is field-specific.
    pub field: Option<String>,
}

impl SchemaLocation {
    /// A location naming a whole type.
    pub fn ty(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field: None,
        }
    }

    /// A location naming a field of a type.
    pub fn field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field: Some(field.into()),
        }
    }
}

impl fmt::Display for SchemaLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}.{}", self.type_name, field),
            None => f.write_str(&self.type_name),
        }
    }
}

/// Schema model build failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A type or field name is declared twice.
    #[error("duplicate name '{name}' at {location}")]
    DuplicateName {
        /// The duplicated name.
        name: String,
        /// Where the second declaration was found.
        location: SchemaLocation,
    },

    /// A reference to a type, interface, enum or attribute that does not exist.
    #[error("dangling reference to '{reference}' at {location}")]
    DanglingReference {
        /// The unresolved name.
        reference: String,
        /// Where the reference was made.
        location: SchemaLocation,
    },

    /// A computed attribute is malformed.
    #[error("invalid computed field at {location}: {reason}")]
    InvalidComputedField {
        /// What is wrong with it.
        reason: String,
        /// The attribute.
        location: SchemaLocation,
    },

    /// An authorization rule is malformed.
    #[error("invalid authorization rule at {location}: {reason}")]
    InvalidAuthorizationRule {
        /// What is wrong with it.
        reason: String,
        /// The type or field carrying the rule.
        location: SchemaLocation,
    },
}

impl SchemaError {
    /// Returns the location the error refers to.
    #[must_use]
    pub fn location(&self) -> &SchemaLocation {
        match self {
            SchemaError::DuplicateName { location, .. }
            | SchemaError::DanglingReference { location, .. }
            | SchemaError::InvalidComputedField { location, .. }
            | SchemaError::InvalidAuthorizationRule { location, .. } => location,
        }
    }
}

/// Per-request translation failures.
///
/// `path` is the dotted argument/selection path from the root field, e.g.
/// `movies.where.actors_SOME.name_CONTAINS`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// The requested root type does not exist.
    #[error("unknown type '{type_name}' at {path}")]
    UnknownType {
        /// The type name.
        type_name: String,
        /// Argument path.
        path: String,
    },

    /// A selection, filter, sort or input key names a field the type lacks.
    #[error("unknown field '{field}' on type '{type_name}' at {path}")]
    UnknownField {
        /// The type searched.
        type_name: String,
        /// The missing field.
        field: String,
        /// Argument path.
        path: String,
    },

    /// A filter operator does not apply to the field.
    #[error("invalid filter operator '{operator}' for {type_name}.{field} at {path}")]
    InvalidFilterOperator {
        /// The filtered type.
        type_name: String,
        /// The filtered field.
        field: String,
        /// The operator suffix (`CONTAINS`, `GT`, ...).
        operator: String,
        /// Argument path.
        path: String,
    },

    /// A type-conditional selection names a type the field cannot return.
    #[error("type condition '{type_condition}' cannot apply to '{field_type}' at {path}")]
    AmbiguousTypeCondition {
        /// The field's declared type.
        field_type: String,
        /// The type named by the condition.
        type_condition: String,
        /// Selection path.
        path: String,
    },

    /// An argument value is malformed.
    #[error("invalid argument '{argument}' at {path}: {reason}")]
    InvalidArgument {
        /// The argument name.
        argument: String,
        /// What is wrong with it.
        reason: String,
        /// Argument path.
        path: String,
    },

    /// The operation is not exposed for the type.
    #[error("operation {operation} is not supported on '{type_name}': {reason}")]
    UnsupportedOperation {
        /// The target type.
        type_name: String,
        /// The operation name.
        operation: String,
        /// Why it is rejected.
        reason: String,
    },
}

/// The marker every validation guard message starts with.
pub const FORBIDDEN_TAG: &str = "@neoql/FORBIDDEN";

/// An access denial attributable to a specific type and field.
///
/// The authorization compiler embeds [`AuthorizationError::to_tag`] into every
/// validation guard; when the store rejects a statement, the serving layer
/// recovers the attribution with [`AuthorizationError::from_store_message`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationError {
    /// The type whose rule failed.
    pub type_name: String,
    /// The field whose rule failed, for field-level rules.
    pub field: Option<String>,
    /// The guarded operation.
    pub operation: AuthOperation,
    /// When the rule was checked.
    pub timing: AuthTiming,
}

impl AuthorizationError {
    /// Creates an error for a type-level rule.
    pub fn new(type_name: impl Into<String>, operation: AuthOperation, timing: AuthTiming) -> Self {
        Self {
            type_name: type_name.into(),
            field: None,
            operation,
            timing,
        }
    }

    /// Attributes the error to a field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Renders the guard tag carried by the compiled statement.
    #[must_use]
    pub fn to_tag(&self) -> String {
        let mut tag = format!("{FORBIDDEN_TAG} type={}", self.type_name);
        if let Some(field) = &self.field {
            tag.push_str(" field=");
            tag.push_str(field);
        }
        tag.push_str(" op=");
        tag.push_str(self.operation.as_str());
        tag.push_str(" when=");
        tag.push_str(self.timing.as_str());
        tag
    }

    /// Recovers an error from a store failure message containing a guard tag.
    ///
    /// Returns `None` when the message carries no (well-formed) tag.
    #[must_use]
    pub fn from_store_message(message: &str) -> Option<Self> {
        let start = message.find(FORBIDDEN_TAG)? + FORBIDDEN_TAG.len();
        let mut type_name = None;
        let mut field = None;
        let mut operation = None;
        let mut timing = None;

        for token in message[start..].split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                break;
            };
            let value = value.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_');
            match key {
                "type" => type_name = Some(value.to_string()),
                "field" => field = Some(value.to_string()),
                "op" => operation = value.parse().ok(),
                "when" => timing = value.parse().ok(),
                _ => break,
            }
        }

        Some(Self {
            type_name: type_name?,
            field,
            operation: operation?,
            timing: timing?,
        })
    }
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "forbidden: {} on {}", self.operation, self.type_name)?;
        if let Some(field) = &self.field {
            write!(f, ".{field}")?;
        }
        write!(f, " ({})", self.timing)
    }
}

/// Builder tree invariant violations, detected at render time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    /// A clause references a variable no enclosing scope has bound.
    #[error("unbound variable '{name}' in {context}")]
    UnboundVariable {
        /// The variable name.
        name: String,
        /// The clause kind referencing it.
        context: &'static str,
    },

    /// A union-of-branches node has no branches.
    #[error("union with no branches in {context}")]
    EmptyUnion {
        /// Where the union was found.
        context: &'static str,
    },

    /// A name was bound twice in one scope chain.
    #[error("conflicting name '{name}': {context}")]
    ConflictingName {
        /// The variable or parameter name.
        name: String,
        /// How the conflict arose.
        context: &'static str,
    },
}
