//! Attributes: typed scalar fields of nodes, interfaces and relationships.
//!
//! Directives are folded into [`Capabilities`] once, at build time, so the
//! translators never re-inspect the raw directive list.

use super::auth::AuthRules;
use super::catalogue::{AttributeDef, AttributeDirective, TimestampOperation};
use indexmap::IndexMap;
use neoql_common::types::Value;
use neoql_common::utils::error::{SchemaError, SchemaLocation};
use std::fmt;

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Opaque identifier (string-valued).
    Id,
    /// UTF-8 string.
    String,
    /// 64-bit integer.
    Int,
    /// Arbitrary precision integer.
    BigInt,
    /// 64-bit float.
    Float,
    /// Boolean.
    Boolean,
}

/// Temporal types. The store keeps native temporals; the translator converts
/// string parameters with the matching constructor and projects values back
/// with `toString`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalType {
    /// `date`
    Date,
    /// `datetime`
    DateTime,
    /// `localdatetime`
    LocalDateTime,
    /// `time`
    Time,
    /// `localtime`
    LocalTime,
    /// `duration`
    Duration,
}

impl TemporalType {
    /// The store constructor function.
    #[must_use]
    pub fn constructor(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::LocalDateTime => "localdatetime",
            Self::Time => "time",
            Self::LocalTime => "localtime",
            Self::Duration => "duration",
        }
    }
}

/// Spatial types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialType {
    /// WGS-84 point.
    Point,
    /// Cartesian point.
    CartesianPoint,
}

/// The value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// A built-in scalar.
    Scalar(ScalarType),
    /// A catalogue enum, by name.
    Enum(String),
    /// A temporal.
    Temporal(TemporalType),
    /// A point.
    Spatial(SpatialType),
}

impl ValueKind {
    /// Resolves a declared type name.
    ///
    /// Returns `None` when the name is neither built-in nor a known enum.
    #[must_use]
    pub fn resolve(name: &str, enums: &IndexMap<String, Vec<String>>) -> Option<Self> {
        let kind = match name {
            "ID" => Self::Scalar(ScalarType::Id),
            "String" => Self::Scalar(ScalarType::String),
            "Int" => Self::Scalar(ScalarType::Int),
            "BigInt" => Self::Scalar(ScalarType::BigInt),
            "Float" => Self::Scalar(ScalarType::Float),
            "Boolean" => Self::Scalar(ScalarType::Boolean),
            "Date" => Self::Temporal(TemporalType::Date),
            "DateTime" => Self::Temporal(TemporalType::DateTime),
            "LocalDateTime" => Self::Temporal(TemporalType::LocalDateTime),
            "Time" => Self::Temporal(TemporalType::Time),
            "LocalTime" => Self::Temporal(TemporalType::LocalTime),
            "Duration" => Self::Temporal(TemporalType::Duration),
            "Point" => Self::Spatial(SpatialType::Point),
            "CartesianPoint" => Self::Spatial(SpatialType::CartesianPoint),
            other if enums.contains_key(other) => Self::Enum(other.to_string()),
            _ => return None,
        };
        Some(kind)
    }

    /// String-like kinds accept the text operators.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Scalar(ScalarType::String | ScalarType::Id))
    }

    /// Numeric kinds support `min`/`max`/`sum`/`average`.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Scalar(ScalarType::Int | ScalarType::BigInt | ScalarType::Float)
        )
    }

    /// Kinds with a total order usable by `LT`/`GT` and sorting.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.is_numeric()
            || self.is_textual()
            || matches!(self, Self::Temporal(t) if *t != TemporalType::Duration)
    }

    /// Returns the temporal type, if any.
    #[must_use]
    pub fn temporal(&self) -> Option<TemporalType> {
        match self {
            Self::Temporal(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns true for point kinds.
    #[must_use]
    pub fn is_spatial(&self) -> bool {
        matches!(self, Self::Spatial(_))
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s:?}"),
            Self::Enum(name) => f.write_str(name),
            Self::Temporal(t) => write!(f, "{t:?}"),
            Self::Spatial(s) => write!(f, "{s:?}"),
        }
    }
}

/// A custom statement producing an attribute's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedField {
    /// Statement text, run with `this` bound to the owning node.
    pub statement: String,
    /// The column the statement returns.
    pub column_name: String,
}

/// What the translators may do with an attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    /// Values are unique across the type (a `MERGE` key).
    pub unique: bool,
    /// Indexed in the store.
    pub indexed: bool,
    /// Identifier generated with `randomUUID()` on create.
    pub autogenerate: bool,
    /// May appear in filters.
    pub filterable: bool,
    /// May appear in sorts.
    pub sortable: bool,
    /// May be set by create inputs.
    pub settable_on_create: bool,
    /// May be set by update inputs.
    pub settable_on_update: bool,
    /// Set to `datetime()` on create.
    pub timestamp_on_create: bool,
    /// Set to `datetime()` on update.
    pub timestamp_on_update: bool,
    /// Value used on create when the input omits the attribute.
    pub default: Option<Value>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            unique: false,
            indexed: false,
            autogenerate: false,
            filterable: true,
            sortable: true,
            settable_on_create: true,
            settable_on_update: true,
            timestamp_on_create: false,
            timestamp_on_update: false,
            default: None,
        }
    }
}

/// A resolved attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Field name as seen by requests.
    pub name: String,
    /// Property name in the store.
    pub stored_name: String,
    /// Value type.
    pub kind: ValueKind,
    /// Whether the value is a list.
    pub list: bool,
    /// Whether the value may be null.
    pub nullable: bool,
    /// Folded directives.
    pub capabilities: Capabilities,
    /// Present for computed attributes.
    pub computed: Option<ComputedField>,
    /// Field-level rules.
    pub auth: AuthRules,
}

impl Attribute {
    /// Resolves an attribute declaration owned by `owner`.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::DanglingReference`] for an unknown value type
    /// - [`SchemaError::InvalidComputedField`] for a malformed computed field
    /// - [`SchemaError::InvalidAuthorizationRule`] for a malformed field rule
    pub fn build(
        owner: &str,
        def: &AttributeDef,
        enums: &IndexMap<String, Vec<String>>,
    ) -> Result<Self, SchemaError> {
        let location = SchemaLocation::field(owner, &def.name);
        let kind = ValueKind::resolve(&def.type_name, enums).ok_or_else(|| {
            SchemaError::DanglingReference {
                reference: def.type_name.clone(),
                location: location.clone(),
            }
        })?;

        let mut attribute = Self {
            name: def.name.clone(),
            stored_name: def.name.clone(),
            kind,
            list: def.list,
            nullable: def.nullable,
            capabilities: Capabilities::default(),
            computed: None,
            auth: AuthRules::default(),
        };

        // Directives that are meaningless on a computed value.
        let mut stored_only: Option<&'static str> = None;

        for directive in &def.directives {
            let caps = &mut attribute.capabilities;
            match directive {
                AttributeDirective::Unique => {
                    caps.unique = true;
                    stored_only = Some("unique");
                }
                AttributeDirective::Index => {
                    caps.indexed = true;
                    stored_only = Some("index");
                }
                AttributeDirective::Id { autogenerate } => {
                    caps.unique = true;
                    caps.autogenerate = *autogenerate;
                    if *autogenerate {
                        caps.settable_on_create = false;
                        caps.settable_on_update = false;
                    }
                    stored_only = Some("id");
                }
                AttributeDirective::Alias { property } => {
                    attribute.stored_name.clone_from(property);
                    stored_only = Some("alias");
                }
                AttributeDirective::Computed {
                    statement,
                    column_name,
                } => {
                    attribute.computed = Some(ComputedField {
                        statement: statement.clone(),
                        column_name: column_name.clone(),
                    });
                }
                AttributeDirective::Timestamp { operations } => {
                    let all = operations.is_empty();
                    caps.timestamp_on_create = all || operations.contains(&TimestampOperation::Create);
                    caps.timestamp_on_update = all || operations.contains(&TimestampOperation::Update);
                    caps.settable_on_create &= !caps.timestamp_on_create;
                    caps.settable_on_update &= !caps.timestamp_on_update;
                    stored_only = Some("timestamp");
                }
                AttributeDirective::Default { value } => {
                    caps.default = Some(value.clone());
                    stored_only = Some("default");
                }
                AttributeDirective::Filterable { enabled } => caps.filterable = *enabled,
                AttributeDirective::Sortable { enabled } => caps.sortable = *enabled,
                AttributeDirective::Settable {
                    on_create,
                    on_update,
                } => {
                    caps.settable_on_create &= *on_create;
                    caps.settable_on_update &= *on_update;
                    stored_only = Some("settable");
                }
                AttributeDirective::Authorization { rules } => {
                    attribute.auth = AuthRules::from_defs(rules, &location, true)?;
                }
            }
        }

        if let Some(computed) = &attribute.computed {
            let invalid = |reason: String| SchemaError::InvalidComputedField {
                reason,
                location: location.clone(),
            };
            if let Some(directive) = stored_only {
                return Err(invalid(format!(
                    "'{directive}' cannot be combined with a computed value"
                )));
            }
            if !contains_token(&computed.statement, "this") {
                return Err(invalid("statement does not reference 'this'".to_string()));
            }
            if !contains_keyword(&computed.statement, "RETURN") {
                return Err(invalid("statement has no RETURN clause".to_string()));
            }
            if !is_identifier(&computed.column_name) {
                return Err(invalid(format!(
                    "column name '{}' is not an identifier",
                    computed.column_name
                )));
            }
            if !contains_token(&computed.statement, &computed.column_name) {
                return Err(invalid(format!(
                    "statement never returns column '{}'",
                    computed.column_name
                )));
            }
            let caps = &mut attribute.capabilities;
            caps.filterable = false;
            caps.sortable = false;
            caps.settable_on_create = false;
            caps.settable_on_update = false;
        }

        Ok(attribute)
    }

    /// Returns true if the value comes from a custom statement.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }
}

/// Returns true if `name` is a plain identifier.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Finds `token` as a whole identifier, outside string literals.
///
/// `this` matches in `this.title` and `(this)` but not in `this0` or
/// `"this"`.
fn contains_token(text: &str, token: &str) -> bool {
    identifiers(text).any(|ident| ident == token)
}

fn contains_keyword(text: &str, keyword: &str) -> bool {
    identifiers(text).any(|ident| ident.eq_ignore_ascii_case(keyword))
}

fn identifiers(text: &str) -> impl Iterator<Item = &str> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos < bytes.len() {
            let b = bytes[pos];
            if b == b'"' || b == b'\'' || b == b'`' {
                pos += 1;
                while pos < bytes.len() && bytes[pos] != b {
                    if bytes[pos] == b'\\' {
                        pos += 1;
                    }
                    pos += 1;
                }
                pos += 1;
            } else if b.is_ascii_alphabetic() || b == b'_' {
                let start = pos;
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                return Some(&text[start..pos]);
            } else {
                pos += 1;
            }
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(json: &str) -> Result<Attribute, SchemaError> {
        let def: AttributeDef = serde_json::from_str(json).unwrap();
        let mut enums = IndexMap::new();
        enums.insert("Genre".to_string(), vec!["DRAMA".to_string()]);
        Attribute::build("Movie", &def, &enums)
    }

    #[test]
    fn test_fold_directives() {
        let attr = build(
            r#"{ "name": "title", "type": "String", "directives": [
                { "kind": "alias", "property": "movieTitle" },
                { "kind": "unique" },
                { "kind": "sortable", "enabled": false }
            ] }"#,
        )
        .unwrap();
        assert_eq!(attr.stored_name, "movieTitle");
        assert!(attr.capabilities.unique);
        assert!(!attr.capabilities.sortable);
        assert!(attr.capabilities.filterable);
        assert!(attr.kind.is_textual());
    }

    #[test]
    fn test_id_and_timestamp() {
        let id = build(r#"{ "name": "id", "type": "ID", "directives": [{ "kind": "id" }] }"#).unwrap();
        assert!(id.capabilities.autogenerate);
        assert!(!id.capabilities.settable_on_create);

        let ts = build(
            r#"{ "name": "updatedAt", "type": "DateTime", "directives": [
                { "kind": "timestamp", "operations": ["UPDATE"] }
            ] }"#,
        )
        .unwrap();
        assert!(!ts.capabilities.timestamp_on_create);
        assert!(ts.capabilities.timestamp_on_update);
        assert!(ts.capabilities.settable_on_create);
        assert!(!ts.capabilities.settable_on_update);
        assert_eq!(ts.kind.temporal().map(TemporalType::constructor), Some("datetime"));
    }

    #[test]
    fn test_enum_and_unknown_type() {
        let attr = build(r#"{ "name": "genre", "type": "Genre" }"#).unwrap();
        assert_eq!(attr.kind, ValueKind::Enum("Genre".to_string()));

        let err = build(r#"{ "name": "genre", "type": "Mood" }"#).unwrap_err();
        assert!(matches!(err, SchemaError::DanglingReference { reference, .. } if reference == "Mood"));
    }

    #[test]
    fn test_computed_field() {
        let attr = build(
            r#"{ "name": "score", "type": "Float", "directives": [
                { "kind": "computed", "statement": "MATCH (this)<-[r:RATED]-() RETURN avg(r.stars) AS score", "columnName": "score" }
            ] }"#,
        )
        .unwrap();
        assert!(attr.is_computed());
        assert!(!attr.capabilities.filterable);
        assert!(!attr.capabilities.settable_on_create);
    }

    #[test]
    fn test_invalid_computed_fields() {
        let cases = [
            // no `this`
            r#"{ "kind": "computed", "statement": "MATCH (this0) RETURN 1 AS x", "columnName": "x" }"#,
            // `this` only inside a string
            r#"{ "kind": "computed", "statement": "RETURN 'this' AS x", "columnName": "x" }"#,
            // no RETURN
            r#"{ "kind": "computed", "statement": "MATCH (this) WITH this AS x", "columnName": "x" }"#,
            // bad column
            r#"{ "kind": "computed", "statement": "RETURN this.a AS x", "columnName": "1x" }"#,
            // column never returned
            r#"{ "kind": "computed", "statement": "RETURN this.a AS x", "columnName": "y" }"#,
        ];
        for directive in cases {
            let json = format!(r#"{{ "name": "x", "type": "Int", "directives": [{directive}] }}"#);
            let err = build(&json).unwrap_err();
            assert!(
                matches!(err, SchemaError::InvalidComputedField { .. }),
                "{directive} should be rejected"
            );
        }

        let err = build(
            r#"{ "name": "x", "type": "Int", "directives": [
                { "kind": "unique" },
                { "kind": "computed", "statement": "RETURN this.a AS x", "columnName": "x" }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidComputedField { reason, .. } if reason.contains("unique")));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("this_0"));
        assert!(is_identifier("_x"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
