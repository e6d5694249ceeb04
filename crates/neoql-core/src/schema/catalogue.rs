//! The declarative type catalogue handed to [`SchemaModel::build`].
//!
//! This is the raw, unvalidated input: plain serde structs mirroring the
//! JSON document a deployment ships. Nothing here is checked beyond shape;
//! name resolution, directive folding and rule validation happen when the
//! catalogue is built into a [`SchemaModel`].
//!
//! ```json
//! {
//!   "nodes": [{
//!     "name": "Movie",
//!     "attributes": [{ "name": "title", "type": "String", "directives": [{ "kind": "unique" }] }],
//!     "relationships": [{ "name": "actors", "type": "ACTED_IN", "direction": "IN",
//!                         "target": "Actor", "properties": "ActedIn", "list": true }]
//!   }]
//! }
//! ```
//!
//! [`SchemaModel::build`]: super::SchemaModel::build
//! [`SchemaModel`]: super::SchemaModel

use neoql_common::types::{AuthOperation, AuthTiming, Value};
use serde::{Deserialize, Serialize};

/// The whole catalogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeCatalogue {
    /// Enumerations usable as attribute types.
    pub enums: Vec<EnumDef>,
    /// Interfaces implemented by node types.
    pub interfaces: Vec<InterfaceDef>,
    /// Unions of node types.
    pub unions: Vec<UnionDef>,
    /// Attribute sets carried by relationships.
    pub relationship_properties: Vec<PropertiesDef>,
    /// Node types.
    pub nodes: Vec<NodeDef>,
}

/// An enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    /// Type name.
    pub name: String,
    /// Allowed values, in declaration order.
    pub values: Vec<String>,
}

/// An interface: a named attribute set shared by its implementing node types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDef {
    /// Type name.
    pub name: String,
    /// Attributes every implementor must declare.
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
}

/// A union of node types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionDef {
    /// Type name.
    pub name: String,
    /// Member node type names.
    pub members: Vec<String>,
}

/// Attributes stored on a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertiesDef {
    /// Type name.
    pub name: String,
    /// Edge attributes.
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
}

/// A node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDef {
    /// Type name.
    pub name: String,
    /// Store labels; defaults to `[name]`.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Implemented interfaces.
    #[serde(default)]
    pub implements: Vec<String>,
    /// Own attributes.
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    /// Relationship fields.
    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,
    /// Type-level authorization rules.
    #[serde(default)]
    pub authorization: Vec<AuthRuleDef>,
    /// Which root operations are generated for the type.
    #[serde(default)]
    pub exposure: Exposure,
    /// Default and maximum page size for list reads.
    #[serde(default)]
    pub limit: Option<QueryLimit>,
}

/// One attribute declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDef {
    /// Field name.
    pub name: String,
    /// Value type name: a scalar (`ID`, `String`, `Int`, `BigInt`, `Float`,
    /// `Boolean`), a temporal (`Date`, `DateTime`, `LocalDateTime`, `Time`,
    /// `LocalTime`, `Duration`), a spatial (`Point`, `CartesianPoint`), or an
    /// enum name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the attribute holds a list.
    #[serde(default)]
    pub list: bool,
    /// Whether the attribute may be null.
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Directives attached to the attribute.
    #[serde(default)]
    pub directives: Vec<AttributeDirective>,
}

/// The closed set of attribute directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AttributeDirective {
    /// Values are unique across the type's nodes.
    Unique,
    /// The attribute is indexed in the store.
    Index,
    /// An identifier, generated on create unless `autogenerate` is false.
    Id {
        /// Whether the translator generates the value.
        #[serde(default = "default_true")]
        autogenerate: bool,
    },
    /// Stored under a different property name.
    Alias {
        /// The stored property name.
        property: String,
    },
    /// Value produced by a custom statement instead of a stored property.
    Computed {
        /// Statement text; must reference the `this` variable.
        statement: String,
        /// The column the statement returns.
        #[serde(rename = "columnName")]
        column_name: String,
    },
    /// Set to the current instant on the listed operations.
    Timestamp {
        /// `CREATE` and/or `UPDATE`; both when empty.
        #[serde(default)]
        operations: Vec<TimestampOperation>,
    },
    /// Value used on create when the input omits the attribute.
    Default {
        /// The default.
        value: Value,
    },
    /// Whether filters may reference the attribute.
    Filterable {
        /// Enabled flag.
        #[serde(default = "default_true")]
        enabled: bool,
    },
    /// Whether sorts may reference the attribute.
    Sortable {
        /// Enabled flag.
        #[serde(default = "default_true")]
        enabled: bool,
    },
    /// Whether mutation inputs may set the attribute.
    Settable {
        /// Settable on create.
        #[serde(default = "default_true", rename = "onCreate")]
        on_create: bool,
        /// Settable on update.
        #[serde(default = "default_true", rename = "onUpdate")]
        on_update: bool,
    },
    /// Field-level authorization rules (validate phase only).
    Authorization {
        /// The rules.
        rules: Vec<AuthRuleDef>,
    },
}

/// Operations a timestamp attribute reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimestampOperation {
    /// Set on create.
    Create,
    /// Set on update.
    Update,
}

/// A relationship field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDef {
    /// Field name.
    pub name: String,
    /// Stored relationship type.
    #[serde(rename = "type")]
    pub rel_type: String,
    /// Direction as seen from the declaring type.
    pub direction: RelationshipDirection,
    /// Target node, interface or union type.
    pub target: String,
    /// Name of the relationship-properties type, if any.
    #[serde(default)]
    pub properties: Option<String>,
    /// Whether the field holds many targets.
    #[serde(default)]
    pub list: bool,
    /// Whether the field may be empty.
    #[serde(default = "default_true")]
    pub nullable: bool,
}

/// Direction of a relationship field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipDirection {
    /// `(this)-[:T]->(target)`
    Out,
    /// `(this)<-[:T]-(target)`
    In,
    /// `(this)-[:T]-(target)`
    Undirected,
}

/// An authorization rule as declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRuleDef {
    /// Filter or validate.
    pub phase: AuthPhaseDef,
    /// Guarded operations; the phase default when empty.
    #[serde(default)]
    pub operations: Vec<AuthOperation>,
    /// Validate timing; both when empty.
    #[serde(default)]
    pub when: Vec<AuthTiming>,
    /// Whether the rule only passes for authenticated requests.
    #[serde(default = "default_true")]
    pub require_authentication: bool,
    /// The rule predicate: `{ node, jwt, AND, OR, NOT }`.
    #[serde(default, rename = "where")]
    pub predicate: Value,
}

/// Rule phase as declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthPhaseDef {
    /// Silently restricts the matched set.
    Filter,
    /// Aborts the request when the predicate fails.
    Validate,
}

/// Root operation exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Exposure {
    /// List, connection and aggregate reads.
    pub read: bool,
    /// Aggregate reads.
    pub aggregate: bool,
    /// Create mutation.
    pub create: bool,
    /// Update, connect and disconnect mutations.
    pub update: bool,
    /// Delete mutation.
    pub delete: bool,
}

impl Default for Exposure {
    fn default() -> Self {
        Self {
            read: true,
            aggregate: true,
            create: true,
            update: true,
            delete: true,
        }
    }
}

/// Page size limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLimit {
    /// Applied when the request names no limit.
    #[serde(default)]
    pub default: Option<u64>,
    /// Upper bound on any requested limit.
    #[serde(default)]
    pub max: Option<u64>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_catalogue() {
        let json = r#"{
            "nodes": [{
                "name": "Movie",
                "attributes": [
                    { "name": "id", "type": "ID", "nullable": false, "directives": [{ "kind": "id" }] },
                    { "name": "title", "type": "String", "directives": [{ "kind": "alias", "property": "name" }] },
                    { "name": "score", "type": "Float", "directives": [
                        { "kind": "computed", "statement": "RETURN this.votes / 2 AS s", "columnName": "s" }
                    ] }
                ],
                "relationships": [
                    { "name": "actors", "type": "ACTED_IN", "direction": "IN", "target": "Actor", "list": true }
                ],
                "authorization": [
                    { "phase": "validate", "operations": ["DELETE"], "where": { "jwt": { "roles_INCLUDES": "admin" } } }
                ],
                "limit": { "default": 10, "max": 100 }
            }]
        }"#;

        let catalogue: TypeCatalogue = serde_json::from_str(json).unwrap();
        let movie = &catalogue.nodes[0];
        assert_eq!(movie.attributes.len(), 3);
        assert!(!movie.attributes[0].nullable);
        assert!(movie.attributes[1].nullable);
        assert_eq!(
            movie.attributes[0].directives,
            vec![AttributeDirective::Id { autogenerate: true }]
        );
        assert!(matches!(
            &movie.attributes[2].directives[0],
            AttributeDirective::Computed { column_name, .. } if column_name == "s"
        ));
        assert_eq!(movie.relationships[0].direction, RelationshipDirection::In);
        assert!(movie.authorization[0].require_authentication);
        assert_eq!(movie.authorization[0].operations, vec![AuthOperation::Delete]);
        assert_eq!(movie.limit.and_then(|l| l.max), Some(100));
        assert!(movie.exposure.create);
    }

    #[test]
    fn test_default_directive_carries_value() {
        let json = r#"{ "kind": "default", "value": [1, 2] }"#;
        let directive: AttributeDirective = serde_json::from_str(json).unwrap();
        assert_eq!(
            directive,
            AttributeDirective::Default {
                value: Value::List(vec![1i64.into(), 2i64.into()])
            }
        );
    }
}
