//! Relationship fields and relationship-properties types.

use super::attribute::Attribute;
use super::catalogue::RelationshipDirection;
use indexmap::IndexMap;

/// What a relationship field points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A single node type.
    Node,
    /// Any implementor of an interface.
    Interface,
    /// Any member of a union.
    Union,
}

/// A resolved relationship field.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipField {
    /// Field name.
    pub name: String,
    /// Stored relationship type.
    pub rel_type: String,
    /// Direction as seen from the declaring type.
    pub direction: RelationshipDirection,
    /// Target type name.
    pub target: String,
    /// Kind of the target type.
    pub target_kind: TargetKind,
    /// Relationship-properties type name.
    pub properties: Option<String>,
    /// Many targets.
    pub list: bool,
    /// May be empty.
    pub nullable: bool,
}

impl RelationshipField {
    /// Returns true for interface and union targets.
    #[must_use]
    pub fn is_polymorphic(&self) -> bool {
        self.target_kind != TargetKind::Node
    }
}

/// Attributes stored on relationships.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyType {
    /// Type name.
    pub name: String,
    /// Edge attributes by field name.
    pub attributes: IndexMap<String, Attribute>,
}

impl PropertyType {
    /// Looks up an edge attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}
