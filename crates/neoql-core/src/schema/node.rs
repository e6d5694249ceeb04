//! Node, interface and union types.

use super::attribute::Attribute;
use super::auth::AuthRules;
use super::catalogue::{Exposure, QueryLimit};
use super::relationship::RelationshipField;
use indexmap::IndexMap;

/// A field of a node type.
#[derive(Debug, Clone, Copy)]
pub enum FieldRef<'a> {
    /// A scalar attribute.
    Attribute(&'a Attribute),
    /// A relationship field.
    Relationship(&'a RelationshipField),
}

/// A concrete node type.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeType {
    /// Type name.
    pub name: String,
    /// Store labels, never empty.
    pub labels: Vec<String>,
    /// Implemented interfaces.
    pub interfaces: Vec<String>,
    /// All attributes: interface attributes first, then own attributes,
    /// each in declaration order.
    pub attributes: IndexMap<String, Attribute>,
    /// Relationship fields.
    pub relationships: IndexMap<String, RelationshipField>,
    /// Type-level rules.
    pub auth: AuthRules,
    /// Generated root operations.
    pub exposure: Exposure,
    /// Page size limits.
    pub limit: Option<QueryLimit>,
}

impl NodeType {
    /// Looks up an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Looks up a relationship field.
    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&RelationshipField> {
        self.relationships.get(name)
    }

    /// Looks up any field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        self.attribute(name)
            .map(FieldRef::Attribute)
            .or_else(|| self.relationship(name).map(FieldRef::Relationship))
    }

    /// Returns true if the type implements `interface`.
    #[must_use]
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }

    /// Attributes generated on create: ids, timestamps, defaults.
    pub fn generated_on_create(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values().filter(|a| {
            a.capabilities.autogenerate
                || a.capabilities.timestamp_on_create
                || a.capabilities.default.is_some()
        })
    }

    /// Attributes that are `MERGE` keys.
    pub fn unique_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values().filter(|a| a.capabilities.unique)
    }
}

/// An interface.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceType {
    /// Type name.
    pub name: String,
    /// Shared attributes.
    pub attributes: IndexMap<String, Attribute>,
    /// Implementing node types, in catalogue order.
    pub members: Vec<String>,
}

impl InterfaceType {
    /// Looks up a shared attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

/// A union of node types.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionType {
    /// Type name.
    pub name: String,
    /// Member node types.
    pub members: Vec<String>,
}
