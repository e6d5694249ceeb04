//! The schema model: types, attributes, relationships and their rules.
//!
//! A [`TypeCatalogue`] is the raw declarative input. [`SchemaModel::build`]
//! resolves every name, folds attribute directives into [`Capabilities`], and
//! validates computed fields and authorization rules, producing an immutable
//! model the translators share.

pub mod attribute;
pub mod auth;
pub mod catalogue;
mod model;
pub mod node;
pub mod relationship;

pub use attribute::{
    Attribute, Capabilities, ComputedField, ScalarType, SpatialType, TemporalType, ValueKind,
};
pub use auth::{AuthPhase, AuthRule, AuthRules};
pub use catalogue::{RelationshipDirection, TypeCatalogue};
pub use model::{SchemaModel, TypeRef};
pub use node::{FieldRef, InterfaceType, NodeType, UnionType};
pub use relationship::{PropertyType, RelationshipField, TargetKind};
