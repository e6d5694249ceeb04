//! The validated, immutable schema model.

use super::attribute::Attribute;
use super::auth::AuthRules;
use super::catalogue::{AttributeDef, NodeDef, TypeCatalogue};
use super::node::{InterfaceType, NodeType, UnionType};
use super::relationship::{PropertyType, RelationshipField, TargetKind};
use indexmap::IndexMap;
use neoql_common::utils::error::{SchemaError, SchemaLocation};
use neoql_common::utils::hash::FxHashSet;

/// A resolved reference to any named object type.
#[derive(Debug, Clone, Copy)]
pub enum TypeRef<'a> {
    /// A node type.
    Node(&'a NodeType),
    /// An interface.
    Interface(&'a InterfaceType),
    /// A union.
    Union(&'a UnionType),
}

impl<'a> TypeRef<'a> {
    /// The type name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            TypeRef::Node(n) => &n.name,
            TypeRef::Interface(i) => &i.name,
            TypeRef::Union(u) => &u.name,
        }
    }
}

/// The validated schema model.
///
/// Built once from a [`TypeCatalogue`] and shared read-only by every
/// translation; nothing in it changes after [`SchemaModel::build`] returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaModel {
    enums: IndexMap<String, Vec<String>>,
    interfaces: IndexMap<String, InterfaceType>,
    unions: IndexMap<String, UnionType>,
    properties: IndexMap<String, PropertyType>,
    nodes: IndexMap<String, NodeType>,
}

impl SchemaModel {
    /// Builds and validates a schema model.
    ///
    /// # Errors
    ///
    /// Returns the first problem found:
    /// - [`SchemaError::DuplicateName`] for a type or field declared twice
    /// - [`SchemaError::DanglingReference`] for an unresolvable type name, or
    ///   an implementor missing an interface attribute
    /// - [`SchemaError::InvalidComputedField`]
    /// - [`SchemaError::InvalidAuthorizationRule`]
    pub fn build(catalogue: &TypeCatalogue) -> Result<Self, SchemaError> {
        check_type_names(catalogue)?;

        let mut model = SchemaModel::default();

        for def in &catalogue.enums {
            let mut seen = FxHashSet::default();
            for value in &def.values {
                if !seen.insert(value.as_str()) {
                    return Err(SchemaError::DuplicateName {
                        name: value.clone(),
                        location: SchemaLocation::ty(&def.name),
                    });
                }
            }
            model.enums.insert(def.name.clone(), def.values.clone());
        }

        for def in &catalogue.relationship_properties {
            let attributes = model.build_attributes(&def.name, &def.attributes)?;
            if let Some(attr) = attributes.values().find(|a| a.is_computed()) {
                return Err(SchemaError::InvalidComputedField {
                    reason: "relationship properties cannot be computed".to_string(),
                    location: SchemaLocation::field(&def.name, &attr.name),
                });
            }
            model.properties.insert(
                def.name.clone(),
                PropertyType {
                    name: def.name.clone(),
                    attributes,
                },
            );
        }

        for def in &catalogue.interfaces {
            let attributes = model.build_attributes(&def.name, &def.attributes)?;
            model.interfaces.insert(
                def.name.clone(),
                InterfaceType {
                    name: def.name.clone(),
                    attributes,
                    members: Vec::new(),
                },
            );
        }

        for def in &catalogue.unions {
            model.unions.insert(
                def.name.clone(),
                UnionType {
                    name: def.name.clone(),
                    members: def.members.clone(),
                },
            );
        }

        for def in &catalogue.nodes {
            let node = model.build_node(catalogue, def)?;
            for interface in &node.interfaces {
                if let Some(iface) = model.interfaces.get_mut(interface) {
                    iface.members.push(node.name.clone());
                }
            }
            model.nodes.insert(def.name.clone(), node);
        }

        for union in model.unions.values() {
            let mut seen = FxHashSet::default();
            for member in &union.members {
                if !model.nodes.contains_key(member) {
                    return Err(SchemaError::DanglingReference {
                        reference: member.clone(),
                        location: SchemaLocation::ty(&union.name),
                    });
                }
                if !seen.insert(member.as_str()) {
                    return Err(SchemaError::DuplicateName {
                        name: member.clone(),
                        location: SchemaLocation::ty(&union.name),
                    });
                }
            }
        }

        tracing::debug!(
            nodes = model.nodes.len(),
            interfaces = model.interfaces.len(),
            unions = model.unions.len(),
            "schema model built"
        );

        Ok(model)
    }

    fn build_attributes(
        &self,
        owner: &str,
        defs: &[AttributeDef],
    ) -> Result<IndexMap<String, Attribute>, SchemaError> {
        let mut attributes = IndexMap::with_capacity(defs.len());
        for def in defs {
            let attr = Attribute::build(owner, def, &self.enums)?;
            if attributes.contains_key(&attr.name) {
                return Err(SchemaError::DuplicateName {
                    name: attr.name,
                    location: SchemaLocation::ty(owner),
                });
            }
            attributes.insert(attr.name.clone(), attr);
        }
        Ok(attributes)
    }

    fn build_node(&self, catalogue: &TypeCatalogue, def: &NodeDef) -> Result<NodeType, SchemaError> {
        let own = self.build_attributes(&def.name, &def.attributes)?;

        // Interface attributes come first, in `implements` order.
        let mut attributes: IndexMap<String, Attribute> = IndexMap::with_capacity(own.len());
        for interface in &def.implements {
            let iface = self.interfaces.get(interface).ok_or_else(|| {
                SchemaError::DanglingReference {
                    reference: interface.clone(),
                    location: SchemaLocation::ty(&def.name),
                }
            })?;
            for shared in iface.attributes.values() {
                let compatible = own.get(&shared.name).filter(|attr| {
                    attr.kind == shared.kind
                        && attr.list == shared.list
                        && attr.stored_name == shared.stored_name
                });
                let Some(attr) = compatible else {
                    return Err(SchemaError::DanglingReference {
                        reference: format!("{}.{}", iface.name, shared.name),
                        location: SchemaLocation::field(&def.name, &shared.name),
                    });
                };
                attributes
                    .entry(attr.name.clone())
                    .or_insert_with(|| attr.clone());
            }
        }
        for (name, attr) in own {
            attributes.entry(name).or_insert(attr);
        }

        let mut relationships = IndexMap::with_capacity(def.relationships.len());
        for rel in &def.relationships {
            let location = SchemaLocation::field(&def.name, &rel.name);
            if attributes.contains_key(&rel.name) || relationships.contains_key(&rel.name) {
                return Err(SchemaError::DuplicateName {
                    name: rel.name.clone(),
                    location,
                });
            }
            let target_kind = if catalogue.nodes.iter().any(|n| n.name == rel.target) {
                TargetKind::Node
            } else if self.interfaces.contains_key(&rel.target) {
                TargetKind::Interface
            } else if self.unions.contains_key(&rel.target) {
                TargetKind::Union
            } else {
                return Err(SchemaError::DanglingReference {
                    reference: rel.target.clone(),
                    location,
                });
            };
            if let Some(properties) = &rel.properties {
                if !self.properties.contains_key(properties) {
                    return Err(SchemaError::DanglingReference {
                        reference: properties.clone(),
                        location,
                    });
                }
            }
            relationships.insert(
                rel.name.clone(),
                RelationshipField {
                    name: rel.name.clone(),
                    rel_type: rel.rel_type.clone(),
                    direction: rel.direction,
                    target: rel.target.clone(),
                    target_kind,
                    properties: rel.properties.clone(),
                    list: rel.list,
                    nullable: rel.nullable,
                },
            );
        }

        // Generated `<rel>Connection` and `<rel>Aggregate` fields share the namespace.
        for rel in relationships.keys() {
            for generated in [format!("{rel}Connection"), format!("{rel}Aggregate")] {
                if attributes.contains_key(&generated) || relationships.contains_key(&generated) {
                    return Err(SchemaError::DuplicateName {
                        location: SchemaLocation::field(&def.name, &generated),
                        name: generated,
                    });
                }
            }
        }

        let labels = if def.labels.is_empty() {
            vec![def.name.clone()]
        } else {
            def.labels.clone()
        };

        Ok(NodeType {
            name: def.name.clone(),
            labels,
            interfaces: def.implements.clone(),
            attributes,
            relationships,
            auth: AuthRules::from_defs(&def.authorization, &SchemaLocation::ty(&def.name), false)?,
            exposure: def.exposure,
            limit: def.limit,
        })
    }

    /// Looks up a node type.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&NodeType> {
        self.nodes.get(name)
    }

    /// Looks up an interface.
    #[must_use]
    pub fn interface(&self, name: &str) -> Option<&InterfaceType> {
        self.interfaces.get(name)
    }

    /// Looks up a union.
    #[must_use]
    pub fn union(&self, name: &str) -> Option<&UnionType> {
        self.unions.get(name)
    }

    /// Looks up a relationship-properties type.
    #[must_use]
    pub fn property_type(&self, name: &str) -> Option<&PropertyType> {
        self.properties.get(name)
    }

    /// Returns the values of an enum.
    #[must_use]
    pub fn enum_values(&self, name: &str) -> Option<&[String]> {
        self.enums.get(name).map(Vec::as_slice)
    }

    /// Resolves any object type name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<TypeRef<'_>> {
        self.node(name)
            .map(TypeRef::Node)
            .or_else(|| self.interface(name).map(TypeRef::Interface))
            .or_else(|| self.union(name).map(TypeRef::Union))
    }

    /// The concrete node types a type name stands for: the node itself, or
    /// the members of an interface or union.
    #[must_use]
    pub fn members(&self, name: &str) -> Vec<&NodeType> {
        let names: &[String] = match self.resolve(name) {
            Some(TypeRef::Node(node)) => return vec![node],
            Some(TypeRef::Interface(iface)) => &iface.members,
            Some(TypeRef::Union(union)) => &union.members,
            None => return Vec::new(),
        };
        names.iter().filter_map(|n| self.node(n)).collect()
    }

    /// Iterates over node types in catalogue order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeType> {
        self.nodes.values()
    }

    /// Iterates over interfaces in catalogue order.
    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceType> {
        self.interfaces.values()
    }

    /// Iterates over unions in catalogue order.
    pub fn unions(&self) -> impl Iterator<Item = &UnionType> {
        self.unions.values()
    }

    /// Iterates over relationship-properties types.
    pub fn property_types(&self) -> impl Iterator<Item = &PropertyType> {
        self.properties.values()
    }

    /// Iterates over enums and their values.
    pub fn enums(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.enums.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

fn check_type_names(catalogue: &TypeCatalogue) -> Result<(), SchemaError> {
    let mut seen = FxHashSet::default();
    let names = catalogue
        .enums
        .iter()
        .map(|d| &d.name)
        .chain(catalogue.interfaces.iter().map(|d| &d.name))
        .chain(catalogue.unions.iter().map(|d| &d.name))
        .chain(catalogue.relationship_properties.iter().map(|d| &d.name))
        .chain(catalogue.nodes.iter().map(|d| &d.name));
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(SchemaError::DuplicateName {
                name: name.clone(),
                location: SchemaLocation::ty(name),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(json: &str) -> Result<SchemaModel, SchemaError> {
        let catalogue: TypeCatalogue = serde_json::from_str(json).unwrap();
        SchemaModel::build(&catalogue)
    }

    const MOVIES: &str = r#"{
        "interfaces": [{ "name": "Production", "attributes": [{ "name": "title", "type": "String" }] }],
        "unions": [{ "name": "Search", "members": ["Movie", "Actor"] }],
        "relationshipProperties": [{ "name": "ActedIn", "attributes": [{ "name": "role", "type": "String" }] }],
        "nodes": [
            {
                "name": "Movie",
                "implements": ["Production"],
                "attributes": [
                    { "name": "id", "type": "ID", "directives": [{ "kind": "id" }] },
                    { "name": "title", "type": "String" }
                ],
                "relationships": [
                    { "name": "actors", "type": "ACTED_IN", "direction": "IN", "target": "Actor", "properties": "ActedIn", "list": true }
                ]
            },
            {
                "name": "Actor",
                "labels": ["Actor", "Person"],
                "attributes": [{ "name": "name", "type": "String" }],
                "relationships": [
                    { "name": "actedIn", "type": "ACTED_IN", "direction": "OUT", "target": "Production", "properties": "ActedIn", "list": true }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_build_movies() {
        let model = build(MOVIES).unwrap();

        let movie = model.node("Movie").unwrap();
        assert_eq!(movie.labels, vec!["Movie"]);
        let order: Vec<&str> = movie.attributes.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["title", "id"]);
        assert!(movie.relationship("actors").is_some());

        let actor = model.node("Actor").unwrap();
        assert_eq!(actor.labels, vec!["Actor", "Person"]);
        assert_eq!(
            actor.relationship("actedIn").map(|r| r.target_kind),
            Some(TargetKind::Interface)
        );

        assert_eq!(model.interface("Production").unwrap().members, vec!["Movie"]);
        let members: Vec<&str> = model.members("Search").iter().map(|n| n.name.as_str()).collect();
        assert_eq!(members, vec!["Movie", "Actor"]);
        assert!(matches!(model.resolve("Search"), Some(TypeRef::Union(_))));
        assert!(model.resolve("Nope").is_none());
    }

    #[test]
    fn test_duplicate_type_name() {
        let err = build(
            r#"{ "enums": [{ "name": "Movie", "values": [] }], "nodes": [{ "name": "Movie" }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateName { name, .. } if name == "Movie"));
    }

    #[test]
    fn test_duplicate_field_name() {
        let err = build(
            r#"{ "nodes": [{
                "name": "Movie",
                "attributes": [{ "name": "actors", "type": "String" }],
                "relationships": [{ "name": "actors", "type": "ACTED_IN", "direction": "IN", "target": "Movie" }]
            }] }"#,
        )
        .unwrap_err();
        assert_eq!(err.location(), &SchemaLocation::field("Movie", "actors"));
    }

    #[test]
    fn test_generated_field_collision() {
        let err = build(
            r#"{ "nodes": [{
                "name": "Movie",
                "attributes": [{ "name": "actorsConnection", "type": "String" }],
                "relationships": [{ "name": "actors", "type": "ACTED_IN", "direction": "IN", "target": "Movie" }]
            }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateName { name, .. } if name == "actorsConnection"));
    }

    #[test]
    fn test_dangling_references() {
        let cases = [
            r#"{ "nodes": [{ "name": "Movie", "relationships": [{ "name": "a", "type": "T", "direction": "OUT", "target": "Ghost" }] }] }"#,
            r#"{ "nodes": [{ "name": "Movie", "implements": ["Ghost"] }] }"#,
            r#"{ "nodes": [{ "name": "Movie", "relationships": [{ "name": "a", "type": "T", "direction": "OUT", "target": "Movie", "properties": "Ghost" }] }] }"#,
            r#"{ "unions": [{ "name": "U", "members": ["Ghost"] }] }"#,
        ];
        for json in cases {
            assert!(
                matches!(build(json), Err(SchemaError::DanglingReference { .. })),
                "{json} should be rejected"
            );
        }
    }

    #[test]
    fn test_implementor_must_declare_interface_attributes() {
        let err = build(
            r#"{
                "interfaces": [{ "name": "Production", "attributes": [{ "name": "title", "type": "String" }] }],
                "nodes": [{ "name": "Movie", "implements": ["Production"], "attributes": [{ "name": "title", "type": "Int" }] }]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DanglingReference { reference, .. } if reference == "Production.title"));
    }

    #[test]
    fn test_invalid_type_rule() {
        let err = build(
            r#"{ "nodes": [{ "name": "Movie", "authorization": [{ "phase": "filter", "operations": ["CREATE"] }] }] }"#,
        )
        .unwrap_err();
        assert_eq!(err.location(), &SchemaLocation::ty("Movie"));
        assert!(matches!(err, SchemaError::InvalidAuthorizationRule { .. }));
    }

    #[test]
    fn test_computed_edge_property_rejected() {
        let err = build(
            r#"{ "relationshipProperties": [{ "name": "P", "attributes": [
                { "name": "x", "type": "Int", "directives": [{ "kind": "computed", "statement": "RETURN this.a AS x", "columnName": "x" }] }
            ] }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidComputedField { .. }));
    }
}
