//! Catalogue summary command.

use std::path::Path;

use anyhow::Result;
use comfy_table::Cell;
use neoql_core::schema::SchemaModel;
use serde::Serialize;

use crate::OutputFormat;
use crate::output::{self, Format};

/// Summary of a built schema.
#[derive(Serialize)]
struct SchemaOutput {
    nodes: Vec<NodeOutput>,
    interfaces: Vec<AbstractOutput>,
    unions: Vec<AbstractOutput>,
    relationship_properties: Vec<String>,
}

/// One node type.
#[derive(Serialize)]
struct NodeOutput {
    name: String,
    labels: Vec<String>,
    attributes: usize,
    relationships: Vec<RelationshipOutput>,
    authorization: bool,
}

/// One relationship field.
#[derive(Serialize)]
struct RelationshipOutput {
    field: String,
    pattern: String,
    target: String,
}

/// An interface or union and its members.
#[derive(Serialize)]
struct AbstractOutput {
    name: String,
    members: Vec<String>,
}

impl SchemaOutput {
    fn from_model(schema: &SchemaModel) -> Self {
        Self {
            nodes: schema
                .nodes()
                .map(|node| NodeOutput {
                    name: node.name.clone(),
                    labels: node.labels.clone(),
                    attributes: node.attributes.len(),
                    relationships: node
                        .relationships
                        .values()
                        .map(|rel| RelationshipOutput {
                            field: rel.name.clone(),
                            pattern: format!("{:?} {}", rel.direction, rel.rel_type),
                            target: rel.target.clone(),
                        })
                        .collect(),
                    authorization: !node.auth.is_empty()
                        || node.attributes.values().any(|attr| !attr.auth.is_empty()),
                })
                .collect(),
            interfaces: schema
                .interfaces()
                .map(|i| AbstractOutput {
                    name: i.name.clone(),
                    members: i.members.clone(),
                })
                .collect(),
            unions: schema
                .unions()
                .map(|u| AbstractOutput {
                    name: u.name.clone(),
                    members: u.members.clone(),
                })
                .collect(),
            relationship_properties: schema.property_types().map(|p| p.name.clone()).collect(),
        }
    }
}

/// Run the schema command.
pub fn run(path: &Path, format: OutputFormat, quiet: bool) -> Result<()> {
    let schema = super::load_schema(path)?;
    let output = SchemaOutput::from_model(&schema);

    match Format::from(format) {
        Format::Json => output::print_json(&output, quiet)?,
        Format::Table => {
            if quiet {
                return Ok(());
            }
            let mut table = output::create_table();
            output::add_header(&mut table, &["Node", "Labels", "Attributes", "Auth"]);
            for node in &output.nodes {
                table.add_row(vec![
                    Cell::new(&node.name),
                    Cell::new(node.labels.join(":")),
                    Cell::new(node.attributes),
                    Cell::new(if node.authorization { "yes" } else { "" }),
                ]);
            }
            println!("{table}\n");

            let mut table = output::create_table();
            output::add_header(&mut table, &["Node", "Field", "Pattern", "Target"]);
            for node in &output.nodes {
                for rel in &node.relationships {
                    table.add_row(vec![
                        Cell::new(&node.name),
                        Cell::new(&rel.field),
                        Cell::new(&rel.pattern),
                        Cell::new(&rel.target),
                    ]);
                }
            }
            println!("{table}");

            let abstracts: Vec<_> = output
                .interfaces
                .iter()
                .map(|i| ("interface", i))
                .chain(output.unions.iter().map(|u| ("union", u)))
                .collect();
            if !abstracts.is_empty() {
                let mut table = output::create_table();
                output::add_header(&mut table, &["Kind", "Name", "Members"]);
                for (kind, entry) in abstracts {
                    table.add_row(vec![Cell::new(kind), Cell::new(&entry.name), Cell::new(entry.members.join(", "))]);
                }
                println!("\n{table}");
            }
            output::success(&format!("{} node types", output.nodes.len()), quiet);
        }
    }

    Ok(())
}
