//! CLI command implementations.

pub mod schema;
pub mod translate;

use std::path::Path;

use anyhow::{Context, Result};
use neoql_core::schema::{SchemaModel, TypeCatalogue};
use serde::de::DeserializeOwned;

/// Reads and parses a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {what} {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {what} {}", path.display()))
}

/// Reads a catalogue and builds its schema model.
pub fn load_schema(path: &Path) -> Result<SchemaModel> {
    let catalogue: TypeCatalogue = read_json(path, "catalogue")?;
    let schema = SchemaModel::build(&catalogue).with_context(|| format!("building {}", path.display()))?;
    tracing::info!(types = schema.nodes().count(), "schema built");
    Ok(schema)
}
