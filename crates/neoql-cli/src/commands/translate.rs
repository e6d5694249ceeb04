//! Request translation command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::Cell;
use neoql_adapters::query::{AuthContext, Operation};
use neoql_engine::{Compiler, TranslatorConfig};

use crate::OutputFormat;
use crate::output::{self, Format};

/// Files named on the command line.
pub struct Inputs<'p> {
    pub catalogue: &'p Path,
    pub request: &'p Path,
    pub auth: Option<&'p Path>,
    pub config: Option<&'p Path>,
}

/// Run the translate command.
pub fn run(inputs: &Inputs<'_>, format: OutputFormat, quiet: bool) -> Result<()> {
    let schema = super::load_schema(inputs.catalogue)?;
    let config: TranslatorConfig = match inputs.config {
        Some(path) => super::read_json(path, "config")?,
        None => TranslatorConfig::default(),
    };
    let auth: AuthContext = match inputs.auth {
        Some(path) => super::read_json(path, "auth context")?,
        None => AuthContext::anonymous(),
    };
    let operation: Operation = super::read_json(inputs.request, "request")?;

    let compiler = Compiler::with_config(Arc::new(schema), config);
    let translation = compiler
        .translate(&operation, &auth)
        .with_context(|| format!("translating {} {}", operation.kind_name(), operation.target()))?;

    match Format::from(format) {
        Format::Json => output::print_json(&translation, quiet)?,
        Format::Table => {
            if quiet {
                return Ok(());
            }
            println!("{}\n", translation.text);
            if translation.params.is_empty() {
                return Ok(());
            }
            let mut table = output::create_table();
            output::add_header(&mut table, &["Parameter", "Value"]);
            for (name, value) in translation.params.iter() {
                table.add_row(vec![Cell::new(format!("${name}")), Cell::new(serde_json::to_string(value)?)]);
            }
            println!("{table}");
        }
    }

    Ok(())
}
