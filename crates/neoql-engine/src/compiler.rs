//! The shareable compiler handle.

use std::sync::Arc;

use neoql_adapters::query::{AuthContext, Operation};
use neoql_common::utils::error::Result;
use neoql_core::schema::{SchemaModel, TypeCatalogue};

use crate::config::TranslatorConfig;
use crate::query::plan::Statement;
use crate::translator::{self, Translation};

/// A built schema plus translation options.
///
/// Cloning is cheap; clones share one schema model, so a compiler can be
/// handed to every request thread.
#[derive(Debug, Clone)]
pub struct Compiler {
    /// The schema model.
    schema: Arc<SchemaModel>,
    /// Options applied to every translation.
    config: TranslatorConfig,
}

impl Compiler {
    /// Creates a compiler with the default configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use neoql_core::schema::{SchemaModel, TypeCatalogue};
    /// use neoql_engine::Compiler;
    ///
    /// let schema = SchemaModel::build(&TypeCatalogue::default()).unwrap();
    /// let compiler = Compiler::new(schema);
    /// assert_eq!(compiler.config().indent, 4);
    /// ```
    #[must_use]
    pub fn new(schema: SchemaModel) -> Self {
        Self::with_config(Arc::new(schema), TranslatorConfig::default())
    }

    /// Creates a compiler sharing an existing schema model.
    #[must_use]
    pub fn with_config(schema: Arc<SchemaModel>, config: TranslatorConfig) -> Self {
        Self { schema, config }
    }

    /// Builds the schema model from a catalogue.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`](neoql_common::utils::error::SchemaError)
    /// found in the catalogue.
    pub fn build(catalogue: &TypeCatalogue, config: TranslatorConfig) -> Result<Self> {
        let schema = SchemaModel::build(catalogue)?;
        Ok(Self::with_config(Arc::new(schema), config))
    }

    /// Returns the schema model.
    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaModel> {
        &self.schema
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Compiles one operation for one caller.
    ///
    /// # Errors
    ///
    /// See [`translate`](crate::translate).
    pub fn translate(&self, operation: &Operation, auth: &AuthContext) -> Result<Translation> {
        translator::translate(operation, &self.schema, auth, &self.config)
    }

    /// Builds the statement tree without rendering it.
    ///
    /// # Errors
    ///
    /// See [`plan`](crate::plan).
    pub fn plan(&self, operation: &Operation, auth: &AuthContext) -> Result<Statement> {
        translator::plan(operation, &self.schema, auth, &self.config)
    }
}
