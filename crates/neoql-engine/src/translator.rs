//! Translation entry point.
//!
//! [`translate`] turns one resolved [`Operation`] into statement text and
//! its parameter map. [`plan`] stops one step earlier and returns the
//! builder tree, which the [`Interpreter`](crate::query::interpret::Interpreter)
//! can run directly.

use crate::config::TranslatorConfig;
use crate::query::context::Context;
use crate::query::plan::Statement;
use crate::query::render::Renderer;
use crate::query::{aggregate, connection, mutation, read};
use neoql_adapters::query::{AuthContext, Operation, ReadShape};
use neoql_common::types::ParameterMap;
use neoql_common::utils::error::Result;
use neoql_core::schema::SchemaModel;
use serde::Serialize;
use tracing::{debug, trace};

/// A compiled statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
    /// Statement text.
    pub text: String,
    /// Parameters the text references, in first-use order.
    pub params: ParameterMap,
}

/// Builds the statement tree for `operation`.
///
/// # Errors
///
/// Returns a translation error if the request does not fit the schema.
pub fn plan(
    operation: &Operation,
    schema: &SchemaModel,
    auth: &AuthContext,
    config: &TranslatorConfig,
) -> Result<Statement> {
    debug!(kind = operation.kind_name(), target = operation.target(), "translating operation");
    let mut ctx = Context::new(schema, auth, config);
    match operation {
        Operation::Read(request) => match request.shape {
            ReadShape::List => read::translate_read(&mut ctx, request),
            ReadShape::Connection => connection::translate_connection(&mut ctx, request),
            ReadShape::Aggregate => aggregate::translate_aggregate(&mut ctx, request),
        },
        Operation::Mutation(request) => mutation::translate_mutation(&mut ctx, request),
    }
}

/// Compiles `operation` into statement text and parameters.
///
/// # Errors
///
/// Returns a translation error if the request does not fit the schema, or a
/// builder error if the produced tree is malformed.
///
/// # Examples
///
/// ```
/// use neoql_adapters::query::{AuthContext, Field, Operation, ReadShape, SelectionSet};
/// use neoql_core::schema::{SchemaModel, TypeCatalogue};
/// use neoql_engine::{TranslatorConfig, translate};
///
/// let catalogue: TypeCatalogue = serde_json::from_str(
///     r#"{ "nodes": [ { "name": "Movie", "attributes": [ { "name": "title", "type": "String" } ] } ] }"#,
/// )
/// .unwrap();
/// let schema = SchemaModel::build(&catalogue).unwrap();
/// let operation = Operation::read(
///     "Movie",
///     ReadShape::List,
///     Default::default(),
///     SelectionSet::new([Field::new("title")]),
/// );
/// let compiled = translate(&operation, &schema, &AuthContext::anonymous(), &TranslatorConfig::new()).unwrap();
/// assert_eq!(compiled.text, "MATCH (this0:Movie)\nRETURN this0 { .title } AS this");
/// assert!(compiled.params.is_empty());
/// ```
pub fn translate(
    operation: &Operation,
    schema: &SchemaModel,
    auth: &AuthContext,
    config: &TranslatorConfig,
) -> Result<Translation> {
    let statement = plan(operation, schema, auth, config)?;
    let rendered = Renderer::new().with_indent(config.indent).render(&statement)?;
    trace!(
        bytes = rendered.text.len(),
        params = rendered.params.len(),
        "rendered statement"
    );
    Ok(Translation {
        text: rendered.text,
        params: rendered.params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixtures::{args, schema, selection};
    use neoql_adapters::query::MutationKind;
    use neoql_common::types::Value;
    use neoql_common::utils::error::{Error, TranslationError};

    fn read(target: &str, shape: ReadShape, arguments: &str, fields: &str) -> Operation {
        Operation::read(target, shape, args(arguments), selection(fields))
    }

    #[test]
    fn test_dispatch_by_shape() {
        let schema = schema();
        let auth = AuthContext::anonymous();
        let config = TranslatorConfig::new();

        let list = translate(
            &read("Movie", ReadShape::List, "{}", r#"{ "fields": [ { "name": "title" } ] }"#),
            &schema,
            &auth,
            &config,
        )
        .unwrap();
        assert!(list.text.ends_with("AS this"));

        let connection = translate(
            &read(
                "Movie",
                ReadShape::Connection,
                "{}",
                r#"{ "fields": [ { "name": "totalCount" } ] }"#,
            ),
            &schema,
            &auth,
            &config,
        )
        .unwrap();
        assert!(connection.text.contains("totalCount: "));

        let aggregate = translate(
            &read("Movie", ReadShape::Aggregate, "{}", r#"{ "fields": [ { "name": "count" } ] }"#),
            &schema,
            &auth,
            &config,
        )
        .unwrap();
        assert!(aggregate.text.contains("count(this0)"));
    }

    #[test]
    fn test_params_are_bound() {
        let operation = read(
            "Movie",
            ReadShape::List,
            r#"{ "where": { "title": "Heat" } }"#,
            r#"{ "fields": [ { "name": "title" } ] }"#,
        );
        let compiled = translate(&operation, &schema(), &AuthContext::anonymous(), &TranslatorConfig::new()).unwrap();
        assert_eq!(compiled.params.get("param0"), Some(&Value::from("Heat")));
        assert!(compiled.text.contains("$param0"));
    }

    #[test]
    fn test_indent_is_configurable() {
        let operation = read(
            "Movie",
            ReadShape::List,
            "{}",
            r#"{ "fields": [ { "name": "actors", "selection": { "fields": [ { "name": "name" } ] } } ] }"#,
        );
        let config = TranslatorConfig::new().with_indent(2);
        let compiled = translate(&operation, &schema(), &AuthContext::anonymous(), &config).unwrap();
        assert!(compiled.text.contains("\n  WITH this0\n"));
    }

    #[test]
    fn test_errors_propagate() {
        let operation = Operation::mutation(
            MutationKind::Create,
            "Nope",
            args(r#"{ "input": [ {} ] }"#),
            selection("{}"),
        );
        match translate(&operation, &schema(), &AuthContext::anonymous(), &TranslatorConfig::new()) {
            Err(Error::Translation(TranslationError::UnknownType { .. })) => {}
            other => panic!("Expected UnknownType, got {other:?}"),
        }
    }
}
