//! Translator configuration.

use serde::{Deserialize, Serialize};

/// Options applied to every translation.
///
/// # Examples
///
/// ```
/// use neoql_engine::TranslatorConfig;
///
/// let config = TranslatorConfig::new()
///     .with_default_limit(Some(50))
///     .with_indent(2);
/// assert_eq!(config.default_limit, Some(50));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TranslatorConfig {
    /// Limit applied to list reads when neither the request nor the type
    /// names one.
    pub default_limit: Option<u64>,
    /// Emit `__resolveType` for concrete node types too, not only for
    /// interface and union members.
    pub resolve_concrete_types: bool,
    /// Indentation width of sub-call bodies.
    pub indent: usize,
}

impl TranslatorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_limit: None,
            resolve_concrete_types: false,
            indent: 4,
        }
    }

    /// Sets the default list limit.
    pub fn with_default_limit(mut self, limit: Option<u64>) -> Self {
        self.default_limit = limit;
        self
    }

    /// Enables `__resolveType` on concrete types.
    pub fn with_resolve_concrete_types(mut self, enabled: bool) -> Self {
        self.resolve_concrete_types = enabled;
        self
    }

    /// Sets the indentation width.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self::new()
    }
}
