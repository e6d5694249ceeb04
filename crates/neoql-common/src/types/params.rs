//! Bound statement parameters.

use super::Value;
use crate::utils::error::BuilderError;
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};

/// The flat name → value map bound alongside a compiled statement.
///
/// Names are unique within one statement. Iteration order is the order in
/// which the renderer first encountered each parameter, so two renders of the
/// same tree produce identical maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterMap {
    entries: IndexMap<String, Value>,
}

impl ParameterMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`.
    ///
    /// Binding the same name twice is allowed only with an identical value;
    /// anything else is a naming collision.
    pub fn bind(&mut self, name: &str, value: &Value) -> Result<(), BuilderError> {
        match self.entries.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                Ok(())
            }
            Entry::Occupied(slot) if slot.get() == value => Ok(()),
            Entry::Occupied(_) => Err(BuilderError::ConflictingName {
                name: name.to_string(),
                context: "parameter bound to two different values",
            }),
        }
    }

    /// Gets a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Returns true if the parameter is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no parameter is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over parameter names in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Consumes the map, returning the underlying ordered map.
    #[must_use]
    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.entries
    }
}
