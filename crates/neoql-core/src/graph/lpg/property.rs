//! Columnar property storage.

use super::{EdgeId, NodeId};
use indexmap::IndexMap;
use neoql_common::types::Value;
use neoql_common::utils::hash::FxHashMap;
use parking_lot::RwLock;
use std::hash::Hash;
use std::sync::Arc;

/// Entity IDs usable as property storage keys.
pub trait EntityId: Copy + Eq + Hash + 'static {}

impl EntityId for NodeId {}
impl EntityId for EdgeId {}

/// Properties stored one column per key.
///
/// Setting `Null` removes the property, matching store semantics where a
/// null property does not exist.
pub struct PropertyStorage<Id: EntityId> {
    columns: RwLock<FxHashMap<Arc<str>, FxHashMap<Id, Value>>>,
}

impl<Id: EntityId> PropertyStorage<Id> {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            columns: RwLock::new(FxHashMap::default()),
        }
    }

    /// Sets a value; `Null` removes it.
    pub fn set(&self, id: Id, key: &str, value: Value) {
        let mut columns = self.columns.write();
        if value.is_null() {
            if let Some(column) = columns.get_mut(key) {
                column.remove(&id);
            }
            return;
        }
        if let Some(column) = columns.get_mut(key) {
            column.insert(id, value);
        } else {
            let mut column = FxHashMap::default();
            column.insert(id, value);
            columns.insert(Arc::from(key), column);
        }
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, id: Id, key: &str) -> Option<Value> {
        self.columns.read().get(key).and_then(|c| c.get(&id)).cloned()
    }

    /// Removes every property of an entity.
    pub fn remove_all(&self, id: Id) {
        for column in self.columns.write().values_mut() {
            column.remove(&id);
        }
    }

    /// All properties of an entity, sorted by key.
    #[must_use]
    pub fn get_all(&self, id: Id) -> IndexMap<String, Value> {
        let columns = self.columns.read();
        let mut props: IndexMap<String, Value> = columns
            .iter()
            .filter_map(|(key, column)| column.get(&id).map(|v| (key.to_string(), v.clone())))
            .collect();
        props.sort_keys();
        props
    }

    /// Returns the number of property columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.read().len()
    }
}

impl<Id: EntityId> Default for PropertyStorage<Id> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_storage_basic() {
        let storage = PropertyStorage::new();
        let alice = NodeId(1);
        let bob = NodeId(2);

        storage.set(alice, "name", "Alice".into());
        storage.set(alice, "age", 30i64.into());
        storage.set(bob, "name", "Bob".into());

        assert_eq!(storage.get(alice, "name"), Some(Value::from("Alice")));
        assert_eq!(storage.get(bob, "name"), Some(Value::from("Bob")));
        assert!(storage.get(bob, "age").is_none());
        assert_eq!(storage.column_count(), 2);
    }

    #[test]
    fn test_null_removes() {
        let storage = PropertyStorage::new();
        let node = NodeId(1);
        storage.set(node, "name", "Alice".into());
        storage.set(node, "name", Value::Null);
        assert!(storage.get(node, "name").is_none());
    }

    #[test]
    fn test_get_all_sorted() {
        let storage = PropertyStorage::new();
        let edge = EdgeId(7);
        storage.set(edge, "zeta", 1i64.into());
        storage.set(edge, "alpha", 2i64.into());
        storage.set(edge, "mid", true.into());

        let keys: Vec<String> = storage.get_all(edge).into_keys().collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);

        storage.remove_all(edge);
        assert!(storage.get_all(edge).is_empty());
    }
}
