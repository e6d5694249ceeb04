//! Hash map aliases.
//!
//! The schema model and the graph fixture use hashbrown maps keyed with a
//! fixed-seed ahash hasher: lookups are fast and nothing depends on a random
//! per-process seed.

use std::hash::BuildHasherDefault;

/// Fixed-seed hasher builder.
pub type FxBuildHasher = BuildHasherDefault<ahash::AHasher>;

/// A hash map with the fixed-seed hasher.
pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

/// A hash set with the fixed-seed hasher.
pub type FxHashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;
