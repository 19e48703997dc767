//! Identity-keyed, dirty-tracked cache.
//!
//! [`IdentityMap`] maps a data-object key to the value built for it and
//! tracks, per rebuild pass, whether the entry has been revisited. A pass is
//! bracketed by [`begin_update`](IdentityMap::begin_update) and
//! [`end_update`](IdentityMap::end_update); everything not revisited in
//! between is swept.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// A single cached value and its per-pass dirty flag.
#[derive(Debug, Clone)]
struct MappingEntry<V> {
    value: V,
    dirty: bool,
}

/// Keyed cache with mark-and-sweep cleanup.
///
/// Holds at most one entry per key. All operations are O(1) on average; a
/// full pass costs O(live entries).
///
/// # Example
///
/// ```
/// use levelforge_core::reconcile::IdentityMap;
///
/// let mut map = IdentityMap::new();
/// map.set("a", 1);
/// map.set("b", 2);
///
/// map.begin_update();
/// assert_eq!(map.try_get(&"a"), Some((&1, true)));
/// map.set("a", 1);
/// let swept = map.end_update();
///
/// assert_eq!(swept, vec![("b", 2)]);
/// assert_eq!(map.get(&"a"), Some(&1));
/// ```
pub struct IdentityMap<K, V> {
    entries: HashMap<K, MappingEntry<V>>,
}

impl<K: Eq + Hash + Clone, V> IdentityMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Marks every existing entry dirty, starting a new pass.
    pub fn begin_update(&mut self) {
        for entry in self.entries.values_mut() {
            entry.dirty = true;
        }
    }

    /// Looks up `key`, returning the cached value and whether it is still
    /// dirty (not yet revisited this pass).
    ///
    /// A miss is not an error: it is the normal trigger for creating a value.
    pub fn try_get(&self, key: &K) -> Option<(&V, bool)> {
        self.entries.get(key).map(|e| (&e.value, e.dirty))
    }

    /// Inserts or replaces the value for `key` and clears its dirty flag.
    ///
    /// Returns the previous value if one was replaced.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        self.entries
            .insert(key, MappingEntry { value, dirty: false })
            .map(|old| old.value)
    }

    /// Marks a single entry dirty again. Returns `false` if the key is absent.
    pub fn mark_dirty(&mut self, key: &K) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Removes every entry still dirty and returns the removed pairs.
    pub fn end_update(&mut self) -> Vec<(K, V)> {
        let stale: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(key, _)| key.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|key| self.entries.remove_entry(&key))
            .map(|(key, entry)| (key, entry.value))
            .collect()
    }

    /// Returns the cached value for `key`, regardless of its dirty state.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Returns `true` if an entry exists for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash + Clone, V> Default for IdentityMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for IdentityMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dirty = self.entries.values().filter(|e| e.dirty).count();
        f.debug_struct("IdentityMap")
            .field("len", &self.entries.len())
            .field("dirty", &dirty)
            .finish()
    }
}
