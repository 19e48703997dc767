//! Selection state: the selected set and the active object.

use std::collections::HashSet;
use std::hash::Hash;

/// The selected data objects and the active one among them.
///
/// Invariant: the active object, if any, is always a member of the selected
/// set. Every mutator that removes the active object also clears it.
///
/// Two selections compare equal when both the set and the active object
/// match; [`EditContext`](super::EditContext) uses this to decide whether a
/// change is observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<K: Eq + Hash> {
    selected: HashSet<K>,
    active: Option<K>,
}

impl<K: Copy + Eq + Hash> Selection<K> {
    pub fn new() -> Self {
        Self {
            selected: HashSet::new(),
            active: None,
        }
    }

    /// Replaces the selection with `key` alone and makes it active.
    pub fn select(&mut self, key: K) {
        self.selected.clear();
        self.selected.insert(key);
        self.active = Some(key);
    }

    /// Adds `key` to the selection and makes it active.
    pub fn add(&mut self, key: K) {
        self.selected.insert(key);
        self.active = Some(key);
    }

    /// Adds every key to the selection. The active object is unchanged.
    pub fn extend(&mut self, keys: impl IntoIterator<Item = K>) {
        self.selected.extend(keys);
    }

    /// Removes `key`, clearing the active object if it was `key`.
    pub fn remove(&mut self, key: &K) {
        self.selected.remove(key);
        if self.active.as_ref() == Some(key) {
            self.active = None;
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.active = None;
    }

    /// Keeps only the keys for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.selected.retain(|k| keep(k));
        if let Some(active) = self.active {
            if !self.selected.contains(&active) {
                self.active = None;
            }
        }
    }

    pub fn active(&self) -> Option<K> {
        self.active
    }

    pub fn contains(&self, key: &K) -> bool {
        self.selected.contains(key)
    }

    /// Selected keys in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.selected.iter()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

impl<K: Copy + Eq + Hash> Default for Selection<K> {
    fn default() -> Self {
        Self::new()
    }
}
