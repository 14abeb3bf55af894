//! Insertion-ordered per-objective storage.
//!
//! Candidates rarely carry more than a handful of objectives, so a flat vector
//! with linear lookup beats hashing and keeps registration order, which
//! `fitness_of_kind` relies on.

use serde::{Deserialize, Serialize};

use super::ObjectiveId;

/// Map from objective identity to a value, iterated in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveTable<V> {
    entries: Vec<(ObjectiveId, V)>,
}

impl<V> Default for ObjectiveTable<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> ObjectiveTable<V> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &ObjectiveId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &ObjectiveId) -> Option<&V> {
        self.position(id).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, id: &ObjectiveId) -> Option<&mut V> {
        self.position(id).map(|i| &mut self.entries[i].1)
    }

    /// Insert or replace. A replaced entry keeps its original position.
    pub fn insert(&mut self, id: ObjectiveId, value: V) -> Option<V> {
        match self.position(&id) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((id, value));
                None
            }
        }
    }

    pub fn remove(&mut self, id: &ObjectiveId) -> Option<V> {
        self.position(id).map(|i| self.entries.remove(i).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &ObjectiveId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectiveId, &V)> {
        self.entries.iter().map(|(id, v)| (id, v))
    }

    /// First entry, in registration order, whose key satisfies `predicate`.
    pub fn find<P>(&self, mut predicate: P) -> Option<(&ObjectiveId, &V)>
    where
        P: FnMut(&ObjectiveId) -> bool,
    {
        self.iter().find(|(id, _)| predicate(id))
    }

    fn position(&self, id: &ObjectiveId) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == id)
    }
}

impl<V> FromIterator<(ObjectiveId, V)> for ObjectiveTable<V> {
    fn from_iter<I: IntoIterator<Item = (ObjectiveId, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (id, value) in iter {
            table.insert(id, value);
        }
        table
    }
}
