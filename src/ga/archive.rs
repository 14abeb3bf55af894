//! Bounded store of the best candidates seen for one objective.

use std::cmp::Ordering;

use super::candidate::Candidate;

/// Keeps the best `max_size` candidates, best first.
///
/// "Best" is decided by the caller-supplied ordering so minimizing and
/// maximizing objectives can share the same archive.
#[derive(Debug, Clone)]
pub struct CandidateArchive<C> {
    entries: Vec<C>,
    max_size: usize,
    updates: usize,
}

impl<C: Candidate> CandidateArchive<C> {
    /// Create a new archive.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_size: max_size.max(1),
            updates: 0,
        }
    }

    /// Offer a candidate. `better` returns `Ordering::Less` when its first
    /// argument should rank ahead of the second. Returns `true` when the
    /// candidate was stored.
    pub fn offer<F>(&mut self, candidate: &C, mut better: F) -> bool
    where
        F: FnMut(&C, &C) -> Ordering,
    {
        let position = self
            .entries
            .iter()
            .position(|stored| better(candidate, stored) == Ordering::Less)
            .unwrap_or(self.entries.len());

        if position >= self.max_size {
            return false;
        }

        self.entries.insert(position, candidate.clone());
        self.entries.truncate(self.max_size);
        self.updates += 1;
        true
    }

    pub fn best(&self) -> Option<&C> {
        self.entries.first()
    }

    /// Get the top N entries.
    pub fn top_n(&self, n: usize) -> &[C] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of successful insertions since creation.
    pub fn updates(&self) -> usize {
        self.updates
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
