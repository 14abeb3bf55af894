//! The artifact under evolution: a generated test.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ga::ConstructionFailed;
use crate::schema::ObjectiveId;

/// Goals proven covered by one artifact.
///
/// Memoizes "has this exact goal been shown to score 0.0 on this artifact",
/// so later coverage queries skip execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoveredGoals {
    goals: BTreeSet<ObjectiveId>,
}

impl CoveredGoals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the goal was not recorded before.
    pub fn insert(&mut self, goal: ObjectiveId) -> bool {
        self.goals.insert(goal)
    }

    pub fn remove(&mut self, goal: &ObjectiveId) -> bool {
        self.goals.remove(goal)
    }

    pub fn clear(&mut self) {
        self.goals.clear();
    }

    pub fn contains(&self, goal: &ObjectiveId) -> bool {
        self.goals.contains(goal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectiveId> {
        self.goals.iter()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}

/// A generated test: the artifact an executable candidate wraps.
///
/// The structural operators live here because only the artifact knows its
/// own shape; the wrapping candidate takes care of invalidating caches.
pub trait TestArtifact: Clone + Send + Sync {
    /// Whatever running the artifact produces. Crashes and timeouts are
    /// encoded in the outcome, never raised as errors.
    type Outcome: Send + Sync;

    fn id(&self) -> u64;

    /// Number of statements (or inputs) in the test.
    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn is_valid(&self) -> bool;

    fn is_failing(&self) -> bool;

    fn set_failing(&mut self);

    fn covered_goals(&self) -> &CoveredGoals;

    fn covered_goals_mut(&mut self) -> &mut CoveredGoals;

    fn is_goal_covered(&self, goal: &ObjectiveId) -> bool {
        self.covered_goals().contains(goal)
    }

    fn add_covered_goal(&mut self, goal: ObjectiveId) {
        self.covered_goals_mut().insert(goal);
    }

    fn remove_covered_goal(&mut self, goal: &ObjectiveId) {
        self.covered_goals_mut().remove(goal);
    }

    fn clear_covered_goals(&mut self) {
        self.covered_goals_mut().clear();
    }

    /// Apply a random structural change. Returns whether anything changed.
    fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool;

    /// Keep `self[..position1]` and append `other[position2..]`.
    fn crossover(
        &mut self,
        other: &Self,
        position1: usize,
        position2: usize,
    ) -> Result<(), ConstructionFailed>;

    /// Single-edit variants explored by local search.
    fn neighbours(&self) -> Vec<Self> {
        Vec::new()
    }
}
