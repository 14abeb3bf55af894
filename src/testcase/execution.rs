//! Execution of artifacts and caching of their outcomes.

use std::fmt;
use std::sync::Arc;

use super::artifact::TestArtifact;
use super::suite::SuiteObjective;
use crate::ga::Candidate;

/// Outcome type produced by running artifact `A`.
pub type OutcomeOf<A> = <A as TestArtifact>::Outcome;

/// Runs artifacts. Implemented outside this crate by whatever sandbox
/// actually executes generated code; timeouts and cancellation are its
/// business. A call that never returns leaves the candidate untouched.
pub trait Executor<A: TestArtifact>: Send + Sync {
    fn run(&self, artifact: &A) -> A::Outcome;
}

/// Slot holding the outcome of the last execution of one candidate.
///
/// Never serialized and never part of equality. Cloning yields an empty
/// slot: the candidate kind decides through
/// [`ExecutableCandidate::copy_cached_results`] whether a clone shares it.
pub struct OutcomeCache<O> {
    outcome: Option<Arc<O>>,
}

impl<O> OutcomeCache<O> {
    pub fn new() -> Self {
        Self { outcome: None }
    }

    pub fn get(&self) -> Option<&Arc<O>> {
        self.outcome.as_ref()
    }

    pub fn is_cached(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn store(&mut self, outcome: O) {
        self.outcome = Some(Arc::new(outcome));
    }

    pub fn store_shared(&mut self, outcome: Arc<O>) {
        self.outcome = Some(outcome);
    }

    pub fn clear(&mut self) {
        self.outcome = None;
    }

    /// Share the outcome cached in `other`, if any.
    pub fn share_from(&mut self, other: &Self) {
        self.outcome = other.outcome.clone();
    }

    /// Cached outcome, or the result of `run` when `stale` or nothing is
    /// cached. The slot is only written once `run` has returned.
    pub fn get_or_run<F>(&mut self, stale: bool, run: F) -> Arc<O>
    where
        F: FnOnce() -> O,
    {
        match &self.outcome {
            Some(outcome) if !stale => Arc::clone(outcome),
            _ => {
                let outcome = Arc::new(run());
                self.outcome = Some(Arc::clone(&outcome));
                outcome
            }
        }
    }
}

impl<O> Default for OutcomeCache<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> Clone for OutcomeCache<O> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<O> fmt::Debug for OutcomeCache<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeCache")
            .field("cached", &self.is_cached())
            .finish()
    }
}

/// A candidate whose evaluation requires running the artifact it wraps.
pub trait ExecutableCandidate: Candidate {
    type Artifact: TestArtifact;

    fn outcome_cache(&self) -> &OutcomeCache<OutcomeOf<Self::Artifact>>;

    fn outcome_cache_mut(&mut self) -> &mut OutcomeCache<OutcomeOf<Self::Artifact>>;

    /// Decide what a clone carries over from `other`'s caches.
    fn copy_cached_results(&mut self, other: &Self);

    /// Run the artifact on behalf of a suite-level objective. Does not touch
    /// the cache.
    fn execute_for_objective(
        &self,
        objective: &dyn SuiteObjective<Self::Artifact>,
    ) -> Arc<OutcomeOf<Self::Artifact>>;

    fn last_execution_outcome(&self) -> Option<Arc<OutcomeOf<Self::Artifact>>> {
        self.outcome_cache().get().cloned()
    }

    fn set_last_execution_outcome(&mut self, outcome: OutcomeOf<Self::Artifact>) {
        self.outcome_cache_mut().store(outcome);
    }

    /// Drop the cached outcome without marking the candidate changed.
    fn clear_cached_results(&mut self) {
        self.outcome_cache_mut().clear();
    }
}
