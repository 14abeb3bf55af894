//! Candidate wrapping a single test artifact.

use std::cmp::Ordering;
use std::sync::Arc;

use log::{trace, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::artifact::TestArtifact;
use super::execution::{ExecutableCandidate, Executor, OutcomeCache, OutcomeOf};
use super::suite::SuiteObjective;
use crate::ga::{Candidate, CandidateState, ConstructionFailed, Objective};
use crate::schema::ObjectiveId;

/// One generated test under evolution.
///
/// The last execution outcome is cached until the test changes; goals proven
/// covered are memoized on the artifact until the test changes.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "A: Serialize",
    deserialize = "A: Deserialize<'de>"
))]
pub struct TestChromosome<A: TestArtifact> {
    state: CandidateState,
    test: A,
    #[serde(skip)]
    outcome: OutcomeCache<OutcomeOf<A>>,
}

impl<A: TestArtifact> TestChromosome<A> {
    pub fn new(test: A) -> Self {
        Self {
            state: CandidateState::new(),
            test,
            outcome: OutcomeCache::new(),
        }
    }

    pub fn test(&self) -> &A {
        &self.test
    }

    /// Mutable access for structural edits. Marks the candidate changed.
    pub fn test_mut(&mut self) -> &mut A {
        self.set_changed(true);
        &mut self.test
    }

    pub fn into_test(self) -> A {
        self.test
    }

    /// Record a goal as covered on the artifact. Not a structural change.
    pub fn mark_goal_covered(&mut self, goal: ObjectiveId) {
        self.test.add_covered_goal(goal);
    }

    /// Run the test unless an outcome for the current version is cached.
    ///
    /// This is the only place that clears the changed flag: it happens after
    /// `executor` returned and the outcome is stored.
    pub fn execute(&mut self, executor: &dyn Executor<A>) -> Arc<OutcomeOf<A>> {
        let stale = self.state.is_changed();
        let test = &self.test;
        let outcome = self.outcome.get_or_run(stale, || {
            trace!("Executing test case {}", test.id());
            executor.run(test)
        });
        self.state.set_changed(false);
        outcome
    }

    fn with_test(&self, test: A) -> Self {
        let mut trial = Self {
            state: self.state.clone(),
            test,
            outcome: OutcomeCache::new(),
        };
        trial.set_changed(true);
        trial
    }
}

impl<A: TestArtifact> Clone for TestChromosome<A> {
    fn clone(&self) -> Self {
        let mut copy = Self {
            state: self.state.clone(),
            test: self.test.clone(),
            outcome: OutcomeCache::new(),
        };
        copy.copy_cached_results(self);
        copy
    }
}

impl<A: TestArtifact + PartialEq> PartialEq for TestChromosome<A> {
    fn eq(&self, other: &Self) -> bool {
        self.test == other.test
    }
}

impl<A: TestArtifact> Candidate for TestChromosome<A> {
    fn state(&self) -> &CandidateState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CandidateState {
        &mut self.state
    }

    /// Shorter tests first.
    fn compare_secondary(&self, other: &Self) -> Ordering {
        self.test.size().cmp(&other.test.size())
    }

    fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.test.mutate(rng) {
            self.set_changed(true);
            self.state.increase_number_of_mutations();
        }
    }

    fn crossover(
        &mut self,
        other: &Self,
        position1: usize,
        position2: usize,
    ) -> Result<(), ConstructionFailed> {
        self.test.crossover(&other.test, position1, position2)?;
        self.set_changed(true);
        Ok(())
    }

    /// Best improvement over the artifact's neighbourhood.
    fn local_search(&mut self, objective: &dyn Objective<Self>) -> bool {
        let mut best = match objective.fitness(self) {
            Ok(fitness) => fitness,
            Err(err) => {
                warn!("Local search skipped for test {}: {}", self.test.id(), err);
                return false;
            }
        };

        let maximizing = objective.is_maximizing();
        let mut improved = false;
        for neighbour in self.test.neighbours() {
            let mut trial = self.with_test(neighbour);
            match objective.fitness(&mut trial) {
                Ok(fitness) if is_improvement(fitness, best, maximizing) => {
                    best = fitness;
                    *self = trial;
                    improved = true;
                }
                Ok(_) => {}
                Err(err) => warn!("Local search evaluation failed: {}", err),
            }
        }

        if improved {
            // Other objectives have not seen the new artifact yet.
            self.state.set_changed(true);
        }
        self.state.set_local_search_applied(true);
        improved
    }

    fn size(&self) -> usize {
        self.test.size()
    }

    fn set_changed(&mut self, changed: bool) {
        if changed {
            self.outcome.clear();
            self.test.clear_covered_goals();
        }
        self.state.set_changed(changed);
    }
}

impl<A: TestArtifact> ExecutableCandidate for TestChromosome<A> {
    type Artifact = A;

    fn outcome_cache(&self) -> &OutcomeCache<OutcomeOf<A>> {
        &self.outcome
    }

    fn outcome_cache_mut(&mut self) -> &mut OutcomeCache<OutcomeOf<A>> {
        &mut self.outcome
    }

    /// Outcomes are immutable and shared, so a clone may reuse one as long
    /// as it still describes the test.
    fn copy_cached_results(&mut self, other: &Self) {
        if !other.state.is_changed() {
            self.outcome.share_from(&other.outcome);
        }
    }

    fn execute_for_objective(&self, objective: &dyn SuiteObjective<A>) -> Arc<OutcomeOf<A>> {
        trace!("Executing test case {} for {}", self.test.id(), objective.id());
        Arc::new(objective.executor().run(&self.test))
    }
}

fn is_improvement(candidate: f64, best: f64, maximizing: bool) -> bool {
    if maximizing {
        candidate > best
    } else {
        candidate < best
    }
}
