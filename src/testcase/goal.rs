//! Per-goal coverage objectives.
//!
//! A goal objective scores one test against one coverage goal (a branch, a
//! line, a mutant). Fitness `0.0` means covered, exactly: coverage is a hard
//! boundary, not a threshold. Once a goal is proven covered on an artifact it
//! is memoized there and never re-derived for that artifact.

use std::cmp::Ordering;
use std::sync::Arc;

use log::{debug, trace};

use super::artifact::TestArtifact;
use super::chromosome::TestChromosome;
use super::execution::{ExecutableCandidate, Executor, OutcomeOf};
use super::suite::TestSuiteChromosome;
use crate::ga::{Candidate, FitnessError, Objective};
use crate::schema::ObjectiveId;

/// Coverage objective for a single goal.
///
/// Every goal objective is an [`Objective`] over [`TestChromosome`] through a
/// blanket implementation that is always minimizing.
pub trait GoalObjective<A: TestArtifact>: Send + Sync {
    fn goal_id(&self) -> &ObjectiveId;

    /// Executor used when the candidate has no up-to-date outcome.
    fn executor(&self) -> &dyn Executor<A>;

    /// Score an already executed test. `0.0` means the goal is covered.
    fn fitness_for_outcome(&self, candidate: &TestChromosome<A>, outcome: &OutcomeOf<A>) -> f64;

    /// Natural order of goals, used to attempt cheaper goals first.
    /// Implementations usually build it from [`GoalObjective::compare_kind`]
    /// and [`GoalObjective::compare_target_method`].
    fn compare_goal(&self, other: &dyn GoalObjective<A>) -> Ordering;

    fn target_class(&self) -> &str;

    fn target_method(&self) -> &str;

    /// Order by criterion family.
    fn compare_kind(&self, other: &dyn GoalObjective<A>) -> Ordering {
        self.goal_id().kind().cmp(other.goal_id().kind())
    }

    fn compare_target_method(&self, other: &dyn GoalObjective<A>) -> Ordering {
        self.target_method().cmp(other.target_method())
    }

    /// Execute if needed, score, and record the score on the candidate.
    fn evaluate(&self, candidate: &mut TestChromosome<A>) -> Result<f64, FitnessError> {
        trace!("Evaluating {} on test {}", self.goal_id(), candidate.test().id());
        let outcome = candidate.execute(self.executor());
        let fitness = self.fitness_for_outcome(candidate, &outcome);
        candidate
            .state_mut()
            .record_evaluation(self.goal_id(), fitness)?;
        Ok(fitness)
    }

    /// Whether the candidate covers this goal. A memoized hit skips
    /// execution entirely.
    fn is_covered(&self, candidate: &mut TestChromosome<A>) -> bool {
        if candidate.test().is_goal_covered(self.goal_id()) {
            return true;
        }
        let outcome = candidate.execute(self.executor());
        self.is_covered_with_outcome(candidate, &outcome)
    }

    /// Coverage check against a given outcome; records the goal on the
    /// artifact when covered.
    fn is_covered_with_outcome(
        &self,
        candidate: &mut TestChromosome<A>,
        outcome: &OutcomeOf<A>,
    ) -> bool {
        let covered = self.fitness_for_outcome(candidate, outcome) == 0.0;
        if covered {
            candidate.mark_goal_covered(self.goal_id().clone());
        }
        covered
    }

    /// Coverage check for a bare artifact, through a temporary candidate.
    fn is_covered_test(&self, test: &mut A) -> bool {
        if test.is_goal_covered(self.goal_id()) {
            return true;
        }
        let mut candidate = TestChromosome::new(test.clone());
        let covered = self.is_covered(&mut candidate);
        if covered {
            test.add_covered_goal(self.goal_id().clone());
        }
        covered
    }

    fn is_covered_tests(&self, tests: &mut [A]) -> bool {
        tests.iter_mut().any(|test| self.is_covered_test(test))
    }

    /// Coverage check against an outcome that was produced elsewhere. The
    /// test is never run again.
    fn is_covered_by_outcome(&self, test: &mut A, outcome: Arc<OutcomeOf<A>>) -> bool {
        if test.is_goal_covered(self.goal_id()) {
            return true;
        }
        let mut candidate = TestChromosome::new(test.clone());
        candidate.outcome_cache_mut().store_shared(Arc::clone(&outcome));
        candidate.state_mut().set_changed(false);
        let covered = self.is_covered_with_outcome(&mut candidate, &outcome);
        if covered {
            test.add_covered_goal(self.goal_id().clone());
        }
        covered
    }

    fn is_covered_by_outcomes(&self, results: &mut [(A, Arc<OutcomeOf<A>>)]) -> bool {
        results
            .iter_mut()
            .any(|(test, outcome)| self.is_covered_by_outcome(test, Arc::clone(outcome)))
    }

    /// Scan the suite in order, stopping at the first covering test.
    fn is_covered_by_suite(&self, suite: &mut TestSuiteChromosome<A>) -> bool {
        let total = suite.len();
        for (num, test) in suite.iter_tests_mut().enumerate() {
            debug!("Checking goal against test {}/{}", num + 1, total);
            if self.is_covered(test) {
                return true;
            }
        }
        false
    }
}

impl<A, G> Objective<TestChromosome<A>> for G
where
    A: TestArtifact,
    G: GoalObjective<A> + ?Sized,
{
    fn id(&self) -> &ObjectiveId {
        self.goal_id()
    }

    fn fitness(&self, candidate: &mut TestChromosome<A>) -> Result<f64, FitnessError> {
        self.evaluate(candidate)
    }

    fn is_maximizing(&self) -> bool {
        false
    }
}

/// Sort goals by their natural order before a generation starts.
pub fn sort_goals<A: TestArtifact>(goals: &mut [Arc<dyn GoalObjective<A>>]) {
    goals.sort_by(|a, b| a.compare_goal(b.as_ref()));
}
