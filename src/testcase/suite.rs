//! Test suites as candidates, and objectives that score whole suites.

use std::cmp::Ordering;
use std::sync::Arc;

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::artifact::TestArtifact;
use super::chromosome::TestChromosome;
use super::execution::Executor;
use super::goal::GoalObjective;
use crate::ga::{
    ArchiveObjective, Candidate, CandidateArchive, CandidateState, ConstructionFailed,
    FitnessError, MINIMIZING_DEFAULT, Objective,
};
use crate::schema::ObjectiveId;

/// An ordered collection of tests evolved as one candidate.
///
/// The suite's own changed flag covers suite-level structure. Member tests
/// keep their own flags and outcome caches, so an unchanged member is not
/// re-executed when the suite around it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "A: Serialize",
    deserialize = "A: Deserialize<'de>"
))]
pub struct TestSuiteChromosome<A: TestArtifact> {
    state: CandidateState,
    tests: Vec<TestChromosome<A>>,
}

impl<A: TestArtifact> TestSuiteChromosome<A> {
    pub fn new() -> Self {
        Self {
            state: CandidateState::new(),
            tests: Vec::new(),
        }
    }

    pub fn from_tests(tests: impl IntoIterator<Item = A>) -> Self {
        Self {
            state: CandidateState::new(),
            tests: tests.into_iter().map(TestChromosome::new).collect(),
        }
    }

    pub fn tests(&self) -> &[TestChromosome<A>] {
        &self.tests
    }

    /// Member tests, for evaluation. Structural edits made through this
    /// iterator must be followed by `set_changed(true)` on the suite.
    pub fn iter_tests_mut(&mut self) -> impl Iterator<Item = &mut TestChromosome<A>> {
        self.tests.iter_mut()
    }

    pub fn add_test(&mut self, test: A) {
        self.tests.push(TestChromosome::new(test));
        self.set_changed(true);
    }

    pub fn remove_test(&mut self, index: usize) -> Option<TestChromosome<A>> {
        if index >= self.tests.len() {
            return None;
        }
        let removed = self.tests.remove(index);
        self.set_changed(true);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn total_statements(&self) -> usize {
        self.tests.iter().map(|t| t.test().size()).sum()
    }
}

impl<A: TestArtifact> Default for TestSuiteChromosome<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: TestArtifact> Candidate for TestSuiteChromosome<A> {
    fn state(&self) -> &CandidateState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CandidateState {
        &mut self.state
    }

    /// Fewer statements first.
    fn compare_secondary(&self, other: &Self) -> Ordering {
        self.total_statements().cmp(&other.total_statements())
    }

    /// Mutate one random member, or now and then append a copy of one.
    fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.tests.is_empty() {
            return;
        }
        let index = rng.gen_range(0..self.tests.len());
        if rng.gen_range(0..=self.tests.len()) == 0 {
            let mut copy = self.tests[index].clone();
            copy.mutate(rng);
            self.tests.push(copy);
        } else {
            self.tests[index].mutate(rng);
        }
        self.set_changed(true);
        self.state.increase_number_of_mutations();
    }

    fn crossover(
        &mut self,
        other: &Self,
        position1: usize,
        position2: usize,
    ) -> Result<(), ConstructionFailed> {
        if position1 > self.tests.len() || position2 > other.tests.len() {
            return Err(ConstructionFailed::new(format!(
                "crossover points {}/{} outside suites of {}/{} tests",
                position1,
                position2,
                self.tests.len(),
                other.tests.len()
            )));
        }
        self.tests.truncate(position1);
        self.tests.extend(other.tests[position2..].iter().cloned());
        self.set_changed(true);
        Ok(())
    }

    /// Drop tests that do not contribute, last to first, while the fitness
    /// does not get worse. Returns whether any test was dropped.
    fn local_search(&mut self, objective: &dyn Objective<Self>) -> bool {
        let mut best = match objective.fitness(self) {
            Ok(fitness) => fitness,
            Err(err) => {
                warn!("Local search skipped for suite: {}", err);
                return false;
            }
        };

        let maximizing = objective.is_maximizing();
        let mut improved = false;
        for index in (0..self.tests.len()).rev() {
            let mut trial = self.clone();
            trial.tests.remove(index);
            trial.set_changed(true);
            match objective.fitness(&mut trial) {
                Ok(fitness) if !is_worse(fitness, best, maximizing) => {
                    debug!("Dropped test {} from suite, fitness {}", index, fitness);
                    best = fitness;
                    *self = trial;
                    improved = true;
                }
                Ok(_) => {}
                Err(err) => warn!("Local search evaluation failed: {}", err),
            }
        }

        if improved {
            self.state.set_changed(true);
        }
        self.state.set_local_search_applied(true);
        improved
    }

    fn size(&self) -> usize {
        self.tests.len()
    }
}

fn is_worse(candidate: f64, best: f64, maximizing: bool) -> bool {
    if maximizing {
        candidate < best
    } else {
        candidate > best
    }
}

/// Objective over whole suites whose tests are run by a known executor.
pub trait SuiteObjective<A: TestArtifact>: Objective<TestSuiteChromosome<A>> {
    fn executor(&self) -> &dyn Executor<A>;
}

/// Scores a suite by the number of goals it leaves uncovered, and keeps the
/// best suites seen so far.
pub struct SuiteCoverageObjective<A: TestArtifact> {
    id: ObjectiveId,
    goals: Vec<Arc<dyn GoalObjective<A>>>,
    executor: Arc<dyn Executor<A>>,
    archive: CandidateArchive<TestSuiteChromosome<A>>,
}

impl<A: TestArtifact> SuiteCoverageObjective<A> {
    pub const KIND: &'static str = "suite-coverage";

    pub fn new<E>(
        name: impl Into<String>,
        goals: Vec<Arc<dyn GoalObjective<A>>>,
        executor: Arc<E>,
        archive_size: usize,
    ) -> Self
    where
        E: Executor<A> + 'static,
    {
        Self {
            id: ObjectiveId::new(Self::KIND, name),
            goals,
            executor,
            archive: CandidateArchive::new(archive_size),
        }
    }

    pub fn goals(&self) -> &[Arc<dyn GoalObjective<A>>] {
        &self.goals
    }

    pub fn archive(&self) -> &CandidateArchive<TestSuiteChromosome<A>> {
        &self.archive
    }
}

/// Lower fitness for `id` first, then fewer statements.
fn ranking<A: TestArtifact>(
    id: &ObjectiveId,
    a: &TestSuiteChromosome<A>,
    b: &TestSuiteChromosome<A>,
) -> Ordering {
    let fa = a.state().fitness_of(id).unwrap_or(MINIMIZING_DEFAULT);
    let fb = b.state().fitness_of(id).unwrap_or(MINIMIZING_DEFAULT);
    match fa.partial_cmp(&fb) {
        Some(Ordering::Equal) | None => a.compare_secondary(b),
        Some(ordering) => ordering,
    }
}

impl<A: TestArtifact> Objective<TestSuiteChromosome<A>> for SuiteCoverageObjective<A> {
    fn id(&self) -> &ObjectiveId {
        &self.id
    }

    fn fitness(&self, suite: &mut TestSuiteChromosome<A>) -> Result<f64, FitnessError> {
        let total = self.goals.len();
        let covered = self
            .goals
            .iter()
            .filter(|goal| goal.is_covered_by_suite(suite))
            .count();
        let uncovered = total - covered;
        debug!(
            "Suite of {} tests covers {}/{} goals for {}",
            suite.len(),
            covered,
            total,
            self.id
        );

        let coverage = if total == 0 {
            1.0
        } else {
            covered as f64 / total as f64
        };
        let fitness = uncovered as f64;
        let state = suite.state_mut();
        state.set_coverage(&self.id, coverage)?;
        state.set_covered_goals(&self.id, covered as i32);
        state.set_not_covered_goals(&self.id, uncovered as i32);
        self.update_individual(suite, fitness)?;
        suite.state_mut().set_changed(false);
        Ok(fitness)
    }

    fn as_archive(&self) -> Option<&dyn ArchiveObjective<TestSuiteChromosome<A>>> {
        Some(self)
    }

    fn as_archive_mut(&mut self) -> Option<&mut dyn ArchiveObjective<TestSuiteChromosome<A>>> {
        Some(self)
    }
}

impl<A: TestArtifact> SuiteObjective<A> for SuiteCoverageObjective<A> {
    fn executor(&self) -> &dyn Executor<A> {
        self.executor.as_ref()
    }
}

impl<A: TestArtifact> ArchiveObjective<TestSuiteChromosome<A>> for SuiteCoverageObjective<A> {
    /// Offer the population's best evaluated suite; it is stored only when it
    /// beats the current best.
    fn update_archive(&mut self, population: &mut [TestSuiteChromosome<A>]) -> bool {
        let best = population
            .iter()
            .filter(|suite| suite.state().fitness_of(&self.id).is_some())
            .min_by(|a, b| ranking(&self.id, a, b));
        let Some(best) = best else {
            return false;
        };
        if let Some(stored) = self.archive.best() {
            if ranking(&self.id, best, stored) != Ordering::Less {
                return false;
            }
        }

        let id = &self.id;
        let updated = self.archive.offer(best, |a, b| ranking(id, a, b));
        if updated {
            debug!(
                "Archive for {} updated: {} uncovered goals, {} tests",
                self.id,
                best.state().fitness_of(&self.id).unwrap_or(MINIMIZING_DEFAULT),
                best.len()
            );
        }
        updated
    }

    fn best_stored_candidate(&self) -> Option<&TestSuiteChromosome<A>> {
        self.archive.best()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Probe, ReachSum, SumExecutor};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn objective(targets: &[i64]) -> (SuiteCoverageObjective<Probe>, Arc<SumExecutor>) {
        let executor = Arc::new(SumExecutor::new());
        let goals: Vec<Arc<dyn GoalObjective<Probe>>> = targets
            .iter()
            .map(|t| Arc::new(ReachSum::new(*t, executor.clone())) as Arc<dyn GoalObjective<Probe>>)
            .collect();
        (
            SuiteCoverageObjective::new("sums", goals, executor.clone(), 3),
            executor,
        )
    }

    #[test]
    fn test_fitness_counts_uncovered_goals() {
        let (objective, _) = objective(&[1, 2, 50]);
        let mut suite = TestSuiteChromosome::from_tests(vec![Probe::new(vec![1]), Probe::new(vec![2])]);
        suite.add_fitness(&objective);

        assert_eq!(objective.fitness(&mut suite).unwrap(), 1.0);
        let state = suite.state();
        assert_eq!(state.coverage_of(objective.id()), 2.0 / 3.0);
        assert_eq!(state.covered_goals_of(objective.id()), 2);
        assert_eq!(state.not_covered_goals_of(objective.id()), 1);
        assert_eq!(state.number_of_evaluations(), 1);
        assert!(!suite.is_changed());
    }

    #[test]
    fn test_no_goals_is_full_coverage() {
        let (objective, _) = objective(&[]);
        let mut suite = TestSuiteChromosome::from_tests(vec![Probe::new(vec![1])]);
        assert_eq!(objective.fitness(&mut suite).unwrap(), 0.0);
        assert_eq!(suite.state().coverage_of(objective.id()), 1.0);
    }

    #[test]
    fn test_reevaluation_uses_memo() {
        let (objective, executor) = objective(&[3, 4]);
        let mut suite = TestSuiteChromosome::from_tests(vec![Probe::new(vec![3]), Probe::new(vec![4])]);
        objective.fitness(&mut suite).unwrap();
        let runs = executor.runs();
        objective.fitness(&mut suite).unwrap();
        assert_eq!(executor.runs(), runs);
    }

    #[test]
    fn test_crossover_splices_tests() {
        let mut a = TestSuiteChromosome::from_tests(vec![Probe::new(vec![1]), Probe::new(vec![2])]);
        let b = TestSuiteChromosome::from_tests(vec![Probe::new(vec![8]), Probe::new(vec![9])]);
        a.crossover(&b, 1, 1).unwrap();
        let values: Vec<_> = a.tests().iter().map(|t| t.test().values.clone()).collect();
        assert_eq!(values, vec![vec![1], vec![9]]);

        let err = a.crossover(&b, 5, 0).unwrap_err();
        assert!(err.reason.contains("5/0"));
    }

    #[test]
    fn test_mutate_marks_changed() {
        let mut suite = TestSuiteChromosome::from_tests(vec![Probe::new(vec![1, 2])]);
        suite.set_changed(false);
        let mut rng = StdRng::seed_from_u64(11);
        suite.mutate(&mut rng);
        assert!(suite.is_changed());
        assert_eq!(suite.state().number_of_mutations(), 1);

        let mut empty: TestSuiteChromosome<Probe> = TestSuiteChromosome::new();
        empty.set_changed(false);
        empty.mutate(&mut rng);
        assert!(!empty.is_changed());
    }

    #[test]
    fn test_secondary_prefers_fewer_statements() {
        let short = TestSuiteChromosome::from_tests(vec![Probe::new(vec![1])]);
        let long = TestSuiteChromosome::from_tests(vec![Probe::new(vec![1, 0, 0])]);
        assert_eq!(short.compare_secondary(&long), Ordering::Less);
        assert_eq!(short.size(), long.size());
    }

    #[test]
    fn test_local_search_drops_redundant_tests() {
        let (objective, _) = objective(&[5]);
        let mut suite = TestSuiteChromosome::from_tests(vec![
            Probe::new(vec![5]),
            Probe::new(vec![1]),
            Probe::new(vec![2]),
        ]);
        assert!(suite.local_search(&objective));
        assert_eq!(suite.len(), 1);
        assert_eq!(suite.tests()[0].test().values, vec![5]);
        assert!(suite.has_local_search_been_applied());
    }

    #[test]
    fn test_archive_keeps_improvements_only() {
        let (mut objective, _) = objective(&[1, 2]);
        let mut population = vec![
            TestSuiteChromosome::from_tests(vec![Probe::new(vec![1])]),
            TestSuiteChromosome::from_tests(vec![Probe::new(vec![7])]),
        ];
        for suite in population.iter_mut() {
            objective.fitness(suite).unwrap();
        }

        let archive = objective.as_archive_mut().unwrap();
        assert!(archive.update_archive(&mut population));
        assert!(!archive.update_archive(&mut population));
        let best = archive.best_stored_candidate().unwrap();
        assert_eq!(best.tests()[0].test().values, vec![1]);

        let mut better = vec![TestSuiteChromosome::from_tests(vec![
            Probe::new(vec![1]),
            Probe::new(vec![2]),
        ])];
        objective.fitness(&mut better[0]).unwrap();
        assert!(objective.update_archive(&mut better));
        assert_eq!(objective.archive().len(), 2);
        assert_eq!(objective.best_stored_candidate().unwrap().len(), 2);
    }

    #[test]
    fn test_unevaluated_population_leaves_archive() {
        let (mut objective, _) = objective(&[1]);
        let mut population = vec![TestSuiteChromosome::from_tests(vec![Probe::new(vec![1])])];
        assert!(!objective.update_archive(&mut population));
        assert!(objective.best_stored_candidate().is_none());
    }
}
