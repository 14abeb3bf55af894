//! Candidate solutions and their per-objective bookkeeping.
//!
//! A candidate is one point in the search space: a test case, a test suite,
//! or any other evolvable artifact. The bookkeeping shared by every kind lives
//! in [`CandidateState`]; the operators each kind must supply are the
//! required methods of [`Candidate`].

use std::cmp::Ordering;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::{ConstructionFailed, FitnessError};
use super::objective::Objective;
use super::table::ObjectiveTable;
use crate::schema::{CandidateSnapshot, ObjectiveId, ObjectiveScore};

/// Default fitness registered for a minimizing objective.
pub const MINIMIZING_DEFAULT: f64 = f64::MAX;

/// Not-covered goal count meaning "not computed yet".
pub const NOT_COVERED_UNKNOWN: i32 = -1;

/// Whether the cached evaluation of a candidate still describes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Freshness {
    /// Changed since the last evaluation (or never evaluated).
    #[default]
    Stale,
    /// Evaluated and unchanged since.
    Fresh,
}

/// Bookkeeping shared by every candidate kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateState {
    fitness_values: ObjectiveTable<f64>,
    previous_fitness_values: ObjectiveTable<f64>,
    coverage_values: ObjectiveTable<f64>,
    covered_goals: ObjectiveTable<i32>,
    not_covered_goals: ObjectiveTable<i32>,
    freshness: Freshness,
    local_search_applied: bool,
    age: usize,
    rank: Option<usize>,
    distance: f64,
    number_of_mutations: u32,
    number_of_evaluations: u32,
    num_collisions: u32,
}

impl CandidateState {
    /// Fresh state: no objectives, changed, rank unset.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Fitness
    // ------------------------------------------------------------------

    /// Sum of the current values of every registered objective.
    ///
    /// Maximizing and minimizing objectives are summed as they are; no sign
    /// normalization happens here.
    pub fn fitness(&self) -> f64 {
        self.fitness_values.values().sum()
    }

    /// Cached current fitness for an objective.
    pub fn fitness_of(&self, id: &ObjectiveId) -> Option<f64> {
        self.fitness_values.get(id).copied()
    }

    pub fn previous_fitness_of(&self, id: &ObjectiveId) -> Option<f64> {
        self.previous_fitness_values.get(id).copied()
    }

    pub fn has_executed_fitness(&self, id: &ObjectiveId) -> bool {
        self.previous_fitness_values.contains(id)
    }

    pub fn is_registered(&self, id: &ObjectiveId) -> bool {
        self.fitness_values.contains(id)
    }

    /// Register an objective with an explicit initial value.
    pub fn add_fitness(&mut self, id: &ObjectiveId, value: f64) -> Result<(), FitnessError> {
        self.add_fitness_with(id, value, 0.0, 0)
    }

    pub fn add_fitness_with_coverage(
        &mut self,
        id: &ObjectiveId,
        value: f64,
        coverage: f64,
    ) -> Result<(), FitnessError> {
        self.add_fitness_with(id, value, coverage, 0)
    }

    /// Register an objective with explicit fitness, coverage and covered-goal
    /// count. The value goes into both the current and the previous slot, so a
    /// first registration never reads as an improvement. Any existing
    /// registration of the same objective is overwritten.
    pub fn add_fitness_with(
        &mut self,
        id: &ObjectiveId,
        value: f64,
        coverage: f64,
        covered_goals: i32,
    ) -> Result<(), FitnessError> {
        check_fitness(id, value)?;
        check_coverage(id, coverage)?;
        self.register(id, value, coverage, covered_goals);
        Ok(())
    }

    /// Callers guarantee `value` is finite and `coverage` within bounds.
    pub(crate) fn register(&mut self, id: &ObjectiveId, value: f64, coverage: f64, covered: i32) {
        self.fitness_values.insert(id.clone(), value);
        self.previous_fitness_values.insert(id.clone(), value);
        self.coverage_values.insert(id.clone(), coverage);
        self.covered_goals.insert(id.clone(), covered);
        self.not_covered_goals
            .insert(id.clone(), NOT_COVERED_UNKNOWN);
    }

    /// Store a new current fitness, rotating the old one into the previous
    /// slot. Without a prior value the new value is rotated instead, which
    /// reads as "no change". NaN and infinite values are rejected and leave
    /// the state untouched.
    pub fn set_fitness(&mut self, id: &ObjectiveId, value: f64) -> Result<(), FitnessError> {
        check_fitness(id, value)?;
        let previous = self.fitness_of(id).unwrap_or(value);
        self.previous_fitness_values.insert(id.clone(), previous);
        self.fitness_values.insert(id.clone(), value);
        Ok(())
    }

    /// Record the result of one evaluation: store the fitness and count it.
    pub fn record_evaluation(&mut self, id: &ObjectiveId, value: f64) -> Result<(), FitnessError> {
        self.set_fitness(id, value)?;
        self.increase_number_of_evaluations();
        Ok(())
    }

    /// True if any objective's current value differs from its previous one.
    pub fn fitness_changed(&self) -> bool {
        self.fitness_values.iter().any(|(id, current)| {
            self.previous_fitness_values
                .get(id)
                .is_some_and(|previous| previous != current)
        })
    }

    pub fn fitness_values(&self) -> &ObjectiveTable<f64> {
        &self.fitness_values
    }

    pub fn previous_fitness_values(&self) -> &ObjectiveTable<f64> {
        &self.previous_fitness_values
    }

    pub fn set_fitness_values(&mut self, values: ObjectiveTable<f64>) -> Result<(), FitnessError> {
        for (id, value) in values.iter() {
            check_fitness(id, *value)?;
        }
        self.fitness_values = values;
        Ok(())
    }

    pub fn set_previous_fitness_values(
        &mut self,
        values: ObjectiveTable<f64>,
    ) -> Result<(), FitnessError> {
        for (id, value) in values.iter() {
            check_fitness(id, *value)?;
        }
        self.previous_fitness_values = values;
        Ok(())
    }

    /// Fitness of the first registered objective accepted by `predicate`,
    /// or `0.0` when none matches.
    pub fn fitness_of_kind<P>(&self, predicate: P) -> f64
    where
        P: FnMut(&ObjectiveId) -> bool,
    {
        self.fitness_values
            .find(predicate)
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }

    pub fn fitness_of_kind_named(&self, kind: &str) -> f64 {
        self.fitness_of_kind(|id| id.is_kind(kind))
    }

    // ------------------------------------------------------------------
    // Coverage
    // ------------------------------------------------------------------

    /// Mean coverage across objectives, `0.0` when nothing is recorded.
    pub fn coverage(&self) -> f64 {
        if self.coverage_values.is_empty() {
            return 0.0;
        }
        let cov = self.coverage_values.values().sum::<f64>() / self.coverage_values.len() as f64;
        debug_assert!(
            (0.0..=1.0).contains(&cov),
            "Incorrect coverage value {cov}. Expected value between 0 and 1"
        );
        cov
    }

    pub fn coverage_of(&self, id: &ObjectiveId) -> f64 {
        self.coverage_values.get(id).copied().unwrap_or(0.0)
    }

    pub fn set_coverage(&mut self, id: &ObjectiveId, coverage: f64) -> Result<(), FitnessError> {
        check_coverage(id, coverage)?;
        self.coverage_values.insert(id.clone(), coverage);
        Ok(())
    }

    pub fn coverage_values(&self) -> &ObjectiveTable<f64> {
        &self.coverage_values
    }

    pub fn set_coverage_values(&mut self, values: ObjectiveTable<f64>) -> Result<(), FitnessError> {
        for (id, value) in values.iter() {
            check_coverage(id, *value)?;
        }
        self.coverage_values = values;
        Ok(())
    }

    pub fn coverage_of_kind<P>(&self, predicate: P) -> f64
    where
        P: FnMut(&ObjectiveId) -> bool,
    {
        self.coverage_values
            .find(predicate)
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }

    pub fn coverage_of_kind_named(&self, kind: &str) -> f64 {
        self.coverage_of_kind(|id| id.is_kind(kind))
    }

    // ------------------------------------------------------------------
    // Goal counts
    // ------------------------------------------------------------------

    pub fn num_covered_goals(&self) -> i32 {
        self.covered_goals.values().sum()
    }

    /// Sum of not-covered counts; unknown entries contribute their `-1`.
    pub fn num_not_covered_goals(&self) -> i32 {
        self.not_covered_goals.values().sum()
    }

    pub fn covered_goals_of(&self, id: &ObjectiveId) -> i32 {
        self.covered_goals.get(id).copied().unwrap_or(0)
    }

    pub fn not_covered_goals_of(&self, id: &ObjectiveId) -> i32 {
        self.not_covered_goals.get(id).copied().unwrap_or(0)
    }

    pub fn set_covered_goals(&mut self, id: &ObjectiveId, count: i32) {
        self.covered_goals.insert(id.clone(), count);
    }

    pub fn set_not_covered_goals(&mut self, id: &ObjectiveId, count: i32) {
        self.not_covered_goals.insert(id.clone(), count);
    }

    pub fn covered_goal_counts(&self) -> &ObjectiveTable<i32> {
        &self.covered_goals
    }

    pub fn not_covered_goal_counts(&self) -> &ObjectiveTable<i32> {
        &self.not_covered_goals
    }

    pub fn set_covered_goal_counts(&mut self, counts: ObjectiveTable<i32>) {
        self.covered_goals = counts;
    }

    pub fn set_not_covered_goal_counts(&mut self, counts: ObjectiveTable<i32>) {
        self.not_covered_goals = counts;
    }

    // ------------------------------------------------------------------
    // Change tracking
    // ------------------------------------------------------------------

    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    pub fn is_changed(&self) -> bool {
        self.freshness == Freshness::Stale
    }

    /// Marking a candidate changed also makes local search applicable again.
    pub fn set_changed(&mut self, changed: bool) {
        if changed {
            self.freshness = Freshness::Stale;
            self.local_search_applied = false;
        } else {
            self.freshness = Freshness::Fresh;
        }
    }

    pub fn has_local_search_been_applied(&self) -> bool {
        self.local_search_applied
    }

    pub fn set_local_search_applied(&mut self, applied: bool) {
        self.local_search_applied = applied;
    }

    // ------------------------------------------------------------------
    // Search metadata
    // ------------------------------------------------------------------

    pub fn age(&self) -> usize {
        self.age
    }

    pub fn update_age(&mut self, generation: usize) {
        self.age = generation;
    }

    /// Pareto front index, 0 being the best front; `None` when unassigned.
    pub fn rank(&self) -> Option<usize> {
        self.rank
    }

    /// Rank as a signed index with `-1` for "unassigned".
    pub fn rank_index(&self) -> i64 {
        self.rank.map_or(-1, |r| r as i64)
    }

    pub fn set_rank(&mut self, rank: Option<usize>) {
        self.rank = rank;
    }

    /// Crowding distance.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn set_distance(&mut self, distance: f64) {
        self.distance = distance;
    }

    pub fn number_of_mutations(&self) -> u32 {
        self.number_of_mutations
    }

    pub fn increase_number_of_mutations(&mut self) {
        self.number_of_mutations += 1;
    }

    pub fn set_number_of_mutations(&mut self, n: u32) {
        self.number_of_mutations = n;
    }

    pub fn number_of_evaluations(&self) -> u32 {
        self.number_of_evaluations
    }

    pub fn increase_number_of_evaluations(&mut self) {
        self.number_of_evaluations += 1;
    }

    pub fn set_number_of_evaluations(&mut self, n: u32) {
        self.number_of_evaluations = n;
    }

    pub fn num_collisions(&self) -> u32 {
        self.num_collisions
    }

    pub fn set_num_collisions(&mut self, n: u32) {
        self.num_collisions = n;
    }

    pub fn increase_num_collisions(&mut self) {
        self.num_collisions += 1;
    }

    pub fn reset_num_collisions(&mut self) {
        self.num_collisions = 0;
    }

    /// Per-objective view for reporting.
    pub fn objective_scores(&self) -> Vec<ObjectiveScore> {
        self.fitness_values
            .iter()
            .map(|(id, fitness)| ObjectiveScore {
                objective: id.clone(),
                fitness: *fitness,
                previous_fitness: self.previous_fitness_of(id),
                coverage: self.coverage_values.get(id).copied(),
                covered_goals: self.covered_goals.get(id).copied(),
                not_covered_goals: self.not_covered_goals.get(id).copied(),
            })
            .collect()
    }
}

fn check_fitness(id: &ObjectiveId, value: f64) -> Result<(), FitnessError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FitnessError::InvalidFitnessValue {
            objective: id.clone(),
            value,
        })
    }
}

fn check_coverage(id: &ObjectiveId, value: f64) -> Result<(), FitnessError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(FitnessError::InvalidCoverage {
            objective: id.clone(),
            value,
        })
    }
}

/// An evolvable solution that operates on its own concrete type.
///
/// Implementors own a [`CandidateState`] and supply the genetic operators.
/// Every structural edit must go through [`Candidate::set_changed`] so cached
/// evaluations are invalidated in one place.
pub trait Candidate: Clone + Send + Sized {
    fn state(&self) -> &CandidateState;

    fn state_mut(&mut self) -> &mut CandidateState;

    /// Tie-breaker used by [`Candidate::compare`] when aggregate fitness is
    /// equal, e.g. preferring shorter artifacts.
    fn compare_secondary(&self, other: &Self) -> Ordering;

    fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R);

    /// Recombine with `other` at the given cut points.
    fn crossover(
        &mut self,
        other: &Self,
        position1: usize,
        position2: usize,
    ) -> Result<(), ConstructionFailed>;

    /// Try to improve this candidate for `objective`. Returns whether an
    /// improvement was found.
    fn local_search(&mut self, objective: &dyn Objective<Self>) -> bool;

    fn size(&self) -> usize;

    /// Aggregate fitness over all registered objectives.
    fn fitness(&self) -> f64 {
        self.state().fitness()
    }

    /// Cached fitness for `objective`, evaluating it only when nothing is
    /// cached yet. Evaluation records the value on this candidate.
    fn fitness_for(&mut self, objective: &dyn Objective<Self>) -> Result<f64, FitnessError> {
        match self.state().fitness_of(objective.id()) {
            Some(value) => Ok(value),
            None => objective.fitness(self),
        }
    }

    /// Register `objective` with its neutral default: `0` when maximizing,
    /// [`MINIMIZING_DEFAULT`] otherwise. Registering twice is a no-op.
    fn add_fitness(&mut self, objective: &dyn Objective<Self>) {
        let id = objective.id();
        if self.state().is_registered(id) {
            return;
        }
        let value = if objective.is_maximizing() {
            0.0
        } else {
            MINIMIZING_DEFAULT
        };
        self.state_mut().register(id, value, 0.0, 0);
    }

    fn crossover_at(&mut self, other: &Self, position: usize) -> Result<(), ConstructionFailed> {
        self.crossover(other, position, position)
    }

    /// Order by aggregate fitness, falling back to
    /// [`Candidate::compare_secondary`] on ties.
    fn compare(&self, other: &Self) -> Ordering {
        match self.fitness().partial_cmp(&other.fitness()) {
            Some(Ordering::Less) => Ordering::Less,
            Some(Ordering::Greater) => Ordering::Greater,
            _ => self.compare_secondary(other),
        }
    }

    fn is_changed(&self) -> bool {
        self.state().is_changed()
    }

    /// Kinds holding further caches override this to drop them on change.
    fn set_changed(&mut self, changed: bool) {
        self.state_mut().set_changed(changed);
    }

    fn has_local_search_been_applied(&self) -> bool {
        self.state().has_local_search_been_applied()
    }

    fn snapshot(&self) -> CandidateSnapshot {
        let state = self.state();
        CandidateSnapshot {
            fitness: state.fitness(),
            coverage: state.coverage(),
            size: self.size(),
            age: state.age(),
            rank: state.rank(),
            distance: state.distance(),
            covered_goals: state.num_covered_goals(),
            not_covered_goals: state.num_not_covered_goals(),
            number_of_mutations: state.number_of_mutations(),
            number_of_evaluations: state.number_of_evaluations(),
            objectives: state.objective_scores(),
        }
    }
}
