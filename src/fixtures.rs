//! Small candidate kinds, artifacts and objectives shared by unit tests.

use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ga::{
    Candidate, CandidateState, ConstructionFailed, FitnessError, Objective, normalize,
};
use crate::schema::ObjectiveId;
use crate::testcase::{CoveredGoals, Executor, GoalObjective, TestArtifact, TestChromosome};

// ----------------------------------------------------------------------
// Bit strings
// ----------------------------------------------------------------------

/// Plain candidate with no execution step.
#[derive(Debug, Clone)]
pub struct BitString {
    state: CandidateState,
    pub bits: Vec<bool>,
}

impl BitString {
    pub fn new(bits: Vec<bool>) -> Self {
        Self {
            state: CandidateState::new(),
            bits,
        }
    }

    fn ones(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

impl Candidate for BitString {
    fn state(&self) -> &CandidateState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CandidateState {
        &mut self.state
    }

    fn compare_secondary(&self, other: &Self) -> CmpOrdering {
        self.bits.len().cmp(&other.bits.len())
    }

    fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.bits.is_empty() {
            return;
        }
        let i = rng.gen_range(0..self.bits.len());
        self.bits[i] = !self.bits[i];
        self.set_changed(true);
        self.state.increase_number_of_mutations();
    }

    fn crossover(
        &mut self,
        other: &Self,
        position1: usize,
        position2: usize,
    ) -> Result<(), ConstructionFailed> {
        if position1 > self.bits.len() || position2 > other.bits.len() {
            return Err(ConstructionFailed::new("cut point out of range"));
        }
        self.bits.truncate(position1);
        self.bits.extend_from_slice(&other.bits[position2..]);
        self.set_changed(true);
        Ok(())
    }

    fn local_search(&mut self, objective: &dyn Objective<Self>) -> bool {
        let Ok(mut best) = objective.fitness(self) else {
            return false;
        };
        let mut improved = false;
        for i in 0..self.bits.len() {
            let mut trial = self.clone();
            trial.bits[i] = !trial.bits[i];
            trial.set_changed(true);
            if let Ok(fitness) = objective.fitness(&mut trial) {
                let better = if objective.is_maximizing() {
                    fitness > best
                } else {
                    fitness < best
                };
                if better {
                    best = fitness;
                    *self = trial;
                    improved = true;
                }
            }
        }
        self.state.set_local_search_applied(true);
        improved
    }

    fn size(&self) -> usize {
        self.bits.len()
    }
}

/// Returns a fixed value and counts how often it was asked.
pub struct ConstantObjective {
    id: ObjectiveId,
    value: f64,
    maximizing: bool,
    calls: AtomicUsize,
}

impl ConstantObjective {
    pub fn maximizing(key: &str, value: f64) -> Self {
        Self::build(key, value, true)
    }

    pub fn minimizing(key: &str, value: f64) -> Self {
        Self::build(key, value, false)
    }

    fn build(key: &str, value: f64, maximizing: bool) -> Self {
        Self {
            id: ObjectiveId::new("constant", key),
            value,
            maximizing,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Objective<BitString> for ConstantObjective {
    fn id(&self) -> &ObjectiveId {
        &self.id
    }

    fn fitness(&self, candidate: &mut BitString) -> Result<f64, FitnessError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.update_individual(candidate, self.value)?;
        Ok(self.value)
    }

    fn is_maximizing(&self) -> bool {
        self.maximizing
    }
}

/// Maximizing: number of set bits.
pub struct OnesObjective {
    id: ObjectiveId,
}

impl OnesObjective {
    pub fn new() -> Self {
        Self {
            id: ObjectiveId::new("bits", "ones"),
        }
    }
}

impl Objective<BitString> for OnesObjective {
    fn id(&self) -> &ObjectiveId {
        &self.id
    }

    fn fitness(&self, candidate: &mut BitString) -> Result<f64, FitnessError> {
        let fitness = candidate.ones() as f64;
        self.update_individual(candidate, fitness)?;
        Ok(fitness)
    }

    fn is_maximizing(&self) -> bool {
        true
    }
}

/// Minimizing: number of cleared bits.
pub struct ZerosObjective {
    id: ObjectiveId,
}

impl ZerosObjective {
    pub fn new() -> Self {
        Self {
            id: ObjectiveId::new("bits", "zeros"),
        }
    }
}

impl Objective<BitString> for ZerosObjective {
    fn id(&self) -> &ObjectiveId {
        &self.id
    }

    fn fitness(&self, candidate: &mut BitString) -> Result<f64, FitnessError> {
        let fitness = (candidate.bits.len() - candidate.ones()) as f64;
        self.update_individual(candidate, fitness)?;
        Ok(fitness)
    }
}

// ----------------------------------------------------------------------
// Probe tests
// ----------------------------------------------------------------------

static NEXT_PROBE_ID: AtomicU64 = AtomicU64::new(0);

/// A test that "computes" the sum of its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    id: u64,
    pub values: Vec<i64>,
    crashes: bool,
    failing: bool,
    covered: CoveredGoals,
}

impl Probe {
    pub fn new(values: Vec<i64>) -> Self {
        Self {
            id: NEXT_PROBE_ID.fetch_add(1, Ordering::Relaxed),
            values,
            crashes: false,
            failing: false,
            covered: CoveredGoals::new(),
        }
    }

    /// A probe whose execution always crashes.
    pub fn crashing(values: Vec<i64>) -> Self {
        Self {
            crashes: true,
            ..Self::new(values)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub sum: i64,
    pub crashed: bool,
}

impl TestArtifact for Probe {
    type Outcome = ProbeOutcome;

    fn id(&self) -> u64 {
        self.id
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn is_failing(&self) -> bool {
        self.failing
    }

    fn set_failing(&mut self) {
        self.failing = true;
    }

    fn covered_goals(&self) -> &CoveredGoals {
        &self.covered
    }

    fn covered_goals_mut(&mut self) -> &mut CoveredGoals {
        &mut self.covered
    }

    fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.values.is_empty() {
            self.values.push(rng.gen_range(-3..=3));
        } else {
            let i = rng.gen_range(0..self.values.len());
            self.values[i] += if rng.gen_bool(0.5) { 1 } else { -1 };
        }
        true
    }

    fn crossover(
        &mut self,
        other: &Self,
        position1: usize,
        position2: usize,
    ) -> Result<(), ConstructionFailed> {
        if position1 > self.values.len() || position2 > other.values.len() {
            return Err(ConstructionFailed::new(format!(
                "cut {}/{} outside probes of {}/{} values",
                position1,
                position2,
                self.values.len(),
                other.values.len()
            )));
        }
        self.values.truncate(position1);
        self.values.extend_from_slice(&other.values[position2..]);
        Ok(())
    }

    fn neighbours(&self) -> Vec<Self> {
        let mut out = Vec::with_capacity(self.values.len() * 2);
        for i in 0..self.values.len() {
            for delta in [1, -1] {
                let mut next = self.clone();
                next.values[i] += delta;
                out.push(next);
            }
        }
        out
    }
}

/// Executes probes and counts the runs.
pub struct SumExecutor {
    runs: AtomicUsize,
}

impl SumExecutor {
    pub fn new() -> Self {
        Self {
            runs: AtomicUsize::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::Relaxed)
    }
}

impl Executor<Probe> for SumExecutor {
    fn run(&self, artifact: &Probe) -> ProbeOutcome {
        self.runs.fetch_add(1, Ordering::Relaxed);
        ProbeOutcome {
            sum: artifact.values.iter().sum(),
            crashed: artifact.crashes,
        }
    }
}

/// Normalized distance of a probe's sum to a target.
pub fn distance(sum: i64, target: i64) -> f64 {
    normalize((sum - target).abs() as f64).unwrap_or(1.0)
}

/// Goal: the probe's inputs sum to `target`.
pub struct ReachSum {
    id: ObjectiveId,
    target: i64,
    method: String,
    executor: Arc<SumExecutor>,
}

impl ReachSum {
    pub fn new(target: i64, executor: Arc<SumExecutor>) -> Self {
        Self {
            id: ObjectiveId::new("sum", target.to_string()),
            target,
            method: "run".to_string(),
            executor,
        }
    }

    pub fn in_method(mut self, method: &str) -> Self {
        self.method = method.to_string();
        self
    }
}

impl GoalObjective<Probe> for ReachSum {
    fn goal_id(&self) -> &ObjectiveId {
        &self.id
    }

    fn executor(&self) -> &dyn Executor<Probe> {
        self.executor.as_ref()
    }

    fn fitness_for_outcome(&self, _candidate: &TestChromosome<Probe>, outcome: &ProbeOutcome) -> f64 {
        if outcome.crashed {
            1.0
        } else {
            distance(outcome.sum, self.target)
        }
    }

    fn compare_goal(&self, other: &dyn GoalObjective<Probe>) -> CmpOrdering {
        self.compare_kind(other)
            .then_with(|| self.compare_target_method(other))
            .then_with(|| self.id.key().cmp(other.goal_id().key()))
    }

    fn target_class(&self) -> &str {
        "Probe"
    }

    fn target_method(&self) -> &str {
        &self.method
    }
}
