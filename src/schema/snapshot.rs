//! Serializable views of candidates and of a running search.

use serde::{Deserialize, Serialize};

use super::ObjectiveId;

/// Score of one candidate for one objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveScore {
    pub objective: ObjectiveId,
    pub fitness: f64,
    pub previous_fitness: Option<f64>,
    pub coverage: Option<f64>,
    pub covered_goals: Option<i32>,
    pub not_covered_goals: Option<i32>,
}

/// Snapshot of a candidate for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    /// Aggregate fitness.
    pub fitness: f64,
    /// Mean coverage over objectives.
    pub coverage: f64,
    pub size: usize,
    pub age: usize,
    pub rank: Option<usize>,
    pub distance: f64,
    pub covered_goals: i32,
    pub not_covered_goals: i32,
    pub number_of_mutations: u32,
    pub number_of_evaluations: u32,
    /// Per-objective scores, in registration order.
    pub objectives: Vec<ObjectiveScore>,
}

/// Progress information for a running search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Current generation number.
    pub generation: usize,
    /// Total generations planned.
    pub total_generations: usize,
    /// Best aggregate fitness seen so far.
    pub best_fitness: f64,
    /// Average fitness of current population.
    pub avg_fitness: f64,
    /// Best fitness this generation.
    pub generation_best: f64,
    /// Generations since last improvement.
    pub stagnation_count: usize,
    pub best_candidate: Option<CandidateSnapshot>,
    /// Top N candidates.
    pub top_candidates: Vec<CandidateSnapshot>,
    pub history: EvolutionHistory,
    pub phase: EvolutionPhase,
}

/// Per-generation statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionHistory {
    /// Best fitness per generation.
    pub best_fitness: Vec<f64>,
    /// Average fitness per generation.
    pub avg_fitness: Vec<f64>,
    /// Standard deviation per generation.
    pub fitness_std: Vec<f64>,
    /// Mean candidate size per generation.
    pub avg_size: Vec<f64>,
}

/// Current phase of the search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    #[default]
    Initializing,
    Evaluating,
    /// A stopping criterion was met.
    Complete,
    /// Stopped early by cancellation or an error.
    Stopped,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best candidate of the final population, if any.
    pub best: Option<CandidateSnapshot>,
    pub stats: EvolutionStats,
    pub history: EvolutionHistory,
}

/// Statistics from a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Total generations run.
    pub generations: usize,
    /// Objective evaluations performed.
    pub total_evaluations: u64,
    pub best_fitness: f64,
    /// Average fitness of final population.
    pub final_avg_fitness: f64,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    pub evaluations_per_second: f64,
    pub stop_reason: StopReason,
}

/// Reason a run stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached maximum generations.
    MaxGenerations,
    /// Reached target fitness.
    TargetReached,
    /// Stagnation limit hit.
    Stagnation,
    /// Cancelled through the cancel handle.
    Cancelled,
    /// An objective reported an error.
    Error(String),
}
