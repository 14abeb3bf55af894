//! Pluggable scoring of candidates.

use super::candidate::Candidate;
use super::error::FitnessError;
use crate::schema::ObjectiveId;

/// Scores a candidate against one evaluation criterion.
///
/// Objectives are shared read-only across the whole population, so scoring
/// takes `&self`. Computing a score always records it on the candidate:
/// implementations finish [`Objective::fitness`] with
/// [`Objective::update_individual`].
pub trait Objective<C: Candidate>: Send + Sync {
    /// Stable identity used as the key of every per-objective cache.
    fn id(&self) -> &ObjectiveId;

    /// Compute, record and return the fitness of `candidate`.
    fn fitness(&self, candidate: &mut C) -> Result<f64, FitnessError>;

    fn is_maximizing(&self) -> bool {
        false
    }

    /// Record `fitness` on `candidate` and count the evaluation.
    fn update_individual(&self, candidate: &mut C, fitness: f64) -> Result<(), FitnessError> {
        candidate.state_mut().record_evaluation(self.id(), fitness)
    }

    /// Archive capability, for objectives that keep best-known candidates.
    fn as_archive(&self) -> Option<&dyn ArchiveObjective<C>> {
        None
    }

    fn as_archive_mut(&mut self) -> Option<&mut dyn ArchiveObjective<C>> {
        None
    }
}

/// Objectives that maintain an archive of best-known candidates across
/// generations.
///
/// Archive updates need exclusive access, so they run once per generation
/// between evaluation passes, never concurrently with fitness queries.
pub trait ArchiveObjective<C: Candidate>: Objective<C> {
    /// Refresh the archive from the current population. Returns `true` when
    /// the archive changed.
    fn update_archive(&mut self, population: &mut [C]) -> bool;

    fn best_stored_candidate(&self) -> Option<&C>;
}

/// Map an unbounded, non-negative distance into `[0, 1)`, with `+inf`
/// mapping to `1.0`.
///
/// Finite inputs beyond 2^53 would round to `1.0`; they are capped at the
/// largest `f64` below it.
pub fn normalize(value: f64) -> Result<f64, FitnessError> {
    if value.is_nan() || value < 0.0 {
        return Err(FitnessError::InvalidNormalizationInput(value));
    }
    if value.is_infinite() {
        return Ok(1.0);
    }
    Ok((value / (1.0 + value)).min(1.0 - f64::EPSILON / 2.0))
}
