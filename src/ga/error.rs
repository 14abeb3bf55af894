//! Error types for candidate bookkeeping and genetic operators.

use super::ObjectiveId;

/// Contract violations raised while recording or normalizing fitness.
///
/// These signal a bug in the scoring logic of an objective, not a transient
/// condition; callers should not retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitnessError {
    #[error("Invalid value of fitness: {value}, objective: {objective}")]
    InvalidFitnessValue { objective: ObjectiveId, value: f64 },
    #[error("Values to normalize cannot be negative: {0}")]
    InvalidNormalizationInput(f64),
    #[error("Invalid coverage value {value} for objective {objective}, expected value in [0, 1]")]
    InvalidCoverage { objective: ObjectiveId, value: f64 },
}

/// Raised by crossover when the requested cut points cannot produce a valid
/// candidate. Recoverable: pick other parents or points and retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Construction failed: {reason}")]
pub struct ConstructionFailed {
    pub reason: String,
}

impl ConstructionFailed {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
