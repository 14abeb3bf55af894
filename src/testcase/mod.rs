//! Generated tests as candidates.
//!
//! A [`TestChromosome`] wraps one [`TestArtifact`] and caches the outcome of
//! its last execution; a [`TestSuiteChromosome`] evolves an ordered list of
//! them. [`GoalObjective`]s score single tests against coverage goals and
//! memoize proven goals on the artifact; [`SuiteCoverageObjective`] scores
//! whole suites by the goals they leave uncovered.

mod artifact;
mod chromosome;
mod execution;
mod goal;
mod suite;

pub use artifact::{CoveredGoals, TestArtifact};
pub use chromosome::TestChromosome;
pub use execution::{ExecutableCandidate, Executor, OutcomeCache, OutcomeOf};
pub use goal::{GoalObjective, sort_goals};
pub use suite::{SuiteCoverageObjective, SuiteObjective, TestSuiteChromosome};
