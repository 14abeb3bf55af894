//! Testgen Evolution - candidate and fitness core for search-based test
//! generation.
//!
//! This crate defines what a candidate solution is, how it is scored against
//! one or more objectives, and how evaluation results are cached, compared
//! and reused across generations of a genetic search.
//!
//! # Architecture
//!
//! The crate is split into three main modules:
//!
//! - `ga`: Candidates, objectives, archives and the generation driver
//! - `testcase`: Executable test candidates, goal coverage and suites
//! - `schema`: Configuration, objective identities and reporting types
//!
//! # Example
//!
//! ```rust,ignore
//! use testgen_evolution::{
//!     ga::EvolutionEngine,
//!     schema::EvolutionConfig,
//!     testcase::{SuiteCoverageObjective, TestSuiteChromosome},
//! };
//!
//! // `goals` score single tests, `executor` runs them in a sandbox.
//! let objective = SuiteCoverageObjective::new("branches", goals, executor, 1);
//! let mut engine = EvolutionEngine::new(EvolutionConfig::default(), vec![Box::new(objective)])?;
//! engine.seed_population(initial_suites);
//!
//! let result = engine.run();
//! println!("Uncovered goals: {}", result.stats.best_fitness);
//! ```

pub mod ga;
pub mod schema;
pub mod testcase;

#[cfg(test)]
mod fixtures;

// Re-export commonly used types
pub use ga::{Candidate, CandidateState, EvolutionEngine, FitnessError, Objective};
pub use schema::{EvolutionConfig, ObjectiveId};
pub use testcase::{GoalObjective, TestArtifact, TestChromosome, TestSuiteChromosome};
