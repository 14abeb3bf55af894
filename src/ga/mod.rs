//! Candidate and fitness core of the search.
//!
//! # Overview
//!
//! - **Candidates** (`candidate`): per-objective bookkeeping in
//!   [`CandidateState`] and the self-typed [`Candidate`] trait
//! - **Objectives** (`objective`): pluggable scoring, [`normalize`] and the
//!   [`ArchiveObjective`] capability
//! - **Archive** (`archive`): bounded store of best-known candidates
//! - **Engine** (`engine`): generation driver with parallel evaluation
//!
//! # Example
//!
//! ```rust,ignore
//! use testgen_evolution::ga::{Candidate, EvolutionEngine, Objective};
//! use testgen_evolution::schema::EvolutionConfig;
//!
//! let mut engine = EvolutionEngine::new(EvolutionConfig::default(), objectives)?;
//! engine.seed_population(initial);
//! let result = engine.run_with_callback(|progress| {
//!     println!("Generation {}: best fitness = {:.3}",
//!         progress.generation, progress.best_fitness);
//! });
//! ```
//!
//! # Fitness conventions
//!
//! - Aggregate fitness is the raw sum over objectives; lower ranks first.
//! - A minimizing objective registers with [`MINIMIZING_DEFAULT`], a
//!   maximizing one with `0`.
//! - Non-finite fitness values are rejected with
//!   [`FitnessError::InvalidFitnessValue`] and leave the candidate untouched.

mod archive;
mod candidate;
mod engine;
mod error;
mod objective;
mod rng;
mod table;

pub use archive::CandidateArchive;
pub use candidate::{
    Candidate, CandidateState, Freshness, MINIMIZING_DEFAULT, NOT_COVERED_UNKNOWN,
};
pub use engine::EvolutionEngine;
pub use error::{ConstructionFailed, FitnessError};
pub use objective::{ArchiveObjective, Objective, normalize};
pub use rng::EngineRng;
pub use table::ObjectiveTable;

pub use crate::schema::{ConfigError, ObjectiveId};
