//! Generation driver: parallel evaluation, archive pass, variation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::schema::{
    CandidateSnapshot, ConfigError, EvolutionConfig, EvolutionHistory, EvolutionPhase,
    EvolutionProgress, EvolutionResult, EvolutionStats, StopReason,
};

use super::candidate::Candidate;
use super::error::FitnessError;
use super::objective::Objective;
use super::rng::EngineRng;

/// Evolves a population of candidates against a set of objectives.
///
/// Candidates are ordered with [`Candidate::compare`], so lower aggregate
/// fitness is better. Parents are drawn uniformly from the better half of the
/// sorted population.
pub struct EvolutionEngine<C: Candidate> {
    config: EvolutionConfig,
    rng: EngineRng,
    objectives: Vec<Box<dyn Objective<C>>>,
    population: Vec<C>,
    /// Per-candidate "needs a full evaluation" marks, parallel to
    /// `population`. Objectives clear a candidate's own changed flag as they
    /// score it, so a child scored by local search for one objective would
    /// otherwise look evaluated for all of them.
    stale: Vec<bool>,
    history: EvolutionHistory,
    generation: usize,
    best_fitness: f64,
    stagnation_count: usize,
    evaluations: u64,
    cancelled: Arc<AtomicBool>,
}

impl<C: Candidate> EvolutionEngine<C> {
    /// Create a new engine. Fails on an invalid configuration or when no
    /// objective is given.
    pub fn new(
        config: EvolutionConfig,
        objectives: Vec<Box<dyn Objective<C>>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if objectives.is_empty() {
            return Err(ConfigError::NoObjectives);
        }
        let seed = config.random_seed.unwrap_or_else(rand::random);

        Ok(Self {
            config,
            rng: EngineRng::new(seed),
            objectives,
            population: Vec::new(),
            stale: Vec::new(),
            history: EvolutionHistory::default(),
            generation: 0,
            best_fitness: f64::INFINITY,
            stagnation_count: 0,
            evaluations: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn objectives(&self) -> &[Box<dyn Objective<C>>] {
        &self.objectives
    }

    pub fn population(&self) -> &[C] {
        &self.population
    }

    /// Best candidate of the last evaluated generation.
    pub fn best(&self) -> Option<&C> {
        self.population.first()
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Replace the population and register every objective on it.
    pub fn seed_population(&mut self, candidates: Vec<C>) {
        self.stale = vec![true; candidates.len()];
        self.population = candidates;
        self.generation = 0;
        for candidate in &mut self.population {
            for objective in &self.objectives {
                candidate.add_fitness(objective.as_ref());
            }
        }
    }

    /// Evaluate every changed candidate against every objective, in
    /// parallel. Returns the number of objective evaluations performed.
    ///
    /// A candidate is committed only when every objective scored it; on
    /// failure its state is rolled back to what it was before the pass.
    pub fn evaluate_population(&mut self) -> Result<u64, FitnessError> {
        let objectives = &self.objectives;
        self.stale.resize(self.population.len(), true);
        let counts: Vec<u64> = self
            .population
            .par_iter_mut()
            .zip(self.stale.par_iter_mut())
            .map(|(candidate, stale)| -> Result<u64, FitnessError> {
                if !*stale && !candidate.is_changed() {
                    return Ok(0);
                }
                let saved = candidate.state().clone();
                for objective in objectives {
                    if let Err(err) = objective.fitness(candidate) {
                        *candidate.state_mut() = saved;
                        return Err(err);
                    }
                }
                candidate.set_changed(false);
                *stale = false;
                Ok(objectives.len() as u64)
            })
            .collect::<Result<_, _>>()?;

        let total = counts.iter().sum();
        self.evaluations += total;
        Ok(total)
    }

    /// One serialized pass over the objectives that keep archives.
    pub fn update_archives(&mut self) -> bool {
        let mut updated = false;
        for objective in self.objectives.iter_mut() {
            if let Some(archive) = objective.as_archive_mut() {
                if archive.update_archive(&mut self.population) {
                    debug!("Archive of {} updated", archive.id());
                    updated = true;
                }
            }
        }
        updated
    }

    /// Evolve one generation.
    pub fn step(&mut self) -> Result<(), FitnessError> {
        if self.population.iter().any(|c| c.is_changed()) {
            self.evaluate_generation()?;
        }
        self.reproduce();
        self.generation += 1;
        self.evaluate_generation()
    }

    fn evaluate_generation(&mut self) -> Result<(), FitnessError> {
        self.evaluate_population()?;
        self.update_archives();
        // Every mark is clear after a full pass, so sorting keeps them aligned.
        self.population.sort_by(|a, b| a.compare(b));
        self.record_statistics();
        Ok(())
    }

    fn record_statistics(&mut self) {
        let Some(best) = self.population.first() else {
            return;
        };
        let gen_best = best.fitness();
        if gen_best < self.best_fitness {
            self.best_fitness = gen_best;
            self.stagnation_count = 0;
        } else {
            self.stagnation_count += 1;
        }

        let n = self.population.len() as f64;
        let avg_fitness = self.population.iter().map(|c| c.fitness()).sum::<f64>() / n;
        let variance = self
            .population
            .iter()
            .map(|c| (c.fitness() - avg_fitness).powi(2))
            .sum::<f64>()
            / n;
        let avg_size = self.population.iter().map(|c| c.size() as f64).sum::<f64>() / n;

        self.history.best_fitness.push(gen_best);
        self.history.avg_fitness.push(avg_fitness);
        self.history.fitness_std.push(variance.sqrt());
        self.history.avg_size.push(avg_size);

        info!(
            "Generation {}: best {:.4}, avg {:.4}, avg size {:.1}, stagnation {}",
            self.generation, gen_best, avg_fitness, avg_size, self.stagnation_count
        );
    }

    /// Build the next generation from the sorted current one.
    fn reproduce(&mut self) {
        if self.population.is_empty() {
            return;
        }
        let genetic = self.config.genetic.clone();
        let size = self.config.population.size;
        let parents = (self.population.len() / 2).max(1);
        let mut next_gen = Vec::with_capacity(size);
        let mut next_stale = Vec::with_capacity(size);

        // Elitism: keep best individuals
        for elite in self.population.iter().take(genetic.elitism) {
            next_gen.push(elite.clone());
            next_stale.push(false);
        }

        while next_gen.len() < size {
            let parent1 = &self.population[self.rng.index(parents)];
            let parent2 = &self.population[self.rng.index(parents)];
            let mut child = parent1.clone();

            if self.rng.chance(genetic.crossover_rate) {
                let mut crossed = false;
                for attempt in 1..=genetic.crossover_attempts {
                    let position1 = self.rng.cut_point(child.size());
                    let position2 = self.rng.cut_point(parent2.size());
                    match child.crossover(parent2, position1, position2) {
                        Ok(()) => {
                            crossed = true;
                            break;
                        }
                        Err(err) => {
                            debug!("Crossover attempt {} failed: {}", attempt, err);
                            child = parent1.clone();
                        }
                    }
                }
                if !crossed {
                    debug!("Crossover gave up, copying parent");
                }
            }

            if self.rng.chance(genetic.mutation_rate) {
                child.mutate(&mut self.rng);
            }

            // Captured before local search, which scores (and so clears)
            // the child for a single objective.
            let mut stale = child.is_changed();
            if self.rng.chance(genetic.local_search_rate) {
                for objective in &self.objectives {
                    if child.has_local_search_been_applied() {
                        break;
                    }
                    stale |= child.local_search(objective.as_ref());
                }
            }

            child.state_mut().update_age(self.generation + 1);
            next_gen.push(child);
            next_stale.push(stale);
        }

        self.population = next_gen;
        self.stale = next_stale;
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        let avg_fitness = if self.population.is_empty() {
            0.0
        } else {
            self.population.iter().map(|c| c.fitness()).sum::<f64>() / self.population.len() as f64
        };
        let generation_best = self
            .population
            .first()
            .map(|c| c.fitness())
            .unwrap_or(f64::INFINITY);
        let top_candidates: Vec<CandidateSnapshot> =
            self.population.iter().take(5).map(|c| c.snapshot()).collect();

        let phase = if self.cancelled.load(Ordering::Relaxed) {
            EvolutionPhase::Stopped
        } else if self.history.best_fitness.is_empty() {
            EvolutionPhase::Initializing
        } else if self.should_stop().is_some() {
            EvolutionPhase::Complete
        } else {
            EvolutionPhase::Evaluating
        };

        EvolutionProgress {
            generation: self.generation,
            total_generations: self.config.population.max_generations,
            best_fitness: self.best_fitness,
            avg_fitness,
            generation_best,
            stagnation_count: self.stagnation_count,
            best_candidate: self.best().map(|c| c.snapshot()),
            top_candidates,
            history: self.history.clone(),
            phase,
        }
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if self.generation >= self.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        if let Some(target) = self.config.population.target_fitness
            && self.best_fitness <= target
        {
            return Some(StopReason::TargetReached);
        }

        if let Some(limit) = self.config.population.stagnation_limit
            && self.stagnation_count >= limit
        {
            return Some(StopReason::Stagnation);
        }

        None
    }

    /// Run evolution on the seeded population with progress callback.
    pub fn run_with_callback<F>(&mut self, callback: F) -> EvolutionResult
    where
        F: Fn(&EvolutionProgress),
    {
        let start_time = std::time::Instant::now();
        callback(&self.progress());

        let stop_reason = match self.evaluate_generation() {
            Err(err) => {
                warn!("Evaluation of the initial population failed: {}", err);
                StopReason::Error(err.to_string())
            }
            Ok(()) => {
                callback(&self.progress());
                loop {
                    if let Some(reason) = self.should_stop() {
                        break reason;
                    }
                    if let Err(err) = self.step() {
                        warn!("Generation {} aborted: {}", self.generation, err);
                        break StopReason::Error(err.to_string());
                    }
                    callback(&self.progress());
                }
            }
        };

        let elapsed = start_time.elapsed().as_secs_f64();
        let final_avg_fitness = if self.population.is_empty() {
            0.0
        } else {
            self.population.iter().map(|c| c.fitness()).sum::<f64>() / self.population.len() as f64
        };
        info!(
            "Search stopped after {} generations: {:?}",
            self.generation, stop_reason
        );

        EvolutionResult {
            best: self.best().map(|c| c.snapshot()),
            stats: EvolutionStats {
                generations: self.generation,
                total_evaluations: self.evaluations,
                best_fitness: self.best_fitness,
                final_avg_fitness,
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    self.evaluations as f64 / elapsed
                } else {
                    0.0
                },
                stop_reason,
            },
            history: self.history.clone(),
        }
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> EvolutionResult {
        self.run_with_callback(|_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{BitString, ConstantObjective, Probe, ReachSum, SumExecutor, ZerosObjective};
    use crate::schema::{GeneticAlgorithmConfig, PopulationConfig};
    use crate::ga::MINIMIZING_DEFAULT;
    use crate::testcase::{GoalObjective, SuiteCoverageObjective, TestChromosome, TestSuiteChromosome};
    use std::sync::Mutex;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn config(size: usize, max_generations: usize) -> EvolutionConfig {
        EvolutionConfig {
            population: PopulationConfig {
                size,
                max_generations,
                ..Default::default()
            },
            random_seed: Some(7),
            ..Default::default()
        }
    }

    fn zeros_engine(config: EvolutionConfig, bits: usize) -> EvolutionEngine<BitString> {
        let size = config.population.size;
        let mut engine =
            EvolutionEngine::<BitString>::new(config, vec![Box::new(ZerosObjective::new())])
                .unwrap();
        engine.seed_population((0..size).map(|_| BitString::new(vec![false; bits])).collect());
        engine
    }

    #[test]
    fn test_engine_rejects_bad_setup() {
        let mut bad = config(10, 5);
        bad.population.size = 1;
        assert!(EvolutionEngine::<BitString>::new(bad, vec![Box::new(ZerosObjective::new())]).is_err());
        assert!(matches!(
            EvolutionEngine::<BitString>::new(config(10, 5), Vec::new()),
            Err(ConfigError::NoObjectives)
        ));
    }

    #[test]
    fn test_seed_registers_objectives() {
        let engine = zeros_engine(config(4, 1), 3);
        let id = engine.objectives()[0].id().clone();
        for candidate in engine.population() {
            assert!(candidate.state().is_registered(&id));
        }
    }

    #[test]
    fn test_run_reaches_target() {
        init_logger();
        let mut config = config(10, 500);
        config.genetic.mutation_rate = 1.0;
        config.population.target_fitness = Some(0.0);
        let mut engine = zeros_engine(config, 4);

        let result = engine.run();
        assert_eq!(result.stats.stop_reason, StopReason::TargetReached);
        assert_eq!(result.best.unwrap().fitness, 0.0);
        assert_eq!(result.history.best_fitness.last(), Some(&0.0));
    }

    #[test]
    fn test_run_max_generations() {
        let mut engine = zeros_engine(config(6, 3), 5);
        let result = engine.run();
        assert_eq!(result.stats.generations, 3);
        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(result.history.best_fitness.len(), 4);
        assert_eq!(engine.population().len(), 6);
    }

    #[test]
    fn test_history_best_never_worse_with_elitism() {
        let mut engine = zeros_engine(config(8, 20), 6);
        let result = engine.run();
        let best = &result.history.best_fitness;
        assert!(best.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_cancellation() {
        let mut engine = zeros_engine(config(5, 100), 4);
        let cancel = engine.cancel_handle();

        // Cancel immediately
        cancel.store(true, Ordering::Relaxed);

        let result = engine.run();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 0);
        assert_eq!(engine.progress().phase, EvolutionPhase::Stopped);
    }

    #[test]
    fn test_stagnation() {
        let mut config = config(4, 100);
        config.population.stagnation_limit = Some(2);
        let mut engine = EvolutionEngine::<BitString>::new(
            config,
            vec![Box::new(ConstantObjective::minimizing("flat", 1.0))],
        )
        .unwrap();
        engine.seed_population(vec![BitString::new(vec![true; 3]); 4]);

        let result = engine.run();
        assert_eq!(result.stats.stop_reason, StopReason::Stagnation);
        assert_eq!(result.stats.generations, 2);
    }

    #[test]
    fn test_unchanged_candidates_are_not_reevaluated() {
        let mut config = config(4, 10);
        config.genetic = GeneticAlgorithmConfig {
            crossover_rate: 0.0,
            mutation_rate: 0.0,
            ..Default::default()
        };
        let mut engine = zeros_engine(config, 3);

        assert_eq!(engine.evaluate_population().unwrap(), 4);
        engine.step().unwrap();
        assert_eq!(engine.evaluate_population().unwrap(), 0);
        assert_eq!(engine.progress().generation, 1);
    }

    #[test]
    fn test_invalid_fitness_stops_run() {
        let mut engine = EvolutionEngine::<BitString>::new(
            config(4, 10),
            vec![Box::new(ConstantObjective::minimizing("nan", f64::NAN))],
        )
        .unwrap();
        engine.seed_population(vec![BitString::new(vec![true]); 4]);

        let result = engine.run();
        assert!(matches!(result.stats.stop_reason, StopReason::Error(_)));
    }

    #[test]
    fn test_failed_evaluation_rolls_back_candidate() {
        let zeros = ZerosObjective::new();
        let zeros_id = zeros.id().clone();
        let objectives: Vec<Box<dyn Objective<BitString>>> = vec![
            Box::new(zeros),
            Box::new(ConstantObjective::minimizing("nan", f64::NAN)),
        ];
        let mut engine = EvolutionEngine::new(config(4, 10), objectives).unwrap();
        engine.seed_population(vec![BitString::new(vec![true, false]); 4]);
        let before: Vec<u32> = engine
            .population()
            .iter()
            .map(|c| c.state().number_of_evaluations())
            .collect();

        assert!(engine.evaluate_population().is_err());
        for (candidate, evaluations) in engine.population().iter().zip(before) {
            assert_eq!(candidate.state().fitness_of(&zeros_id), Some(MINIMIZING_DEFAULT));
            assert_eq!(candidate.state().number_of_evaluations(), evaluations);
            assert!(candidate.is_changed());
        }
    }

    #[test]
    fn test_local_search_leaves_no_stale_objective() {
        init_logger();
        let executor = Arc::new(SumExecutor::new());
        let low = ReachSum::new(0, executor.clone());
        let high = ReachSum::new(100, executor.clone());
        let ids = [low.goal_id().clone(), high.goal_id().clone()];
        let objectives: Vec<Box<dyn Objective<TestChromosome<Probe>>>> =
            vec![Box::new(low), Box::new(high)];

        let mut config = config(10, 10);
        config.genetic = GeneticAlgorithmConfig {
            crossover_rate: 0.0,
            mutation_rate: 1.0,
            local_search_rate: 1.0,
            ..Default::default()
        };
        let mut engine = EvolutionEngine::new(config, objectives).unwrap();
        engine.seed_population(
            (0..10i64)
                .map(|i| TestChromosome::new(Probe::new(vec![1 - i % 3, i % 2])))
                .collect(),
        );
        engine.evaluate_population().unwrap();

        for _ in 0..3 {
            engine.step().unwrap();
            for candidate in engine.population() {
                assert!(!candidate.is_changed());
                let mut fresh = TestChromosome::new(candidate.test().clone());
                for (objective, id) in engine.objectives().iter().zip(&ids) {
                    let expected = objective.fitness(&mut fresh).unwrap();
                    assert_eq!(
                        candidate.state().fitness_of(id),
                        Some(expected),
                        "values {:?}: cached {} fitness is out of date",
                        candidate.test().values,
                        id
                    );
                }
            }
        }
    }

    #[test]
    fn test_progress_callback() {
        let seen = Mutex::new(Vec::new());
        let mut engine = zeros_engine(config(4, 2), 3);
        engine.run_with_callback(|progress| {
            seen.lock().unwrap().push((progress.generation, progress.phase.clone()))
        });
        let seen = seen.into_inner().unwrap();
        let generations: Vec<usize> = seen.iter().map(|(g, _)| *g).collect();
        assert_eq!(generations, vec![0, 0, 1, 2]);
        assert_eq!(seen[0].1, EvolutionPhase::Initializing);
        assert_eq!(seen[1].1, EvolutionPhase::Evaluating);
        assert_eq!(seen[3].1, EvolutionPhase::Complete);
    }

    #[test]
    fn test_suite_search_fills_archive() {
        init_logger();
        let executor = Arc::new(SumExecutor::new());
        let goals: Vec<Arc<dyn GoalObjective<Probe>>> = (1..=3)
            .map(|t| Arc::new(ReachSum::new(t, executor.clone())) as Arc<dyn GoalObjective<Probe>>)
            .collect();
        let objective = SuiteCoverageObjective::new("sums", goals, executor.clone(), 2);

        let mut config = config(6, 5);
        config.genetic.local_search_rate = 0.5;
        let mut engine =
            EvolutionEngine::<TestSuiteChromosome<Probe>>::new(config, vec![Box::new(objective)])
                .unwrap();
        engine.seed_population(
            (0..6)
                .map(|i| TestSuiteChromosome::from_tests(vec![Probe::new(vec![i]), Probe::new(vec![0, i])]))
                .collect(),
        );

        let result = engine.run();
        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        let archive = engine.objectives()[0].as_archive().unwrap();
        let best = archive.best_stored_candidate().unwrap();
        assert!(best.state().fitness() <= 2.0);
        assert!(executor.runs() > 0);
    }
}
