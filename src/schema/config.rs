//! Configuration of an evolution run.

use serde::{Deserialize, Serialize};

/// Top-level evolution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Population and stopping criteria.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Variation operators.
    #[serde(default)]
    pub genetic: GeneticAlgorithmConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Population size and stopping criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of candidates per generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Maximum number of generations.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Stop once the best aggregate fitness is at or below this value.
    #[serde(default)]
    pub target_fitness: Option<f64>,
    /// Stop after this many generations without improvement.
    #[serde(default)]
    pub stagnation_limit: Option<usize>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_generations: default_max_generations(),
            target_fitness: None,
            stagnation_limit: None,
        }
    }
}

fn default_population_size() -> usize {
    50
}
fn default_max_generations() -> usize {
    100
}

/// Genetic operator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticAlgorithmConfig {
    /// Crossover probability (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Probability that an offspring is mutated (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Probability that an offspring gets local search (0.0-1.0).
    #[serde(default)]
    pub local_search_rate: f64,
    /// Number of best candidates carried over unchanged.
    #[serde(default = "default_elitism")]
    pub elitism: usize,
    /// Crossover retries on construction failure before falling back to a
    /// plain copy of the first parent.
    #[serde(default = "default_crossover_attempts")]
    pub crossover_attempts: usize,
}

impl Default for GeneticAlgorithmConfig {
    fn default() -> Self {
        Self {
            crossover_rate: default_crossover_rate(),
            mutation_rate: default_mutation_rate(),
            local_search_rate: 0.0,
            elitism: default_elitism(),
            crossover_attempts: default_crossover_attempts(),
        }
    }
}

fn default_crossover_rate() -> f64 {
    0.75
}
fn default_mutation_rate() -> f64 {
    0.8
}
fn default_elitism() -> usize {
    1
}
fn default_crossover_attempts() -> usize {
    3
}

impl EvolutionConfig {
    /// Parse a JSON configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population.size < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if self.genetic.elitism >= self.population.size {
            return Err(ConfigError::ElitismTooLarge {
                elitism: self.genetic.elitism,
                size: self.population.size,
            });
        }
        for (name, rate) in [
            ("crossover_rate", self.genetic.crossover_rate),
            ("mutation_rate", self.genetic.mutation_rate),
            ("local_search_rate", self.genetic.local_search_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::InvalidRate { name, rate });
            }
        }
        if self.genetic.crossover_attempts == 0 {
            return Err(ConfigError::NoCrossoverAttempts);
        }
        if let Some(target) = self.population.target_fitness
            && !target.is_finite()
        {
            return Err(ConfigError::InvalidTargetFitness(target));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Elitism {elitism} must be smaller than population size {size}")]
    ElitismTooLarge { elitism: usize, size: usize },
    #[error("Rate {name} must be within [0, 1], got {rate}")]
    InvalidRate { name: &'static str, rate: f64 },
    #[error("At least one crossover attempt is required")]
    NoCrossoverAttempts,
    #[error("Target fitness must be finite, got {0}")]
    InvalidTargetFitness(f64),
    #[error("At least one objective is required")]
    NoObjectives,
    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
