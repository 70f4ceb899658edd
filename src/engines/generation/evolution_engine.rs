use crate::engines::generation::{
    genome::{Individual, Population},
    operators::tournament_selection,
};
use crate::error::{EvotuneError, Result};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// When a run stops. Chosen once per run and never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StoppingRule {
    /// Run exactly this many generations
    FixedGenerations(usize),
    /// Stop at the first generation whose best fitness reaches the threshold,
    /// or after `max_generations`
    Threshold {
        fitness_threshold: f64,
        max_generations: usize,
    },
}

impl StoppingRule {
    pub fn max_generations(&self) -> usize {
        match *self {
            StoppingRule::FixedGenerations(n) => n,
            StoppingRule::Threshold { max_generations, .. } => max_generations,
        }
    }

    pub fn is_satisfied_by(&self, best_fitness: f64) -> bool {
        match *self {
            StoppingRule::FixedGenerations(_) => false,
            StoppingRule::Threshold {
                fitness_threshold, ..
            } => best_fitness >= fitness_threshold,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            StoppingRule::FixedGenerations(0) => Err(EvotuneError::Configuration(
                "generation count must be at least 1".to_string(),
            )),
            StoppingRule::Threshold { max_generations: 0, .. } => Err(EvotuneError::Configuration(
                "max generations must be at least 1".to_string(),
            )),
            StoppingRule::Threshold {
                fitness_threshold, ..
            } if !fitness_threshold.is_finite() || fitness_threshold <= 0.0 => {
                Err(EvotuneError::Configuration(format!(
                    "fitness threshold must be positive, got {}",
                    fitness_threshold
                )))
            }
            _ => Ok(()),
        }
    }
}

pub trait ProgressCallback {
    /// Called before a layer phase starts its run
    fn on_phase_start(&mut self, _layer: &str, _phase: &str) {}
    fn on_generation_start(&mut self, generation: usize);
    fn on_generation_complete(&mut self, generation: usize, best_fitness: f64);
    fn on_threshold_reached(&mut self, generation: usize, best_fitness: f64);
}

/// Result of a full run
#[derive(Debug, Clone)]
pub struct EvolutionOutcome<T> {
    /// Top individual of the last evaluated generation
    pub best: Individual<T>,
    /// Number of generations evaluated
    pub generations_run: usize,
    pub reached_threshold: bool,
}

/// Generic selection / elitism / crossover / mutation loop
#[derive(Debug, Clone)]
pub struct GeneticEngine {
    population_size: usize,
    mutation_rate: f64,
    elitism_count: usize,
}

impl GeneticEngine {
    pub fn new(population_size: usize, mutation_rate: f64, elitism_count: usize) -> Result<Self> {
        if population_size == 0 {
            return Err(EvotuneError::Configuration(
                "population size must be at least 1".to_string(),
            ));
        }
        if elitism_count > population_size {
            return Err(EvotuneError::Configuration(format!(
                "elitism count {} exceeds population size {}",
                elitism_count, population_size
            )));
        }
        if !(0.0..=1.0).contains(&mutation_rate) {
            return Err(EvotuneError::Configuration(format!(
                "mutation rate must be between 0 and 1, got {}",
                mutation_rate
            )));
        }

        Ok(Self {
            population_size,
            mutation_rate,
            elitism_count,
        })
    }

    pub fn population_size(&self) -> usize {
        self.population_size
    }

    pub fn mutation_rate(&self) -> f64 {
        self.mutation_rate
    }

    pub fn elitism_count(&self) -> usize {
        self.elitism_count
    }

    /// Build an initial population from a genome factory
    pub fn initialize<T, R, F>(&self, rng: &mut R, mut factory: F) -> Result<Population<T>>
    where
        R: Rng,
        F: FnMut(&mut R) -> Result<T>,
    {
        (0..self.population_size)
            .map(|_| factory(rng).map(Individual::new))
            .collect()
    }

    /// Recompute every fitness and sort descending. Equal fitness keeps the
    /// previous relative order.
    pub fn evaluate<T, F>(&self, mut population: Population<T>, mut fitness_fn: F) -> Result<Population<T>>
    where
        F: FnMut(&T) -> f64,
    {
        if population.is_empty() {
            return Err(EvotuneError::Configuration(
                "cannot evaluate an empty population".to_string(),
            ));
        }

        for individual in population.iter_mut() {
            individual.fitness = fitness_fn(&individual.genome);
        }

        population.sort_by(|a, b| {
            b.fitness
                .partial_cmp(&a.fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(population)
    }

    /// Produce the next generation from an evaluated, sorted population
    pub fn breed<T, R, M, C>(
        &self,
        evaluated: &[Individual<T>],
        rng: &mut R,
        mut mutate_fn: M,
        mut crossover_fn: C,
    ) -> Result<Population<T>>
    where
        T: Clone,
        R: Rng,
        M: FnMut(&T, &mut R) -> T,
        C: FnMut(&T, &T, &mut R) -> T,
    {
        if evaluated.is_empty() {
            return Err(EvotuneError::Configuration(
                "cannot breed from an empty population".to_string(),
            ));
        }
        if self.elitism_count > evaluated.len() {
            return Err(EvotuneError::Configuration(format!(
                "elitism count {} exceeds population of {}",
                self.elitism_count,
                evaluated.len()
            )));
        }

        let mut next_generation: Population<T> = Vec::with_capacity(self.population_size);

        // Elitism: copy top performers with their fitness
        next_generation.extend(evaluated.iter().take(self.elitism_count).cloned());

        while next_generation.len() < self.population_size {
            let parent1 = tournament_selection(evaluated, rng);
            let parent2 = tournament_selection(evaluated, rng);

            let mut child = crossover_fn(&parent1.genome, &parent2.genome, rng);
            if rng.gen::<f64>() < self.mutation_rate {
                child = mutate_fn(&child, rng);
            }

            next_generation.push(Individual::new(child));
        }

        Ok(next_generation)
    }

    /// One generation: evaluate, then breed
    pub fn evolve<T, R, F, M, C>(
        &self,
        population: Population<T>,
        fitness_fn: F,
        mutate_fn: M,
        crossover_fn: C,
        rng: &mut R,
    ) -> Result<Population<T>>
    where
        T: Clone,
        R: Rng,
        F: FnMut(&T) -> f64,
        M: FnMut(&T, &mut R) -> T,
        C: FnMut(&T, &T, &mut R) -> T,
    {
        let evaluated = self.evaluate(population, fitness_fn)?;
        self.breed(&evaluated, rng, mutate_fn, crossover_fn)
    }

    /// Run generations until the stopping rule fires
    #[allow(clippy::too_many_arguments)]
    pub fn run<T, R, F, M, C, P>(
        &self,
        initial: Population<T>,
        rule: StoppingRule,
        mut fitness_fn: F,
        mut mutate_fn: M,
        mut crossover_fn: C,
        rng: &mut R,
        progress: &mut P,
    ) -> Result<EvolutionOutcome<T>>
    where
        T: Clone,
        R: Rng,
        F: FnMut(&T) -> f64,
        M: FnMut(&T, &mut R) -> T,
        C: FnMut(&T, &T, &mut R) -> T,
        P: ProgressCallback + ?Sized,
    {
        rule.validate()?;
        let max_generations = rule.max_generations();
        let mut population = initial;

        for generation in 0..max_generations {
            progress.on_generation_start(generation);

            let evaluated = self.evaluate(population, &mut fitness_fn)?;
            let best = evaluated[0].clone();
            progress.on_generation_complete(generation, best.fitness);

            if rule.is_satisfied_by(best.fitness) {
                progress.on_threshold_reached(generation, best.fitness);
                return Ok(EvolutionOutcome {
                    best,
                    generations_run: generation + 1,
                    reached_threshold: true,
                });
            }

            if generation + 1 == max_generations {
                debug!(
                    "Finished {} generations, best fitness {:.4}",
                    max_generations, best.fitness
                );
                return Ok(EvolutionOutcome {
                    best,
                    generations_run: max_generations,
                    reached_threshold: false,
                });
            }

            population = self.breed(&evaluated, rng, &mut mutate_fn, &mut crossover_fn)?;
        }

        // validate() rules out a zero-generation run
        Err(EvotuneError::Configuration(
            "stopping rule allowed no generations".to_string(),
        ))
    }
}
