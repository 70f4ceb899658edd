use super::traits::ConfigSection;
use crate::engines::generation::StoppingRule;
use crate::error::{EvotuneError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub mutation_rate: f64,
    pub elitism_count: usize,
    pub rhythm_generations: usize,
    pub melody_generations: usize,
    pub chord_generations: usize,
    /// Generations for each gain and filter envelope of a song section
    pub dynamics_generations: usize,
    /// Switches every phase to threshold mode when set
    pub fitness_threshold: Option<f64>,
    /// Generation cap in threshold mode
    pub max_generations: usize,
    /// Fixed seed for reproducible runs; entropy when unset
    pub seed: Option<u64>,
}

/// The kinds of evolution a layer can go through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvolutionPhase {
    Rhythm,
    Melody,
    Chords,
    /// Gain and filter envelopes of a layer within one song section
    Dynamics,
}

impl EvolutionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            EvolutionPhase::Rhythm => "rhythm",
            EvolutionPhase::Melody => "melody",
            EvolutionPhase::Chords => "chords",
            EvolutionPhase::Dynamics => "dynamics",
        }
    }
}

impl fmt::Display for EvolutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            mutation_rate: 0.25,
            elitism_count: 6,
            rhythm_generations: 20,
            melody_generations: 30,
            chord_generations: 25,
            dynamics_generations: 15,
            fitness_threshold: None,
            max_generations: 100,
            seed: None,
        }
    }
}

impl EvolutionConfig {
    pub fn generations(&self, phase: EvolutionPhase) -> usize {
        match phase {
            EvolutionPhase::Rhythm => self.rhythm_generations,
            EvolutionPhase::Melody => self.melody_generations,
            EvolutionPhase::Chords => self.chord_generations,
            EvolutionPhase::Dynamics => self.dynamics_generations,
        }
    }

    /// Stopping rule for one phase. A threshold applies to every phase alike.
    pub fn stopping_rule(&self, phase: EvolutionPhase) -> StoppingRule {
        match self.fitness_threshold {
            Some(fitness_threshold) => StoppingRule::Threshold {
                fitness_threshold,
                max_generations: self.max_generations,
            },
            None => StoppingRule::FixedGenerations(self.generations(phase)),
        }
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(EvotuneError::Configuration(
                "Population size must be at least 1".to_string(),
            ));
        }
        if self.elitism_count > self.population_size {
            return Err(EvotuneError::Configuration(format!(
                "Elitism count {} exceeds population size {}",
                self.elitism_count, self.population_size
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(EvotuneError::Configuration(
                "Mutation rate must be between 0 and 1".to_string(),
            ));
        }
        for phase in [
            EvolutionPhase::Rhythm,
            EvolutionPhase::Melody,
            EvolutionPhase::Chords,
            EvolutionPhase::Dynamics,
        ] {
            self.stopping_rule(phase).validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EvolutionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_mode_selected_by_field() {
        let mut config = EvolutionConfig::default();
        assert_eq!(
            config.stopping_rule(EvolutionPhase::Melody),
            StoppingRule::FixedGenerations(30)
        );

        config.fitness_threshold = Some(0.9);
        config.max_generations = 40;
        assert_eq!(
            config.stopping_rule(EvolutionPhase::Rhythm),
            StoppingRule::Threshold {
                fitness_threshold: 0.9,
                max_generations: 40
            }
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = EvolutionConfig {
            population_size: 4,
            elitism_count: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EvolutionConfig {
            rhythm_generations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EvolutionConfig {
            dynamics_generations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EvolutionConfig {
            fitness_threshold: Some(-1.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
