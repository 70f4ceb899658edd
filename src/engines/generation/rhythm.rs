use crate::engines::generation::operators::{crossover_at, mutate_genes, single_point_crossover};
use crate::error::{EvotuneError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest subdivision a single beat digit can hold
pub const MAX_SUBDIVISION_LIMIT: u8 = 9;

/// Per-beat subdivision counts. `0` rests for the beat, `k` splits it into
/// `k` equal notes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rhythm(Vec<u8>);

impl Rhythm {
    pub fn new(digits: Vec<u8>) -> Result<Self> {
        if let Some(bad) = digits.iter().find(|d| **d > MAX_SUBDIVISION_LIMIT) {
            return Err(EvotuneError::InvalidGenome(format!(
                "rhythm digit {} exceeds {}",
                bad, MAX_SUBDIVISION_LIMIT
            )));
        }
        Ok(Self(digits))
    }

    /// Uniform random digit in `[0, max_subdivision]` for every beat
    pub fn random<R: Rng>(total_beats: usize, max_subdivision: u8, rng: &mut R) -> Result<Self> {
        if total_beats == 0 {
            return Err(EvotuneError::Configuration(
                "rhythm needs at least one beat".to_string(),
            ));
        }
        if max_subdivision > MAX_SUBDIVISION_LIMIT {
            return Err(EvotuneError::Configuration(format!(
                "max subdivision {} exceeds {}",
                max_subdivision, MAX_SUBDIVISION_LIMIT
            )));
        }

        Ok(Self(
            (0..total_beats)
                .map(|_| rng.gen_range(0..=max_subdivision))
                .collect(),
        ))
    }

    /// Re-roll each beat independently with probability `mutation_rate`
    pub fn mutate<R: Rng>(&self, mutation_rate: f64, max_subdivision: u8, rng: &mut R) -> Self {
        let max = max_subdivision.min(MAX_SUBDIVISION_LIMIT);
        Self(mutate_genes(&self.0, mutation_rate, rng, |_, rng| {
            rng.gen_range(0..=max)
        }))
    }

    pub fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        Self(single_point_crossover(&self.0, &other.0, rng))
    }

    pub fn crossover_at(&self, other: &Self, point: usize) -> Self {
        Self(crossover_at(&self.0, &other.0, point))
    }

    pub fn beats(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of sounding notes the rhythm implies
    pub fn note_count(&self) -> usize {
        self.0.iter().map(|d| *d as usize).sum()
    }

    pub fn active_beats(&self) -> usize {
        self.0.iter().filter(|d| **d != 0).count()
    }

    /// Average subdivision per beat divided by `normalizer`, capped at 1.0
    pub fn density(&self, normalizer: f64) -> f64 {
        if self.0.is_empty() || normalizer <= 0.0 {
            return 0.0;
        }
        (self.note_count() as f64 / (self.0.len() as f64 * normalizer)).min(1.0)
    }
}

impl fmt::Display for Rhythm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for digit in &self.0 {
            write!(f, "{}", digit)?;
        }
        Ok(())
    }
}

impl FromStr for Rhythm {
    type Err = EvotuneError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .chars()
            .map(|c| {
                c.to_digit(10).map(|d| d as u8).ok_or_else(|| {
                    EvotuneError::InvalidGenome(format!("'{}' is not a rhythm digit", c))
                })
            })
            .collect::<Result<Vec<u8>>>()?;
        Self::new(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_respects_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let rhythm = Rhythm::random(16, 3, &mut rng).unwrap();
        assert_eq!(rhythm.len(), 16);
        assert!(rhythm.beats().iter().all(|d| *d <= 3));
    }

    #[test]
    fn test_random_rejects_zero_beats() {
        let mut rng = StdRng::seed_from_u64(11);
        assert!(matches!(
            Rhythm::random(0, 2, &mut rng),
            Err(EvotuneError::Configuration(_))
        ));
    }

    #[test]
    fn test_mutation_preserves_length() {
        let mut rng = StdRng::seed_from_u64(5);
        let rhythm: Rhythm = "20131021".parse().unwrap();
        let mutated = rhythm.mutate(1.0, 4, &mut rng);
        assert_eq!(mutated.len(), 8);
        assert!(mutated.beats().iter().all(|d| *d <= 4));
    }

    #[test]
    fn test_parse_and_display() {
        let rhythm: Rhythm = "2103".parse().unwrap();
        assert_eq!(rhythm.note_count(), 6);
        assert_eq!(rhythm.active_beats(), 3);
        assert_eq!(rhythm.to_string(), "2103");
        assert!("21a3".parse::<Rhythm>().is_err());
    }

    #[test]
    fn test_density() {
        let rhythm: Rhythm = "4400".parse().unwrap();
        assert!((rhythm.density(4.0) - 0.5).abs() < 1e-9);
    }
}
