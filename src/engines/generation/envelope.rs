use crate::engines::generation::operators::{mutate_genes, single_point_crossover};
use crate::error::{EvotuneError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Breakpoints per evolved envelope
pub const ENVELOPE_POINTS: usize = 3;

/// Largest mutation step as a share of the value range
const MUTATION_SPAN: f64 = 0.25;

/// Value range of an envelope. `start` may exceed `end` for falling
/// sections such as an outro; values are drawn between the two either way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeRange {
    pub start: f64,
    pub end: f64,
}

impl EnvelopeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn low(&self) -> f64 {
        self.start.min(self.end)
    }

    pub fn high(&self) -> f64 {
        self.start.max(self.end)
    }

    pub fn span(&self) -> f64 {
        self.high() - self.low()
    }

    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.span() > 0.0 {
            rng.gen_range(self.low()..=self.high())
        } else {
            self.low()
        }
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.low(), self.high())
    }
}

/// One breakpoint: `time` is the position within the section, 0.0 - 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePoint {
    pub time: f64,
    pub value: f64,
}

/// Automation curve over one section, breakpoints evenly spaced in time.
/// Only the values evolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    points: Vec<EnvelopePoint>,
}

impl Envelope {
    /// Evenly spaced breakpoints holding `values`
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(EvotuneError::InvalidGenome(
                "envelope needs at least one point".to_string(),
            ));
        }
        let last = (values.len() - 1).max(1) as f64;
        Ok(Self {
            points: values
                .iter()
                .enumerate()
                .map(|(i, &value)| EnvelopePoint {
                    time: i as f64 / last,
                    value,
                })
                .collect(),
        })
    }

    pub fn random<R: Rng>(num_points: usize, range: EnvelopeRange, rng: &mut R) -> Result<Self> {
        let values: Vec<f64> = (0..num_points).map(|_| range.sample(rng)).collect();
        Self::from_values(&values)
    }

    /// Nudge each value with probability `mutation_rate` by up to a quarter
    /// of the range, clamped back into it
    pub fn mutate<R: Rng>(&self, mutation_rate: f64, range: EnvelopeRange, rng: &mut R) -> Self {
        let step = range.span() * MUTATION_SPAN;
        Self {
            points: mutate_genes(&self.points, mutation_rate, rng, |point, rng| {
                let shift = if step > 0.0 {
                    rng.gen_range(-step..=step)
                } else {
                    0.0
                };
                EnvelopePoint {
                    time: point.time,
                    value: range.clamp(point.value + shift),
                }
            }),
        }
    }

    pub fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        Self {
            points: single_point_crossover(&self.points, &other.points, rng),
        }
    }

    pub fn points(&self) -> &[EnvelopePoint] {
        &self.points
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    pub fn first(&self) -> Option<f64> {
        self.points.first().map(|p| p.value)
    }

    pub fn last(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }

    pub fn min(&self) -> Option<f64> {
        self.values().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values().reduce(f64::max)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.points.is_empty() {
            None
        } else {
            Some(self.values().sum::<f64>() / self.points.len() as f64)
        }
    }

    /// Steepest change per unit of section time
    pub fn max_rate(&self) -> f64 {
        self.points
            .windows(2)
            .filter(|pair| pair[1].time > pair[0].time)
            .map(|pair| (pair[1].value - pair[0].value).abs() / (pair[1].time - pair[0].time))
            .fold(0.0, f64::max)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values().map(|v| format!("{:.2}", v)).collect();
        f.write_str(&parts.join(" -> "))
    }
}
