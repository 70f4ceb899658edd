//! Section-aware scoring for evolved gain and filter envelopes.

use super::traits::EnvelopeFitness;
use crate::config::section::{SectionConfig, SectionKind};
use crate::engines::generation::{Envelope, EnvelopeRange};

/// Score for an envelope without points
const EMPTY_ENVELOPE_SCORE: f64 = 0.3;

/// Cutoff span (Hz) that counts as one unit of filter movement
const LPF_SPAN_HZ: f64 = 9000.0;

/// Rewards gain curves that sit in the section's range, move a little and
/// never jump
#[derive(Debug, Clone)]
pub struct GainEnvelopeFitness {
    pub expected: EnvelopeRange,
    pub smoothness_weight: f64,
    pub range_weight: f64,
    pub movement_weight: f64,
}

impl GainEnvelopeFitness {
    pub fn new(expected: EnvelopeRange) -> Self {
        Self {
            expected,
            smoothness_weight: 0.3,
            range_weight: 0.5,
            movement_weight: 0.2,
        }
    }

    pub fn for_section(section: &SectionConfig) -> Self {
        Self::new(section.gain_envelope_range())
    }

    fn smoothness(&self, envelope: &Envelope) -> f64 {
        if envelope.points().len() < 2 {
            return 0.8;
        }
        match envelope.max_rate() {
            r if r <= 0.5 => 1.0,
            r if r <= 1.0 => 0.8,
            r if r <= 2.0 => 0.5,
            _ => 0.2,
        }
    }

    fn range_fit(&self, envelope: &Envelope) -> f64 {
        let (Some(low), Some(high), Some(mean)) = (envelope.min(), envelope.max(), envelope.mean())
        else {
            return 0.5;
        };
        let centred = 1.0 - ((mean - self.expected.midpoint()).abs() * 2.0).min(1.0);
        let floor = if low >= self.expected.low() - 0.1 {
            0.5
        } else {
            (0.5 - (self.expected.low() - low)).max(0.0)
        };
        let ceiling = if high <= self.expected.high() + 0.1 {
            0.5
        } else {
            (0.5 - (high - self.expected.high())).max(0.0)
        };
        (centred + floor + ceiling) / 2.0
    }

    fn movement(&self, envelope: &Envelope) -> f64 {
        let (Some(low), Some(high)) = (envelope.min(), envelope.max()) else {
            return 0.4;
        };
        if envelope.points().len() < 2 {
            return 0.4;
        }
        let spread = high - low;
        if (0.1..=0.4).contains(&spread) {
            1.0
        } else if spread < 0.1 {
            0.5 + spread * 5.0
        } else {
            0.7
        }
    }
}

impl EnvelopeFitness for GainEnvelopeFitness {
    fn score(&self, envelope: &Envelope) -> f64 {
        if envelope.points().is_empty() {
            return EMPTY_ENVELOPE_SCORE;
        }
        self.smoothness_weight * self.smoothness(envelope)
            + self.range_weight * self.range_fit(envelope)
            + self.movement_weight * self.movement(envelope)
    }
}

/// Rewards filter curves in the section's range whose sweep suits the
/// section: opening into a chorus, closing into a breakdown
#[derive(Debug, Clone)]
pub struct FilterEnvelopeFitness {
    pub kind: SectionKind,
    pub expected: EnvelopeRange,
    pub smoothness_weight: f64,
    pub range_weight: f64,
    pub sweep_weight: f64,
}

impl FilterEnvelopeFitness {
    pub fn new(kind: SectionKind, expected: EnvelopeRange) -> Self {
        Self {
            kind,
            expected,
            smoothness_weight: 0.3,
            range_weight: 0.5,
            sweep_weight: 0.2,
        }
    }

    pub fn for_section(section: &SectionConfig) -> Self {
        Self::new(section.kind, section.lpf_envelope_range())
    }

    fn smoothness(&self, envelope: &Envelope) -> f64 {
        if envelope.points().len() < 2 {
            return 0.8;
        }
        match envelope.max_rate() / LPF_SPAN_HZ {
            r if r <= 0.5 => 1.0,
            r if r <= 1.0 => 0.7,
            _ => 0.4,
        }
    }

    fn range_fit(&self, envelope: &Envelope) -> f64 {
        let (Some(low), Some(high), Some(mean)) = (envelope.min(), envelope.max(), envelope.mean())
        else {
            return 0.5;
        };
        let placed = if (self.expected.low()..=self.expected.high()).contains(&mean) {
            1.0
        } else {
            let gap = (mean - self.expected.low())
                .abs()
                .min((mean - self.expected.high()).abs());
            (1.0 - gap / 5000.0).max(0.0)
        };
        let spread = high - low;
        let contained = if spread <= 5000.0 {
            0.5
        } else {
            (0.5 - (spread - 5000.0) / 10000.0).max(0.0)
        };
        (placed + contained) / 1.5
    }

    fn sweep(&self, envelope: &Envelope) -> f64 {
        let (Some(start), Some(end)) = (envelope.first(), envelope.last()) else {
            return 0.5;
        };
        if envelope.points().len() < 2 {
            return 0.5;
        }
        let direction = end - start;

        match self.kind {
            SectionKind::Buildup | SectionKind::Prechorus => {
                if direction > 1000.0 {
                    1.0
                } else if direction > 0.0 {
                    0.7
                } else {
                    0.3
                }
            }
            SectionKind::Breakdown | SectionKind::Outro => {
                if direction < -1000.0 {
                    1.0
                } else if direction < 0.0 {
                    0.7
                } else {
                    0.4
                }
            }
            SectionKind::Chorus | SectionKind::Drop => {
                if end > 6000.0 {
                    1.0
                } else if end > 4000.0 {
                    0.7
                } else {
                    0.4
                }
            }
            SectionKind::Intro => {
                if direction > 500.0 {
                    0.9
                } else if direction.abs() < 500.0 {
                    0.7
                } else {
                    0.5
                }
            }
            SectionKind::Verse | SectionKind::Bridge => {
                if direction.abs() < 2000.0 {
                    0.8
                } else {
                    0.5
                }
            }
        }
    }
}

impl EnvelopeFitness for FilterEnvelopeFitness {
    fn score(&self, envelope: &Envelope) -> f64 {
        if envelope.points().is_empty() {
            return EMPTY_ENVELOPE_SCORE;
        }
        self.smoothness_weight * self.smoothness(envelope)
            + self.range_weight * self.range_fit(envelope)
            + self.sweep_weight * self.sweep(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(values: &[f64]) -> Envelope {
        Envelope::from_values(values).unwrap()
    }

    #[test]
    fn test_gain_prefers_section_range() {
        let chorus = GainEnvelopeFitness::for_section(&SectionConfig::new(SectionKind::Chorus, 8, 0.9));
        let loud = envelope(&[0.8, 0.9, 0.95]);
        let quiet = envelope(&[0.2, 0.25, 0.3]);
        assert!(chorus.score(&loud) > chorus.score(&quiet));
    }

    #[test]
    fn test_gain_penalises_jumps() {
        let verse = GainEnvelopeFitness::new(EnvelopeRange::new(0.0, 1.0));
        let gentle = envelope(&[0.4, 0.5, 0.6]);
        let jumpy = envelope(&[0.0, 1.0, 0.0]);
        assert!(verse.smoothness(&gentle) > verse.smoothness(&jumpy));
    }

    #[test]
    fn test_filter_sweep_direction_by_section() {
        let buildup = FilterEnvelopeFitness::for_section(&SectionConfig::new(SectionKind::Buildup, 8, 0.6));
        let opening = envelope(&[2000.0, 4000.0, 6000.0]);
        let closing = envelope(&[6000.0, 4000.0, 2000.0]);
        assert_eq!(buildup.sweep(&opening), 1.0);
        assert_eq!(buildup.sweep(&closing), 0.3);
        assert!(buildup.score(&opening) > buildup.score(&closing));

        let outro = FilterEnvelopeFitness::for_section(&SectionConfig::new(SectionKind::Outro, 4, 0.2));
        assert_eq!(outro.sweep(&closing), 1.0);
    }
}
