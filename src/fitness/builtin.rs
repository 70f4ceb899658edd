//! A handful of simple strategies so the binary can run without a
//! hand-written heuristic catalog.

use super::traits::{ChordFitness, MelodyFitness, RhythmFitness, NEUTRAL_SCORE};
use crate::engines::composition::layer::Layer;
use crate::engines::generation::{ChordProgression, Rhythm};
use crate::types::{Pitch, PitchClass};
use std::collections::HashSet;

/// Rewards rhythms whose share of active beats sits near `target`
#[derive(Debug, Clone)]
pub struct DensityTargetRhythm {
    pub target: f64,
}

impl DensityTargetRhythm {
    pub fn new(target: f64) -> Self {
        Self {
            target: target.clamp(0.0, 1.0),
        }
    }
}

impl RhythmFitness for DensityTargetRhythm {
    fn score(&self, rhythm: &Rhythm) -> f64 {
        if rhythm.is_empty() {
            return 0.0;
        }
        let active = rhythm.active_beats() as f64 / rhythm.len() as f64;
        let closeness = 1.0 - (active - self.target).abs();

        let distinct: HashSet<u8> = rhythm.beats().iter().copied().collect();
        let variety = (distinct.len() as f64 / 3.0).min(1.0);

        0.8 * closeness + 0.2 * variety
    }
}

/// Scale adherence blended with stepwise motion
#[derive(Debug, Clone)]
pub struct ScaleSmoothnessMelody {
    pub scale: Vec<PitchClass>,
}

impl ScaleSmoothnessMelody {
    pub fn new(scale: Vec<PitchClass>) -> Self {
        Self { scale }
    }

    fn adherence(&self, pitches: &[PitchClass]) -> f64 {
        if pitches.is_empty() || self.scale.is_empty() {
            return 1.0;
        }
        let inside = pitches.iter().filter(|p| self.scale.contains(p)).count();
        inside as f64 / pitches.len() as f64
    }
}

impl MelodyFitness for ScaleSmoothnessMelody {
    fn evaluate(&self, layer: &Layer) -> f64 {
        let Some(melody) = layer.melody() else {
            return NEUTRAL_SCORE;
        };

        let pitches: Vec<PitchClass> = melody
            .sounding_notes()
            .filter_map(|n| match n.pitch {
                Pitch::Tone(pc) => Some(pc),
                Pitch::Rest => None,
            })
            .collect();
        let midi: Vec<i32> = melody.sounding_notes().filter_map(|n| n.midi_pitch()).collect();

        let smoothness = if midi.len() < 2 {
            NEUTRAL_SCORE
        } else {
            let total: i32 = midi.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
            let average = total as f64 / (midi.len() - 1) as f64;
            (1.0 - average / 12.0).max(0.0)
        };

        let distinct: HashSet<PitchClass> = pitches.iter().copied().collect();
        let variety = (distinct.len() as f64 / 7.0).min(1.0);

        0.4 * self.adherence(&pitches) + 0.4 * smoothness + 0.2 * variety
    }
}

/// Root variety, functional roots and a cadence onto the tonic
#[derive(Debug, Clone, Default)]
pub struct ChordVarietyFitness;

impl ChordFitness for ChordVarietyFitness {
    fn evaluate(&self, progression: &ChordProgression) -> f64 {
        let roots: Vec<u8> = progression.chords.iter().map(|c| c.root_degree).collect();
        if roots.is_empty() {
            return 0.0;
        }

        let distinct: HashSet<u8> = roots.iter().copied().collect();
        let variety = (distinct.len() as f64 / roots.len().min(4) as f64).min(1.0);
        let repeats = roots.windows(2).filter(|w| w[0] == w[1]).count();
        let repetition_penalty = repeats as f64 / (roots.len().saturating_sub(1)).max(1) as f64;

        let functional = roots
            .iter()
            .map(|r| match r {
                0 | 3 | 4 => 1.0,
                1 | 5 => 0.7,
                _ => 0.4,
            })
            .sum::<f64>()
            / roots.len() as f64;

        let mut cadence: f64 = if roots.last() == Some(&0) { 0.5 } else { 0.0 };
        cadence += 0.25 * roots.windows(2).filter(|w| w[0] == 4 && w[1] == 0).count() as f64;

        0.35 * (0.6 * variety + 0.4 * (1.0 - repetition_penalty))
            + 0.35 * functional
            + 0.3 * cadence.min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::Chord;

    #[test]
    fn test_density_target_prefers_matching_rhythm() {
        let fitness = DensityTargetRhythm::new(1.0);
        let dense: Rhythm = "12121212".parse().unwrap();
        let sparse: Rhythm = "10000000".parse().unwrap();
        assert!(fitness.score(&dense) > fitness.score(&sparse));
    }

    #[test]
    fn test_chord_cadence_rewarded() {
        let chord = |root| Chord {
            root_degree: root,
            intervals: vec![0, 4, 7],
        };
        let resolving = ChordProgression {
            chords: vec![chord(0), chord(3), chord(4), chord(0)],
        };
        let wandering = ChordProgression {
            chords: vec![chord(6), chord(6), chord(2), chord(6)],
        };
        let fitness = ChordVarietyFitness;
        assert!(fitness.evaluate(&resolving) > fitness.evaluate(&wandering));
    }
}
