//! Scoring a melody as a variation of a stored theme.

use super::traits::{MelodyFitness, NEUTRAL_SCORE};
use crate::engines::composition::layer::Layer;
use crate::types::{Note, Pitch, PitchClass};
use std::collections::HashSet;
use std::sync::Arc;

/// Theme similarity a variation aims for by default
pub const DEFAULT_SIMILARITY_TARGET: f64 = 0.6;

const SIMILARITY_TOLERANCE: f64 = 0.15;

/// Score for a layer that carries no melody to compare
const EMPTY_VARIATION_SCORE: f64 = 0.3;

/// Similarity of two note lists, 0.0 - 1.0: matching pitch classes at
/// proportionally aligned positions (0.6) and matching melodic direction
/// between consecutive notes (0.4). Rests are ignored.
pub fn phrase_similarity(a: &[Note], b: &[Note]) -> f64 {
    let first: Vec<&Note> = a.iter().filter(|n| !n.is_rest()).collect();
    let second: Vec<&Note> = b.iter().filter(|n| !n.is_rest()).collect();
    if first.is_empty() || second.is_empty() {
        return 0.0;
    }

    let samples = first.len().min(second.len());
    let aligned = |i: usize| {
        (
            first[i * first.len() / samples],
            second[i * second.len() / samples],
        )
    };

    let pitch_matches = (0..samples)
        .filter(|&i| {
            let (x, y) = aligned(i);
            x.pitch == y.pitch
        })
        .count();
    let pitch_score = pitch_matches as f64 / samples as f64;

    if samples < 2 {
        return pitch_score;
    }

    let direction = |from: &Note, to: &Note| match (from.midi_pitch(), to.midi_pitch()) {
        (Some(f), Some(t)) => (t - f).signum(),
        _ => 0,
    };
    let contour_matches = (0..samples - 1)
        .filter(|&i| {
            let (x0, y0) = aligned(i);
            let (x1, y1) = aligned(i + 1);
            direction(x0, x1) == direction(y0, y1)
        })
        .count();
    let contour_score = contour_matches as f64 / (samples - 1) as f64;

    0.6 * pitch_score + 0.4 * contour_score
}

/// Blends closeness to a theme, novelty and the wrapped strategy's score.
///
/// Too close to the theme is as bad as unrecognisable: the similarity part
/// peaks within 0.15 of `similarity_target`.
pub struct VariationFitness {
    theme: Vec<Note>,
    intrinsic: Option<Arc<dyn MelodyFitness>>,
    similarity_target: f64,
    similarity_weight: f64,
    interest_weight: f64,
    intrinsic_weight: f64,
}

impl VariationFitness {
    pub fn new(
        theme: Vec<Note>,
        intrinsic: Option<Arc<dyn MelodyFitness>>,
        similarity_target: f64,
    ) -> Self {
        Self {
            theme,
            intrinsic,
            similarity_target: similarity_target.clamp(0.0, 1.0),
            similarity_weight: 0.5,
            interest_weight: 0.3,
            intrinsic_weight: 0.2,
        }
    }

    fn similarity_score(&self, similarity: f64) -> f64 {
        let deviation = (similarity - self.similarity_target).abs();
        if deviation <= SIMILARITY_TOLERANCE {
            1.0
        } else if deviation <= SIMILARITY_TOLERANCE * 2.0 {
            0.7
        } else if deviation <= SIMILARITY_TOLERANCE * 3.0 {
            0.4
        } else {
            0.1
        }
    }

    /// New pitch classes, new durations and a changed register
    fn interest_score(&self, variation: &[Note]) -> f64 {
        let theme: Vec<&Note> = self.theme.iter().filter(|n| !n.is_rest()).collect();
        let varied: Vec<&Note> = variation.iter().filter(|n| !n.is_rest()).collect();
        if theme.is_empty() || varied.is_empty() {
            return NEUTRAL_SCORE;
        }

        let pitch_classes = |notes: &[&Note]| -> HashSet<PitchClass> {
            notes
                .iter()
                .filter_map(|n| match n.pitch {
                    Pitch::Tone(pc) => Some(pc),
                    Pitch::Rest => None,
                })
                .collect()
        };
        let theme_pcs = pitch_classes(&theme);
        let varied_pcs = pitch_classes(&varied);
        let novelty = varied_pcs.difference(&theme_pcs).count() as f64 / varied_pcs.len().max(1) as f64;
        let novelty_score = if (0.1..=0.4).contains(&novelty) {
            1.0
        } else if novelty < 0.1 {
            0.5 + novelty * 5.0
        } else {
            0.6
        };

        let theme_durations: HashSet<_> = theme.iter().map(|n| n.duration).collect();
        let fresh_durations = varied.iter().any(|n| !theme_durations.contains(&n.duration));
        let duration_score = if fresh_durations { 0.8 } else { 0.5 };

        let register = |notes: &[&Note]| {
            let (low, high) = notes
                .iter()
                .fold((u8::MAX, u8::MIN), |(lo, hi), n| (lo.min(n.octave), hi.max(n.octave)));
            high.saturating_sub(low)
        };
        let register_score = if register(&theme).abs_diff(register(&varied)) >= 1 {
            0.9
        } else {
            0.6
        };

        (novelty_score + duration_score + register_score) / 3.0
    }
}

impl MelodyFitness for VariationFitness {
    fn evaluate(&self, layer: &Layer) -> f64 {
        let Some(melody) = layer.melody() else {
            return EMPTY_VARIATION_SCORE;
        };
        let similarity = phrase_similarity(&self.theme, melody.notes());
        let intrinsic = self
            .intrinsic
            .as_ref()
            .map(|f| f.evaluate(layer))
            .unwrap_or(NEUTRAL_SCORE);

        self.similarity_weight * self.similarity_score(similarity)
            + self.interest_weight * self.interest_score(melody.notes())
            + self.intrinsic_weight * intrinsic
    }
}
