use crate::engines::composition::layer::Layer;
use crate::engines::generation::{Chord, ChordProgression, Melody, Rhythm};
use crate::fitness::traits::{MelodyFitness, NEUTRAL_SCORE};
use crate::types::{parse_scale, Pitch, PitchClass};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Subdivision treated as "fully dense" when normalising note density
pub const DENSITY_NORMALIZER: f64 = 4.0;

/// Time-aligned note pairs sampled for consonance
const CONSONANCE_SAMPLES: usize = 8;

/// Consecutive motions sampled for voice leading
const VOICE_LEADING_SAMPLES: usize = 7;

/// How hard non-chord tones are punished, 0.0 (loose) to 1.0 (strict)
pub const CHORD_TONE_STRICTNESS: f64 = 0.6;

/// Semitones above the root heard as 9th, 11th and 13th
const EXTENSION_INTERVALS: [u8; 3] = [2, 5, 9];

/// A finished layer and its rhythm, as seen by later layers
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub layer: Layer,
    pub rhythm: Option<Rhythm>,
}

/// Layers finished so far in one run, in completion order.
///
/// Entries are written once, after a layer completes, and only read
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct EvolvedContext {
    entries: Vec<(String, ContextEntry)>,
}

impl EvolvedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished layer. Returns `false` and leaves the map untouched
    /// when the name was already recorded.
    pub fn record(&mut self, layer: Layer) -> bool {
        if self.get(&layer.name).is_some() {
            return false;
        }
        let rhythm = layer.rhythm().cloned();
        self.entries
            .push((layer.name.clone(), ContextEntry { layer, rhythm }));
        true
    }

    pub fn get(&self, name: &str) -> Option<&ContextEntry> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entry)| entry)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Peers visible to a layer: all entries, or only those sharing its
    /// context group when it has one
    pub fn peers(&self, context_group: Option<&str>) -> Vec<ContextEntry> {
        self.entries
            .iter()
            .filter(|(_, entry)| match context_group {
                Some(group) => entry.layer.context_group.as_deref() == Some(group),
                None => true,
            })
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    pub fn into_layers(self) -> Vec<Layer> {
        self.entries.into_iter().map(|(_, e)| e.layer).collect()
    }
}

/// Weights of the compatibility metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextWeights {
    pub rhythmic: f64,
    pub density: f64,
    pub harmonic: f64,
    pub voice_leading: f64,
    pub call_response: f64,
    pub chord_tone: f64,
}

impl Default for ContextWeights {
    fn default() -> Self {
        Self {
            rhythmic: 1.0,
            density: 1.0,
            harmonic: 1.0,
            voice_leading: 1.0,
            call_response: 1.0,
            chord_tone: 1.0,
        }
    }
}

/// Per-metric averages behind a context score. A metric no peer could
/// contribute to is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBreakdown {
    pub rhythmic: Option<f64>,
    pub density: Option<f64>,
    pub harmonic: Option<f64>,
    pub voice_leading: Option<f64>,
    pub call_response: Option<f64>,
    pub chord_tone: Option<f64>,
    pub context_score: f64,
}

/// A finished chord layer read as the harmony under each beat.
///
/// The progression is spread evenly over whatever beat count the scored
/// melody has, so four chords under sixteen beats last four beats each.
#[derive(Debug, Clone)]
pub struct HarmonicContext {
    progression: ChordProgression,
    scale: Vec<PitchClass>,
}

impl HarmonicContext {
    /// `scale` places the chord degrees; empty reads them chromatically
    pub fn new(progression: ChordProgression, scale: Vec<PitchClass>) -> Self {
        Self { progression, scale }
    }

    /// Harmony of a chord layer, `None` for any other layer. An unparseable
    /// render scale falls back to chromatic.
    pub fn from_layer(layer: &Layer) -> Option<Self> {
        let progression = layer.chords().filter(|p| !p.is_empty())?.clone();
        let scale = parse_scale(&layer.render.scale).unwrap_or_default();
        Some(Self::new(progression, scale))
    }

    pub fn chord_at(&self, beat: usize, total_beats: usize) -> Option<&Chord> {
        let len = self.progression.len();
        if len == 0 {
            return None;
        }
        let idx = (beat * len / total_beats.max(1)).min(len - 1);
        self.progression.chords.get(idx)
    }

    /// Score one pitch against the sounding chord tones
    fn note_fit(&self, pitch: PitchClass, tones: &[PitchClass], strong: bool) -> f64 {
        if tones.contains(&pitch) {
            return 1.0;
        }
        let above_root = tones
            .first()
            .map(|root| (pitch.semitone() + 12 - root.semitone()) % 12);
        let is_extension = above_root.map_or(false, |i| EXTENSION_INTERVALS.contains(&i));
        let in_scale = self.scale.is_empty() || self.scale.contains(&pitch);

        match (is_extension, in_scale, strong) {
            (true, _, true) => 1.0 - CHORD_TONE_STRICTNESS * 0.3,
            (true, _, false) => 0.9,
            (false, true, true) => 1.0 - CHORD_TONE_STRICTNESS * 0.5,
            (false, true, false) => 0.7,
            (false, false, true) => 1.0 - CHORD_TONE_STRICTNESS * 0.8,
            (false, false, false) => 0.5 - CHORD_TONE_STRICTNESS * 0.3,
        }
    }
}

/// Blends a layer's intrinsic score with its fit against finished peers
pub struct ContextualFitness {
    intrinsic: Option<Arc<dyn MelodyFitness>>,
    peers: Vec<ContextEntry>,
    harmony: Vec<HarmonicContext>,
    intrinsic_weight: f64,
    context_weight: f64,
    weights: ContextWeights,
}

impl ContextualFitness {
    pub fn new(
        intrinsic: Option<Arc<dyn MelodyFitness>>,
        peers: Vec<ContextEntry>,
        context_weight: f64,
        weights: ContextWeights,
    ) -> Self {
        let context_weight = context_weight.clamp(0.0, 1.0);
        let harmony = peers
            .iter()
            .filter_map(|peer| HarmonicContext::from_layer(&peer.layer))
            .collect();
        Self {
            intrinsic,
            peers,
            harmony,
            intrinsic_weight: 1.0 - context_weight,
            context_weight,
            weights,
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    fn intrinsic_score(&self, layer: &Layer) -> f64 {
        self.intrinsic
            .as_ref()
            .map(|f| f.evaluate(layer))
            .unwrap_or(NEUTRAL_SCORE)
    }

    /// Compatibility of `layer` against every peer
    pub fn breakdown(&self, layer: &Layer) -> ContextBreakdown {
        let mut rhythmic = Vec::new();
        let mut density = Vec::new();
        let mut call_response = Vec::new();
        let mut harmonic = Vec::new();
        let mut voice_leading = Vec::new();

        for peer in &self.peers {
            if let (Some(own), Some(other)) = (layer.rhythm(), peer.rhythm.as_ref()) {
                rhythmic.push(rhythmic_compatibility(own, other));
                density.push(density_balance(own, other));
                call_response.push(call_and_response(own, other));
            }
            if let (Some(own), Some(other)) = (layer.melody(), peer.layer.melody()) {
                harmonic.push(interval_consonance(own, other));
                voice_leading.push(voice_leading_quality(own, other));
            }
        }

        let chord_tone: Vec<f64> = match layer.melody() {
            Some(own) => self
                .harmony
                .iter()
                .map(|harmony| chord_tone_fit(own, harmony))
                .collect(),
            None => Vec::new(),
        };

        let breakdown = ContextBreakdown {
            rhythmic: mean(&rhythmic),
            density: mean(&density),
            harmonic: mean(&harmonic),
            voice_leading: mean(&voice_leading),
            call_response: mean(&call_response),
            chord_tone: mean(&chord_tone),
            context_score: NEUTRAL_SCORE,
        };

        let mut total = 0.0;
        let mut weight_sum = 0.0;
        for (score, weight) in [
            (breakdown.rhythmic, self.weights.rhythmic),
            (breakdown.density, self.weights.density),
            (breakdown.harmonic, self.weights.harmonic),
            (breakdown.voice_leading, self.weights.voice_leading),
            (breakdown.call_response, self.weights.call_response),
            (breakdown.chord_tone, self.weights.chord_tone),
        ] {
            if let Some(score) = score {
                total += score * weight;
                weight_sum += weight;
            }
        }

        ContextBreakdown {
            context_score: if weight_sum > 0.0 {
                total / weight_sum
            } else {
                NEUTRAL_SCORE
            },
            ..breakdown
        }
    }
}

impl MelodyFitness for ContextualFitness {
    fn evaluate(&self, layer: &Layer) -> f64 {
        let intrinsic = self.intrinsic_score(layer);
        if self.peers.is_empty() {
            return intrinsic;
        }
        self.intrinsic_weight * intrinsic + self.context_weight * self.breakdown(layer).context_score
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Rewards 30-70% coincidence of active beats and penalises shared silence
pub fn rhythmic_compatibility(a: &Rhythm, b: &Rhythm) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return NEUTRAL_SCORE;
    }

    let pairs = a.beats().iter().zip(b.beats()).take(len);
    let (both_active, both_rest) = pairs.fold((0usize, 0usize), |(on, off), (x, y)| {
        match (*x != 0, *y != 0) {
            (true, true) => (on + 1, off),
            (false, false) => (on, off + 1),
            _ => (on, off),
        }
    });

    let overlap = both_active as f64 / len as f64;
    let shared_rest = both_rest as f64 / len as f64;

    let overlap_score = if (0.3..=0.7).contains(&overlap) {
        1.0 - (overlap - 0.5).abs() / 0.5
    } else {
        0.5
    };
    let rest_score = 1.0 - shared_rest.min(0.5) * 2.0;

    0.6 * overlap_score + 0.4 * rest_score
}

/// Rewards a density difference of 0.2-0.5 on a 0-1 scale
pub fn density_balance(a: &Rhythm, b: &Rhythm) -> f64 {
    if a.is_empty() || b.is_empty() {
        return NEUTRAL_SCORE;
    }
    let diff = (a.density(DENSITY_NORMALIZER) - b.density(DENSITY_NORMALIZER)).abs();

    if (0.2..=0.5).contains(&diff) {
        1.0
    } else if diff < 0.2 {
        0.5 + diff * 2.5
    } else {
        (1.0 - (diff - 0.5) * 2.0).max(0.0)
    }
}

/// Consonance of evenly sampled note pairs between two melodies
pub fn interval_consonance(a: &Melody, b: &Melody) -> f64 {
    let first: Vec<i32> = a.sounding_notes().filter_map(|n| n.midi_pitch()).collect();
    let second: Vec<i32> = b.sounding_notes().filter_map(|n| n.midi_pitch()).collect();
    if first.is_empty() || second.is_empty() {
        return NEUTRAL_SCORE;
    }

    let samples = CONSONANCE_SAMPLES.min(first.len()).min(second.len());
    let total: f64 = (0..samples)
        .map(|i| {
            let x = first[i * first.len() / samples];
            let y = second[i * second.len() / samples];
            let distance = (x - y).abs();
            match distance % 12 {
                // unison/octave, thirds, fifth, minor sixth
                0 | 3 | 4 | 7 | 8 => 1.0,
                2 | 5 | 10 => 0.6,
                _ => 0.3,
            }
        })
        .sum();

    total / samples as f64
}

/// Motion between two melodic parts: contrary motion is best, parallel
/// fifths and octaves worst, and crossing voices are penalised
pub fn voice_leading_quality(a: &Melody, b: &Melody) -> f64 {
    let first: Vec<i32> = a.sounding_notes().filter_map(|n| n.midi_pitch()).collect();
    let second: Vec<i32> = b.sounding_notes().filter_map(|n| n.midi_pitch()).collect();
    if first.len() < 2 || second.len() < 2 {
        return NEUTRAL_SCORE;
    }

    let samples = VOICE_LEADING_SAMPLES
        .min(first.len() - 1)
        .min(second.len() - 1);
    let total: f64 = (0..samples)
        .map(|i| {
            let x = i * (first.len() - 1) / samples;
            let y = i * (second.len() - 1) / samples;
            let (x0, x1) = (first[x], first[x + 1]);
            let (y0, y1) = (second[y], second[y + 1]);
            let (motion_a, motion_b) = (x1 - x0, y1 - y0);
            let before = (x0 - y0).abs() % 12;
            let after = (x1 - y1).abs() % 12;

            let mut score = if motion_a.signum() * motion_b.signum() < 0 {
                1.0
            } else if matches!(before, 0 | 7) && matches!(after, 0 | 7) {
                if (motion_a > 0) == (motion_b > 0) {
                    0.2
                } else {
                    NEUTRAL_SCORE
                }
            } else if matches!(before, 3 | 4 | 8 | 9) && matches!(after, 3 | 4 | 8 | 9) {
                0.8
            } else if motion_a == 0 || motion_b == 0 {
                0.7
            } else {
                0.6
            };

            if x0 > y0 && x1 < y1 {
                score *= 0.7;
            }
            score
        })
        .sum();

    total / samples as f64
}

/// Rewards 10-30% of beats where one part hands over to the other
pub fn call_and_response(a: &Rhythm, b: &Rhythm) -> f64 {
    let len = a.len().min(b.len());
    if len < 2 {
        return NEUTRAL_SCORE;
    }

    let active = |r: &Rhythm, i: usize| r.beats()[i] != 0;
    let handovers = (0..len - 1)
        .filter(|&i| {
            let (a_now, b_now) = (active(a, i), active(b, i));
            let (a_next, b_next) = (active(a, i + 1), active(b, i + 1));
            (a_now && !b_now && !a_next && b_next) || (!a_now && b_now && a_next && !b_next)
        })
        .count();

    let ratio = handovers as f64 / (len - 1) as f64;
    if (0.1..=0.3).contains(&ratio) {
        1.0
    } else if ratio < 0.1 {
        0.5 + ratio * 5.0
    } else {
        0.7
    }
}

/// How well a melody sits on the chords under it. Notes on the first slot
/// of an even beat count as strong and weigh 0.6 against 0.4 for the rest.
pub fn chord_tone_fit(melody: &Melody, harmony: &HarmonicContext) -> f64 {
    let groups = melody.beats();
    let total_beats = groups.len();
    let mut strong = Vec::new();
    let mut weak = Vec::new();

    for (beat, notes) in groups.iter().enumerate() {
        let Some(chord) = harmony.chord_at(beat, total_beats) else {
            continue;
        };
        let tones = chord.pitch_classes(&harmony.scale);
        for (slot, note) in notes.iter().enumerate() {
            let Pitch::Tone(pitch) = note.pitch else {
                continue;
            };
            let on_strong = slot == 0 && beat % 2 == 0;
            let score = harmony.note_fit(pitch, &tones, on_strong);
            if on_strong {
                strong.push(score);
            } else {
                weak.push(score);
            }
        }
    }

    match (mean(&strong), mean(&weak)) {
        (Some(s), Some(w)) => 0.6 * s + 0.4 * w,
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => NEUTRAL_SCORE,
    }
}
