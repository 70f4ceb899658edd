use crate::engines::generation::operators::{crossover_at, mutate_genes, single_point_crossover};
use crate::error::{EvotuneError, Result};
use crate::types::PitchClass;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scale degrees a chord root can sit on
pub const SCALE_DEGREES: u8 = 7;

/// Intervals a two-note chord may add above its root
const DYAD_INTERVALS: [u8; 4] = [3, 4, 5, 7];

const TRIAD_QUALITIES: [ChordQuality; 6] = [
    ChordQuality::Major,
    ChordQuality::Minor,
    ChordQuality::Diminished,
    ChordQuality::Augmented,
    ChordQuality::Sus2,
    ChordQuality::Sus4,
];

const SEVENTH_QUALITIES: [ChordQuality; 4] = [
    ChordQuality::Major7,
    ChordQuality::Minor7,
    ChordQuality::Dominant7,
    ChordQuality::Diminished7,
];

const ROOT_SHIFTS: [i8; 4] = [-2, -1, 1, 2];

/// Named chord qualities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Sus2,
    Sus4,
    Major7,
    Minor7,
    Dominant7,
    Diminished7,
    Add9,
    Power,
}

impl ChordQuality {
    pub const ALL: [ChordQuality; 12] = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Diminished,
        ChordQuality::Augmented,
        ChordQuality::Sus2,
        ChordQuality::Sus4,
        ChordQuality::Major7,
        ChordQuality::Minor7,
        ChordQuality::Dominant7,
        ChordQuality::Diminished7,
        ChordQuality::Add9,
        ChordQuality::Power,
    ];

    /// Semitone offsets from the root
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Diminished => &[0, 3, 6],
            ChordQuality::Augmented => &[0, 4, 8],
            ChordQuality::Sus2 => &[0, 2, 7],
            ChordQuality::Sus4 => &[0, 5, 7],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
            ChordQuality::Dominant7 => &[0, 4, 7, 10],
            ChordQuality::Diminished7 => &[0, 3, 6, 9],
            ChordQuality::Add9 => &[0, 4, 7, 14],
            ChordQuality::Power => &[0, 7],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChordQuality::Major => "major",
            ChordQuality::Minor => "minor",
            ChordQuality::Diminished => "diminished",
            ChordQuality::Augmented => "augmented",
            ChordQuality::Sus2 => "sus2",
            ChordQuality::Sus4 => "sus4",
            ChordQuality::Major7 => "major7",
            ChordQuality::Minor7 => "minor7",
            ChordQuality::Dominant7 => "dominant7",
            ChordQuality::Diminished7 => "diminished7",
            ChordQuality::Add9 => "add9",
            ChordQuality::Power => "power",
        }
    }

    /// Match an interval set against the vocabulary
    pub fn identify(intervals: &[u8]) -> Option<Self> {
        Self::ALL.iter().copied().find(|q| q.intervals() == intervals)
    }
}

impl fmt::Display for ChordQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChordQuality {
    type Err = EvotuneError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let canonical = match lowered.as_str() {
            "maj" => "major",
            "min" => "minor",
            "dim" => "diminished",
            "aug" => "augmented",
            "maj7" => "major7",
            "min7" | "m7" => "minor7",
            "dom7" | "7" => "dominant7",
            "dim7" => "diminished7",
            "5" => "power",
            other => other,
        };
        Self::ALL
            .iter()
            .copied()
            .find(|q| q.name() == canonical)
            .ok_or_else(|| EvotuneError::Configuration(format!("unknown chord quality '{}'", s)))
    }
}

/// Shape parameters for chord-progression genomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordParams {
    pub num_chords: usize,
    pub notes_per_chord: usize,
    /// Explicit quality vocabulary; empty selects the size-based default
    pub allowed_qualities: Vec<ChordQuality>,
}

impl Default for ChordParams {
    fn default() -> Self {
        Self {
            num_chords: 4,
            notes_per_chord: 3,
            allowed_qualities: Vec::new(),
        }
    }
}

impl ChordParams {
    pub fn validate(&self) -> Result<()> {
        if self.num_chords == 0 {
            return Err(EvotuneError::Configuration(
                "chord progression needs at least one chord".to_string(),
            ));
        }
        if !(2..=4).contains(&self.notes_per_chord) {
            return Err(EvotuneError::Configuration(format!(
                "notes per chord must be between 2 and 4, got {}",
                self.notes_per_chord
            )));
        }
        if let Some(short) = self
            .allowed_qualities
            .iter()
            .find(|q| q.intervals().len() < self.notes_per_chord)
        {
            return Err(EvotuneError::Configuration(format!(
                "chord quality '{}' has only {} notes, {} required",
                short,
                short.intervals().len(),
                self.notes_per_chord
            )));
        }
        Ok(())
    }

    /// Draw an interval set: from the allowed list when given, otherwise from
    /// the default vocabulary for the chord size
    pub fn random_intervals<R: Rng>(&self, rng: &mut R) -> Vec<u8> {
        if let Some(quality) = self.allowed_qualities.choose(rng) {
            return quality
                .intervals()
                .iter()
                .copied()
                .take(self.notes_per_chord)
                .collect();
        }

        match self.notes_per_chord {
            0 | 1 => vec![0],
            2 => {
                let interval = DYAD_INTERVALS.choose(rng).copied().unwrap_or(7);
                vec![0, interval]
            }
            3 => TRIAD_QUALITIES
                .choose(rng)
                .map(|q| q.intervals().to_vec())
                .unwrap_or_else(|| ChordQuality::Major.intervals().to_vec()),
            n => SEVENTH_QUALITIES
                .choose(rng)
                .map(|q| q.intervals().iter().copied().take(n).collect())
                .unwrap_or_else(|| ChordQuality::Dominant7.intervals().to_vec()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chord {
    pub root_degree: u8,
    pub intervals: Vec<u8>,
}

impl Chord {
    pub fn random<R: Rng>(params: &ChordParams, rng: &mut R) -> Self {
        Self {
            root_degree: rng.gen_range(0..SCALE_DEGREES),
            intervals: params.random_intervals(rng),
        }
    }

    /// Shift the root, resample the quality, or nudge one non-root interval
    pub fn mutate<R: Rng>(&self, params: &ChordParams, rng: &mut R) -> Self {
        let mut chord = self.clone();
        match rng.gen_range(0..3) {
            0 => {
                let shift = ROOT_SHIFTS.choose(rng).copied().unwrap_or(1);
                let degree = (self.root_degree as i16 + shift as i16).rem_euclid(SCALE_DEGREES as i16);
                chord.root_degree = degree as u8;
            }
            1 => chord.intervals = params.random_intervals(rng),
            _ => {
                if chord.intervals.len() > 1 {
                    let idx = rng.gen_range(1..chord.intervals.len());
                    let nudged = if rng.gen_bool(0.5) {
                        chord.intervals[idx].saturating_add(1)
                    } else {
                        chord.intervals[idx].saturating_sub(1)
                    };
                    chord.intervals[idx] = nudged.max(1);
                }
            }
        }
        chord
    }

    pub fn quality(&self) -> Option<ChordQuality> {
        ChordQuality::identify(&self.intervals)
    }

    /// Scale degrees (0..7) the chord stacks, root first
    pub fn degrees(&self) -> Vec<u8> {
        self.intervals
            .iter()
            .map(|&interval| chord_degree(self.root_degree, interval))
            .collect()
    }

    /// Sounding pitch classes over `scale`. An empty scale is read as
    /// chromatic: the root degree and intervals count in semitones.
    pub fn pitch_classes(&self, scale: &[PitchClass]) -> Vec<PitchClass> {
        if scale.is_empty() {
            return self
                .intervals
                .iter()
                .map(|&i| PitchClass::from_semitone(self.root_degree.wrapping_add(i)))
                .collect();
        }
        self.degrees()
            .into_iter()
            .map(|degree| scale[degree as usize % scale.len()])
            .collect()
    }
}

/// Scale degree sounded by a chord interval above `root`
pub fn chord_degree(root: u8, interval: u8) -> u8 {
    let step = match interval {
        0 => 0,
        3 | 4 => 2,
        7 | 8 => 4,
        10 | 11 => 6,
        other => other / 2,
    };
    (root.wrapping_add(step)) % SCALE_DEGREES
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChordProgression {
    pub chords: Vec<Chord>,
}

impl ChordProgression {
    pub fn random<R: Rng>(params: &ChordParams, rng: &mut R) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            chords: (0..params.num_chords)
                .map(|_| Chord::random(params, rng))
                .collect(),
        })
    }

    /// Replace each chord with a mutated one with probability `mutation_rate`
    pub fn mutate<R: Rng>(&self, mutation_rate: f64, params: &ChordParams, rng: &mut R) -> Self {
        Self {
            chords: mutate_genes(&self.chords, mutation_rate, rng, |chord, rng| {
                chord.mutate(params, rng)
            }),
        }
    }

    pub fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        Self {
            chords: single_point_crossover(&self.chords, &other.chords, rng),
        }
    }

    pub fn crossover_at(&self, other: &Self, point: usize) -> Self {
        Self {
            chords: crossover_at(&self.chords, &other.chords, point),
        }
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }
}

impl fmt::Display for ChordProgression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .chords
            .iter()
            .map(|c| match c.quality() {
                Some(q) => format!("deg{}({})", c.root_degree, q),
                None => format!("deg{}({:?})", c.root_degree, c.intervals),
            })
            .collect();
        f.write_str(&parts.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_vocabulary_sizes() {
        let mut rng = StdRng::seed_from_u64(21);
        for size in 2..=4 {
            let params = ChordParams {
                num_chords: 8,
                notes_per_chord: size,
                allowed_qualities: Vec::new(),
            };
            let progression = ChordProgression::random(&params, &mut rng).unwrap();
            assert_eq!(progression.len(), 8);
            for chord in &progression.chords {
                assert_eq!(chord.intervals.len(), size);
                assert_eq!(chord.intervals[0], 0);
                assert!(chord.root_degree < SCALE_DEGREES);
            }
        }
    }

    #[test]
    fn test_allowed_qualities_are_truncated() {
        let mut rng = StdRng::seed_from_u64(21);
        let params = ChordParams {
            num_chords: 4,
            notes_per_chord: 3,
            allowed_qualities: vec![ChordQuality::Dominant7],
        };
        let progression = ChordProgression::random(&params, &mut rng).unwrap();
        assert!(progression.chords.iter().all(|c| c.intervals == vec![0, 4, 7]));
    }

    #[test]
    fn test_rejects_quality_shorter_than_chord() {
        let mut rng = StdRng::seed_from_u64(3);
        let params = ChordParams {
            num_chords: 4,
            notes_per_chord: 3,
            allowed_qualities: vec![ChordQuality::Major, ChordQuality::Power],
        };
        assert!(params.validate().is_err());
        assert!(ChordProgression::random(&params, &mut rng).is_err());

        let dyads = ChordParams {
            notes_per_chord: 2,
            ..params
        };
        let progression = ChordProgression::random(&dyads, &mut rng).unwrap();
        assert!(progression.chords.iter().all(|c| c.intervals.len() == 2));
    }

    #[test]
    fn test_mutation_keeps_intervals_positive() {
        let mut rng = StdRng::seed_from_u64(8);
        let params = ChordParams::default();
        let mut chord = Chord {
            root_degree: 0,
            intervals: vec![0, 1, 2],
        };
        for _ in 0..500 {
            chord = chord.mutate(&params, &mut rng);
            assert!(chord.root_degree < SCALE_DEGREES);
            assert!(chord.intervals.iter().skip(1).all(|i| *i >= 1));
        }
    }

    #[test]
    fn test_pitch_classes_follow_scale() {
        let c_major = [
            PitchClass::C,
            PitchClass::D,
            PitchClass::E,
            PitchClass::F,
            PitchClass::G,
            PitchClass::A,
            PitchClass::B,
        ];
        let a_minor = Chord {
            root_degree: 5,
            intervals: vec![0, 3, 7],
        };
        assert_eq!(a_minor.degrees(), vec![5, 0, 2]);
        assert_eq!(
            a_minor.pitch_classes(&c_major),
            vec![PitchClass::A, PitchClass::C, PitchClass::E]
        );

        let chromatic = Chord {
            root_degree: 2,
            intervals: vec![0, 4, 7],
        };
        assert_eq!(
            chromatic.pitch_classes(&[]),
            vec![PitchClass::D, PitchClass::Fs, PitchClass::A]
        );
    }

    #[test]
    fn test_quality_parsing() {
        assert_eq!("dom7".parse::<ChordQuality>().unwrap(), ChordQuality::Dominant7);
        assert_eq!("Minor".parse::<ChordQuality>().unwrap(), ChordQuality::Minor);
        assert!("mystery".parse::<ChordQuality>().is_err());
    }

    #[test]
    fn test_rejects_bad_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = ChordParams {
            num_chords: 0,
            ..ChordParams::default()
        };
        assert!(ChordProgression::random(&params, &mut rng).is_err());
    }
}
