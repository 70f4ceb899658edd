use crate::error::{EvotuneError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The twelve chromatic pitch classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    pub fn semitone(self) -> u8 {
        self as u8
    }

    pub fn from_semitone(semitone: u8) -> Self {
        Self::ALL[(semitone % 12) as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "c",
            PitchClass::Cs => "cs",
            PitchClass::D => "d",
            PitchClass::Ds => "ds",
            PitchClass::E => "e",
            PitchClass::F => "f",
            PitchClass::Fs => "fs",
            PitchClass::G => "g",
            PitchClass::Gs => "gs",
            PitchClass::A => "a",
            PitchClass::As => "as",
            PitchClass::B => "b",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        let normalized = lowered.replace('#', "s");
        Self::ALL.iter().copied().find(|p| p.name() == normalized)
    }
}

/// A note's pitch: either a sounding pitch class or silence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pitch {
    Rest,
    Tone(PitchClass),
}

impl Pitch {
    pub fn is_rest(&self) -> bool {
        matches!(self, Pitch::Rest)
    }
}

/// Positive rational length in beats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Duration {
    pub num: u32,
    pub den: u32,
}

impl Duration {
    pub const WHOLE_BEAT: Duration = Duration { num: 1, den: 1 };

    /// Durations a mutated note may draw from
    pub const MUTATION_CHOICES: [Duration; 4] = [
        Duration { num: 1, den: 4 },
        Duration { num: 1, den: 2 },
        Duration { num: 1, den: 1 },
        Duration { num: 2, den: 1 },
    ];

    pub fn new(num: u32, den: u32) -> Result<Self> {
        if num == 0 || den == 0 {
            return Err(EvotuneError::InvalidGenome(format!(
                "duration {}/{} is not positive",
                num, den
            )));
        }
        Ok(Self { num, den })
    }

    /// One equal slice of a beat split into `subdivision` parts
    pub fn subdivision(subdivision: u8) -> Self {
        Self {
            num: 1,
            den: subdivision.max(1) as u32,
        }
    }

    pub fn as_beats(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

pub const MIN_OCTAVE: u8 = 1;
pub const MAX_OCTAVE: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: Pitch,
    pub octave: u8,
    pub duration: Duration,
}

impl Note {
    pub fn rest(duration: Duration) -> Self {
        Self {
            pitch: Pitch::Rest,
            octave: 4,
            duration,
        }
    }

    pub fn tone(pitch: PitchClass, octave: u8, duration: Duration) -> Self {
        Self {
            pitch: Pitch::Tone(pitch),
            octave,
            duration,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_rest()
    }

    /// MIDI note number, `None` for rests
    pub fn midi_pitch(&self) -> Option<i32> {
        match self.pitch {
            Pitch::Rest => None,
            Pitch::Tone(pc) => Some((self.octave as i32 + 1) * 12 + pc.semitone() as i32),
        }
    }
}

/// Parse a scale identifier such as `"d:minor"` into its pitch classes.
pub fn parse_scale(identifier: &str) -> Result<Vec<PitchClass>> {
    let (root_name, mode) = identifier.split_once(':').ok_or_else(|| {
        EvotuneError::Configuration(format!(
            "scale '{}' must look like 'root:mode'",
            identifier
        ))
    })?;

    let root = PitchClass::parse(root_name).ok_or_else(|| {
        EvotuneError::Configuration(format!("unknown scale root '{}'", root_name))
    })?;

    let steps: &[u8] = match mode.trim().to_ascii_lowercase().as_str() {
        "major" | "ionian" => &[0, 2, 4, 5, 7, 9, 11],
        "minor" | "aeolian" => &[0, 2, 3, 5, 7, 8, 10],
        "dorian" => &[0, 2, 3, 5, 7, 9, 10],
        "phrygian" => &[0, 1, 3, 5, 7, 8, 10],
        "lydian" => &[0, 2, 4, 6, 7, 9, 11],
        "mixolydian" => &[0, 2, 4, 5, 7, 9, 10],
        "locrian" => &[0, 1, 3, 5, 6, 8, 10],
        "harmonic_minor" => &[0, 2, 3, 5, 7, 8, 11],
        "major_pentatonic" => &[0, 2, 4, 7, 9],
        "minor_pentatonic" => &[0, 3, 5, 7, 10],
        "blues" => &[0, 3, 5, 6, 7, 10],
        other => {
            return Err(EvotuneError::Configuration(format!(
                "unknown scale mode '{}'",
                other
            )))
        }
    };

    Ok(steps
        .iter()
        .map(|step| PitchClass::from_semitone(root.semitone() + step))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scale_minor() {
        let scale = parse_scale("d:minor").unwrap();
        assert_eq!(scale[0], PitchClass::D);
        assert_eq!(scale[2], PitchClass::F);
        assert_eq!(scale.len(), 7);
    }

    #[test]
    fn test_parse_scale_rejects_garbage() {
        assert!(parse_scale("major").is_err());
        assert!(parse_scale("x:major").is_err());
        assert!(parse_scale("c:wobbly").is_err());
    }

    #[test]
    fn test_midi_pitch() {
        let a4 = Note::tone(PitchClass::A, 4, Duration::WHOLE_BEAT);
        assert_eq!(a4.midi_pitch(), Some(69));
        assert_eq!(Note::rest(Duration::WHOLE_BEAT).midi_pitch(), None);
    }

    #[test]
    fn test_duration_rejects_zero() {
        assert!(Duration::new(0, 4).is_err());
        assert_eq!(Duration::subdivision(4).as_beats(), 0.25);
    }
}
