use crate::engines::generation::{ChordProgression, Envelope, Melody, Rhythm};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Musical role of a layer. Declaration order is evolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerRole {
    Chords,
    Drums,
    Bass,
    #[default]
    Melody,
    Pad,
    Lead,
    Other,
}

impl LayerRole {
    /// Lower evolves first and becomes context for later layers
    pub fn priority(self) -> u8 {
        match self {
            LayerRole::Chords => 0,
            LayerRole::Drums => 1,
            LayerRole::Bass => 2,
            LayerRole::Melody => 3,
            LayerRole::Pad => 4,
            LayerRole::Lead => 5,
            LayerRole::Other => 6,
        }
    }
}

impl fmt::Display for LayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerRole::Chords => "chords",
            LayerRole::Drums => "drums",
            LayerRole::Bass => "bass",
            LayerRole::Melody => "melody",
            LayerRole::Pad => "pad",
            LayerRole::Lead => "lead",
            LayerRole::Other => "other",
        };
        f.write_str(name)
    }
}

/// Which phases a layer runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Rhythm, then melody bound to it
    #[default]
    Melodic,
    /// Rhythm only
    Drum,
    /// Chord progression only
    Chords,
}

/// Pass-through rendering settings, copied verbatim onto the finished layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderMetadata {
    pub instrument: String,
    /// 0.0 - 1.0
    pub gain: f64,
    /// Low-pass cutoff in Hz, 0 disables
    pub lpf: u32,
    pub octave_shift: i8,
    /// Scale identifier such as `"c:major"`
    pub scale: String,
    /// Sample name for drum layers, e.g. `"bd"`
    pub drum_sound: String,
}

impl Default for RenderMetadata {
    fn default() -> Self {
        Self {
            instrument: "piano".to_string(),
            gain: 0.5,
            lpf: 4000,
            octave_shift: 0,
            scale: "c:major".to_string(),
            drum_sound: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerGenome {
    Drum { rhythm: Rhythm },
    Melodic { melody: Melody },
    Chords { progression: ChordProgression },
}

/// One finished instrument track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub name: String,
    pub role: LayerRole,
    pub context_group: Option<String>,
    pub genome: LayerGenome,
    pub render: RenderMetadata,
}

impl Layer {
    pub fn rhythm(&self) -> Option<&Rhythm> {
        match &self.genome {
            LayerGenome::Drum { rhythm } => Some(rhythm),
            LayerGenome::Melodic { melody } => Some(melody.rhythm()),
            LayerGenome::Chords { .. } => None,
        }
    }

    pub fn melody(&self) -> Option<&Melody> {
        match &self.genome {
            LayerGenome::Melodic { melody } => Some(melody),
            _ => None,
        }
    }

    pub fn chords(&self) -> Option<&ChordProgression> {
        match &self.genome {
            LayerGenome::Chords { progression } => Some(progression),
            _ => None,
        }
    }

    pub fn is_drum(&self) -> bool {
        matches!(self.genome, LayerGenome::Drum { .. })
    }

    pub fn kind(&self) -> LayerKind {
        match self.genome {
            LayerGenome::Drum { .. } => LayerKind::Drum,
            LayerGenome::Melodic { .. } => LayerKind::Melodic,
            LayerGenome::Chords { .. } => LayerKind::Chords,
        }
    }
}

/// Gain and filter automation evolved for one layer within a song section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerDynamics {
    pub layer: String,
    pub gain: Envelope,
    /// Low-pass cutoff in Hz
    pub lpf: Envelope,
    /// Mean of the gain and filter fitness
    pub fitness: f64,
}

/// Finished layers plus tempo, handed to a renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composition {
    pub bpm: u32,
    pub scale: String,
    pub layers: Vec<Layer>,
}

impl Composition {
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_priority_order() {
        let mut roles = vec![
            LayerRole::Lead,
            LayerRole::Melody,
            LayerRole::Chords,
            LayerRole::Pad,
            LayerRole::Bass,
            LayerRole::Drums,
        ];
        roles.sort_by_key(|r| r.priority());
        assert_eq!(
            roles,
            vec![
                LayerRole::Chords,
                LayerRole::Drums,
                LayerRole::Bass,
                LayerRole::Melody,
                LayerRole::Pad,
                LayerRole::Lead,
            ]
        );
    }

    #[test]
    fn test_drum_layer_accessors() {
        let layer = Layer {
            name: "kick".to_string(),
            role: LayerRole::Drums,
            context_group: None,
            genome: LayerGenome::Drum {
                rhythm: "1010".parse().unwrap(),
            },
            render: RenderMetadata::default(),
        };
        assert!(layer.is_drum());
        assert!(layer.melody().is_none());
        assert_eq!(layer.rhythm().map(|r| r.to_string()), Some("1010".to_string()));
        assert_eq!(layer.kind(), LayerKind::Drum);
    }
}
