use super::section::SectionKind;
use super::traits::ConfigSection;
use crate::engines::composition::context::ContextWeights;
use crate::engines::composition::layer::{Layer, LayerGenome, LayerKind, LayerRole, RenderMetadata};
use crate::engines::generation::rhythm::MAX_SUBDIVISION_LIMIT;
use crate::engines::generation::{ChordParams, ChordQuality, MelodyParams};
use crate::error::{EvotuneError, Result};
use crate::fitness::traits::FitnessStrategies;
use crate::fitness::variation::DEFAULT_SIMILARITY_TARGET;
use crate::types::{parse_scale, MAX_OCTAVE, MIN_OCTAVE};
use serde::{Deserialize, Serialize};

/// Serialisable shape of one instrument layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSpec {
    pub name: String,
    pub role: LayerRole,
    pub kind: LayerKind,
    /// Restricts contextual scoring to peers in the same group
    pub context_group: Option<String>,
    pub bars: usize,
    pub beats_per_bar: usize,
    pub max_subdivision: u8,
    pub octave_range: (u8, u8),
    pub num_chords: usize,
    pub notes_per_chord: usize,
    /// Chord quality names such as `"minor"` or `"dom7"`
    pub allowed_chord_types: Vec<String>,
    /// Sections the layer plays in; empty means all of them
    pub play_in_sections: Vec<SectionKind>,
    pub use_context: bool,
    pub context_weights: ContextWeights,
    /// In songs, evolve later sections as variations of the first melody
    pub use_variations: bool,
    /// Theme similarity a variation aims for, 0.0 - 1.0
    pub variation_similarity: f64,
    /// In songs, evolve gain and filter envelopes per section
    pub evolve_dynamics: bool,
    pub render: RenderMetadata,
}

impl Default for LayerSpec {
    fn default() -> Self {
        Self {
            name: "layer".to_string(),
            role: LayerRole::Melody,
            kind: LayerKind::Melodic,
            context_group: None,
            bars: 1,
            beats_per_bar: 8,
            max_subdivision: 2,
            octave_range: (4, 5),
            num_chords: 4,
            notes_per_chord: 3,
            allowed_chord_types: Vec::new(),
            play_in_sections: Vec::new(),
            use_context: true,
            context_weights: ContextWeights::default(),
            use_variations: false,
            variation_similarity: DEFAULT_SIMILARITY_TARGET,
            evolve_dynamics: false,
            render: RenderMetadata::default(),
        }
    }
}

impl LayerSpec {
    pub fn new(name: impl Into<String>, role: LayerRole, kind: LayerKind) -> Self {
        Self {
            name: name.into(),
            role,
            kind,
            ..Default::default()
        }
    }

    pub fn total_beats(&self) -> usize {
        self.bars * self.beats_per_bar
    }

    pub fn plays_in(&self, section: SectionKind) -> bool {
        self.play_in_sections.is_empty() || self.play_in_sections.contains(&section)
    }

    /// Pitch material from the render scale. An empty scale means chromatic.
    pub fn melody_params(&self) -> Result<MelodyParams> {
        let scale = if self.render.scale.trim().is_empty() {
            Vec::new()
        } else {
            parse_scale(&self.render.scale)?
        };
        Ok(MelodyParams {
            scale,
            octave_range: self.octave_range,
        })
    }

    pub fn chord_params(&self, num_chords: usize) -> Result<ChordParams> {
        let allowed_qualities = self
            .allowed_chord_types
            .iter()
            .map(|name| name.parse::<ChordQuality>())
            .collect::<Result<Vec<_>>>()?;
        let params = ChordParams {
            num_chords,
            notes_per_chord: self.notes_per_chord,
            allowed_qualities,
        };
        params.validate()?;
        Ok(params)
    }

    /// Wrap a genome with this layer's identity and render metadata
    pub fn to_layer(&self, genome: LayerGenome) -> Layer {
        Layer {
            name: self.name.clone(),
            role: self.role,
            context_group: self.context_group.clone(),
            genome,
            render: self.render.clone(),
        }
    }

    fn invalid(&self, message: impl AsRef<str>) -> EvotuneError {
        EvotuneError::Configuration(format!("Layer '{}': {}", self.name, message.as_ref()))
    }
}

impl ConfigSection for LayerSpec {
    fn section_name() -> &'static str {
        "layers"
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EvotuneError::Configuration(
                "Layer name must not be empty".to_string(),
            ));
        }

        // song sections size chord layers from beats per bar as well
        if self.beats_per_bar == 0 {
            return Err(self.invalid("beats per bar must be at least 1"));
        }

        match self.kind {
            LayerKind::Chords => {
                self.chord_params(self.num_chords)
                    .map_err(|e| self.invalid(e.to_string()))?;
            }
            LayerKind::Melodic | LayerKind::Drum => {
                if self.total_beats() == 0 {
                    return Err(self.invalid("bars and beats per bar must be at least 1"));
                }
                if !(1..=MAX_SUBDIVISION_LIMIT).contains(&self.max_subdivision) {
                    return Err(self.invalid(format!(
                        "max subdivision must be between 1 and {}, got {}",
                        MAX_SUBDIVISION_LIMIT, self.max_subdivision
                    )));
                }
            }
        }

        if self.kind == LayerKind::Melodic {
            let (low, high) = self.octave_range;
            if low > high || low < MIN_OCTAVE || high > MAX_OCTAVE {
                return Err(self.invalid(format!(
                    "octave range ({}, {}) must lie within {}..={} and be ordered",
                    low, high, MIN_OCTAVE, MAX_OCTAVE
                )));
            }
            self.melody_params().map_err(|e| self.invalid(e.to_string()))?;
        }

        if !(0.0..=1.0).contains(&self.variation_similarity) {
            return Err(self.invalid(format!(
                "variation similarity must be between 0 and 1, got {}",
                self.variation_similarity
            )));
        }
        if !(0.0..=1.0).contains(&self.render.gain) {
            return Err(self.invalid(format!("gain must be between 0 and 1, got {}", self.render.gain)));
        }
        Ok(())
    }
}

/// A layer spec plus the strategies that score it. Strategies live in code,
/// not in configuration files.
#[derive(Debug, Clone, Default)]
pub struct LayerConfig {
    pub spec: LayerSpec,
    pub strategies: FitnessStrategies,
}

impl LayerConfig {
    pub fn new(spec: LayerSpec) -> Self {
        Self {
            spec,
            strategies: FitnessStrategies::default(),
        }
    }

    pub fn with_strategies(mut self, strategies: FitnessStrategies) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn role(&self) -> LayerRole {
        self.spec.role
    }
}

impl From<LayerSpec> for LayerConfig {
    fn from(spec: LayerSpec) -> Self {
        Self::new(spec)
    }
}
