use crate::config::evolution::EvolutionConfig;
use crate::config::layer::LayerConfig;
use crate::config::manager::{AppConfig, CompositionConfig};
use crate::config::section::{SectionConfig, SectionKind, SongConfig, SongForm};
use crate::config::traits::ConfigSection;
use crate::engines::composition::context::EvolvedContext;
use crate::engines::composition::layer::{Layer, LayerDynamics};
use crate::engines::composition::orchestrator::{LayerEvolver, PhaseParams};
use crate::engines::composition::scheduler::{priority_order, seeded_rng, validate_layers};
use crate::engines::generation::{LogProgressCallback, Phrase, ProgressCallback};
use crate::error::{EvotuneError, Result};
use log::info;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Bars used for a section kind that appears in the structure without a
/// config of its own
const DEFAULT_SECTION_BARS: usize = 4;

/// Layers evolved for one section type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolvedSection {
    pub kind: SectionKind,
    pub bars: usize,
    pub energy_level: f64,
    pub layers: Vec<Layer>,
    /// Envelopes of the layers that evolve dynamics
    pub dynamics: Vec<LayerDynamics>,
}

impl EvolvedSection {
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn dynamics_for(&self, name: &str) -> Option<&LayerDynamics> {
        self.dynamics.iter().find(|d| d.layer == name)
    }
}

/// A full song: every section type evolved once, arranged by `structure`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Song {
    pub bpm: u32,
    pub scale: String,
    pub structure: Vec<SectionKind>,
    pub sections: Vec<EvolvedSection>,
    /// First melody of each variation layer, the theme later sections vary
    pub themes: BTreeMap<String, Phrase>,
}

impl Song {
    pub fn section(&self, kind: SectionKind) -> Option<&EvolvedSection> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Sections in playing order, repeats included
    pub fn arrangement(&self) -> impl Iterator<Item = &EvolvedSection> {
        self.structure.iter().filter_map(|kind| self.section(*kind))
    }

    pub fn total_bars(&self) -> usize {
        self.arrangement().map(|s| s.bars).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Section-aware scheduler. Each distinct section type is evolved on its
/// own, with a fresh context, its bar count and its energy settings.
///
/// Layers with `use_variations` store their first melody as a theme and are
/// scored as variations of it in every later section. Layers with
/// `evolve_dynamics` also get gain and filter envelopes per section.
pub struct SongComposer {
    evolution: EvolutionConfig,
    composition: CompositionConfig,
    sections: Vec<SectionConfig>,
    structure: Vec<SectionKind>,
    layers: Vec<LayerConfig>,
    progress: Box<dyn ProgressCallback>,
}

impl SongComposer {
    pub fn new(evolution: EvolutionConfig, composition: CompositionConfig) -> Self {
        Self {
            evolution,
            composition,
            sections: Vec::new(),
            structure: Vec::new(),
            layers: Vec::new(),
            progress: Box::new(LogProgressCallback::new("song", 10)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut composer = Self::new(config.evolution.clone(), config.composition.clone());
        composer.apply_song_config(&config.song);
        for spec in &config.layers {
            composer.add_layer(LayerConfig::new(spec.clone()));
        }
        composer
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn apply_song_config(&mut self, song: &SongConfig) {
        let (sections, structure) = song.resolve();
        self.sections = sections;
        self.structure = structure;
    }

    /// Replace sections and structure with a pre-defined form
    pub fn use_form(&mut self, form: SongForm) {
        self.sections = form.sections();
        self.structure = form.structure();
    }

    pub fn add_section(&mut self, section: SectionConfig) {
        self.sections.push(section);
    }

    pub fn set_structure(&mut self, structure: Vec<SectionKind>) {
        self.structure = structure;
    }

    pub fn add_layer(&mut self, layer: LayerConfig) {
        self.layers.push(layer);
    }

    pub fn layers_mut(&mut self) -> &mut [LayerConfig] {
        &mut self.layers
    }

    pub fn structure(&self) -> &[SectionKind] {
        &self.structure
    }

    /// The first config registered for `kind`, or a mid-energy default
    pub fn section_config(&self, kind: SectionKind) -> SectionConfig {
        self.sections
            .iter()
            .find(|s| s.kind == kind)
            .cloned()
            .unwrap_or_else(|| SectionConfig::new(kind, DEFAULT_SECTION_BARS, 0.5))
    }

    /// Distinct section kinds in order of first appearance
    pub fn unique_sections(&self) -> Vec<SectionKind> {
        let mut unique = Vec::new();
        for kind in &self.structure {
            if !unique.contains(kind) {
                unique.push(*kind);
            }
        }
        unique
    }

    pub fn validate(&self) -> Result<()> {
        self.evolution.validate()?;
        self.composition.validate()?;
        if self.structure.is_empty() {
            return Err(EvotuneError::Configuration(
                "Song structure needs at least one section".to_string(),
            ));
        }
        if self.layers.is_empty() {
            return Err(EvotuneError::Configuration(
                "No layers registered".to_string(),
            ));
        }
        for kind in self.unique_sections() {
            self.section_config(kind).validate()?;
        }
        validate_layers(&self.layers)
    }

    pub fn compose(&mut self) -> Result<Song> {
        let mut rng = seeded_rng(self.evolution.seed);
        self.compose_with_rng(&mut rng)
    }

    pub fn compose_with_rng<R: Rng>(&mut self, rng: &mut R) -> Result<Song> {
        self.validate()?;
        let evolver = LayerEvolver::new(&self.evolution)?;
        let context_weight = self
            .composition
            .use_context
            .then_some(self.composition.inter_layer_weight);

        let mut sections = Vec::new();
        let mut themes: BTreeMap<String, Arc<Phrase>> = BTreeMap::new();
        for kind in self.unique_sections() {
            let section = self.section_config(kind);
            info!(
                "Section '{}': {} bars, energy {:.1}",
                kind, section.bars, section.energy_level
            );

            let mut context = EvolvedContext::new();
            let mut dynamics = Vec::new();
            for layer in priority_order(&self.layers) {
                if !layer.spec.plays_in(kind) {
                    continue;
                }
                let spec = &layer.spec;
                let mut params = PhaseParams::for_section(spec, &section);
                if spec.use_variations {
                    params.theme = themes.get(&spec.name).cloned();
                }

                let finished = evolver
                    .evolve(
                        layer,
                        &params,
                        &context,
                        context_weight,
                        rng,
                        self.progress.as_mut(),
                    )
                    .map_err(|e| in_section(e, kind))?;

                if spec.use_variations && !themes.contains_key(&spec.name) {
                    if let Some(melody) = finished.melody() {
                        info!("  {} stored as theme", spec.name);
                        themes.insert(spec.name.clone(), Arc::new(melody.notes().to_vec()));
                    }
                }
                if spec.evolve_dynamics {
                    dynamics.push(
                        evolver
                            .evolve_dynamics(&spec.name, &section, rng, self.progress.as_mut())
                            .map_err(|e| in_section(e, kind))?,
                    );
                }
                context.record(finished);
            }

            let layers = self
                .layers
                .iter()
                .filter_map(|layer| context.get(layer.name()).map(|entry| entry.layer.clone()))
                .collect();

            sections.push(EvolvedSection {
                kind,
                bars: section.bars,
                energy_level: section.energy_level,
                layers,
                dynamics,
            });
        }

        Ok(Song {
            bpm: self.composition.bpm,
            scale: self.composition.scale.clone(),
            structure: self.structure.clone(),
            sections,
            themes: themes
                .into_iter()
                .map(|(name, theme)| (name, theme.to_vec()))
                .collect(),
        })
    }
}

/// Add the section to the layer name of an evolution failure
fn in_section(error: EvotuneError, kind: SectionKind) -> EvotuneError {
    match error {
        EvotuneError::Evolution {
            layer,
            phase,
            message,
        } => EvotuneError::Evolution {
            layer: format!("{} ({})", layer, kind),
            phase,
            message,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_sections_keep_first_occurrence_order() {
        let mut composer =
            SongComposer::new(EvolutionConfig::default(), CompositionConfig::default());
        composer.use_form(SongForm::PopStandard);
        assert_eq!(
            composer.unique_sections(),
            vec![
                SectionKind::Intro,
                SectionKind::Verse,
                SectionKind::Prechorus,
                SectionKind::Chorus,
                SectionKind::Bridge,
                SectionKind::Outro,
            ]
        );
    }

    #[test]
    fn test_section_config_uses_first_match() {
        let mut composer =
            SongComposer::new(EvolutionConfig::default(), CompositionConfig::default());
        composer.use_form(SongForm::Aaba);
        assert_eq!(composer.section_config(SectionKind::Verse).energy_level, 0.6);
        assert_eq!(composer.section_config(SectionKind::Drop).bars, DEFAULT_SECTION_BARS);
    }
}
