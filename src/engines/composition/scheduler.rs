use crate::config::evolution::EvolutionConfig;
use crate::config::layer::LayerConfig;
use crate::config::manager::{AppConfig, CompositionConfig};
use crate::config::traits::ConfigSection;
use crate::engines::composition::context::EvolvedContext;
use crate::engines::composition::layer::{Composition, Layer};
use crate::engines::composition::orchestrator::{LayerEvolver, PhaseParams};
use crate::engines::generation::{LogProgressCallback, ProgressCallback};
use crate::error::{EvotuneError, Result};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Seeded when the configuration carries a seed, from entropy otherwise
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Validate every layer spec and reject duplicate names
pub(crate) fn validate_layers(layers: &[LayerConfig]) -> Result<()> {
    let mut names = HashSet::new();
    for layer in layers {
        layer.spec.validate()?;
        if !names.insert(layer.name()) {
            return Err(EvotuneError::Configuration(format!(
                "Duplicate layer name '{}'",
                layer.name()
            )));
        }
    }
    Ok(())
}

/// Layers sorted by role priority, registration order within a role
pub(crate) fn priority_order(layers: &[LayerConfig]) -> Vec<&LayerConfig> {
    let mut ordered: Vec<&LayerConfig> = layers.iter().collect();
    ordered.sort_by_key(|layer| layer.role().priority());
    ordered
}

/// Evolves registered layers one at a time in role-priority order, feeding
/// each finished layer to the contextual fitness of the ones after it
pub struct LayeredComposer {
    evolution: EvolutionConfig,
    composition: CompositionConfig,
    layers: Vec<LayerConfig>,
    progress: Box<dyn ProgressCallback>,
}

impl LayeredComposer {
    pub fn new(evolution: EvolutionConfig, composition: CompositionConfig) -> Self {
        Self {
            evolution,
            composition,
            layers: Vec::new(),
            progress: Box::new(LogProgressCallback::new("composer", 10)),
        }
    }

    /// Composer with every configured layer registered, without strategies
    pub fn from_config(config: &AppConfig) -> Self {
        let mut composer = Self::new(config.evolution.clone(), config.composition.clone());
        for spec in &config.layers {
            composer.add_layer(LayerConfig::new(spec.clone()));
        }
        composer
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn add_layer(&mut self, layer: LayerConfig) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[LayerConfig] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [LayerConfig] {
        &mut self.layers
    }

    /// Names in the order they will be evolved
    pub fn evolution_order(&self) -> Vec<&str> {
        priority_order(&self.layers)
            .into_iter()
            .map(|layer| layer.name())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        self.evolution.validate()?;
        self.composition.validate()?;
        if self.layers.is_empty() {
            return Err(EvotuneError::Configuration(
                "No layers registered".to_string(),
            ));
        }
        validate_layers(&self.layers)
    }

    /// Run with an RNG seeded from the evolution config
    pub fn compose(&mut self) -> Result<Composition> {
        let mut rng = seeded_rng(self.evolution.seed);
        self.compose_with_rng(&mut rng)
    }

    pub fn compose_with_rng<R: Rng>(&mut self, rng: &mut R) -> Result<Composition> {
        self.validate()?;
        let evolver = LayerEvolver::new(&self.evolution)?;
        let context_weight = self
            .composition
            .use_context
            .then_some(self.composition.inter_layer_weight);

        info!(
            "Composing {} layers in order: {}",
            self.layers.len(),
            self.evolution_order().join(", ")
        );

        let mut context = EvolvedContext::new();
        for layer in priority_order(&self.layers) {
            let finished = evolver.evolve(
                layer,
                &PhaseParams::for_layer(&layer.spec),
                &context,
                context_weight,
                rng,
                self.progress.as_mut(),
            )?;
            context.record(finished);
        }

        let layers: Vec<Layer> = self
            .layers
            .iter()
            .filter_map(|layer| context.get(layer.name()).map(|entry| entry.layer.clone()))
            .collect();

        Ok(Composition {
            bpm: self.composition.bpm,
            scale: self.composition.scale.clone(),
            layers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::layer::LayerSpec;
    use crate::engines::composition::layer::{LayerKind, LayerRole};

    #[test]
    fn test_evolution_order_follows_roles() {
        let mut composer =
            LayeredComposer::new(EvolutionConfig::default(), CompositionConfig::default());
        composer.add_layer(LayerSpec::new("lead", LayerRole::Lead, LayerKind::Melodic).into());
        composer.add_layer(LayerSpec::new("bass", LayerRole::Bass, LayerKind::Melodic).into());
        composer.add_layer(LayerSpec::new("kick", LayerRole::Drums, LayerKind::Drum).into());
        composer.add_layer(LayerSpec::new("hat", LayerRole::Drums, LayerKind::Drum).into());
        composer.add_layer(LayerSpec::new("keys", LayerRole::Chords, LayerKind::Chords).into());

        assert_eq!(
            composer.evolution_order(),
            vec!["keys", "kick", "hat", "bass", "lead"]
        );
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty() {
        let mut composer =
            LayeredComposer::new(EvolutionConfig::default(), CompositionConfig::default());
        assert!(composer.validate().is_err());

        composer.add_layer(LayerSpec::new("kick", LayerRole::Drums, LayerKind::Drum).into());
        composer.add_layer(LayerSpec::new("kick", LayerRole::Drums, LayerKind::Drum).into());
        let err = composer.validate().unwrap_err();
        assert!(err.to_string().contains("kick"));
    }
}
