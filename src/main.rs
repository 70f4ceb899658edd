use anyhow::{Context, Result};
use evotune::config::{AppConfig, ConfigManager, LayerConfig};
use evotune::engines::composition::{LayerKind, LayeredComposer, LayerRole, SongComposer};
use evotune::fitness::{
    ChordVarietyFitness, DensityTargetRhythm, FitnessStrategies, ScaleSmoothnessMelody,
};
use evotune::render::{Renderer, StrudelRenderer};
use log::info;
use std::env;

/// Built-in strategies for a layer, picked by role and kind
fn default_strategies(layer: &LayerConfig) -> Result<FitnessStrategies> {
    let spec = &layer.spec;
    let strategies = FitnessStrategies::default();

    let strategies = match spec.kind {
        LayerKind::Chords => strategies.with_chord(ChordVarietyFitness),
        LayerKind::Drum | LayerKind::Melodic => {
            let density = match spec.role {
                LayerRole::Drums => 0.6,
                LayerRole::Bass => 0.5,
                LayerRole::Pad => 0.3,
                _ => 0.75,
            };
            strategies.with_rhythm(DensityTargetRhythm::new(density))
        }
    };

    if spec.kind == LayerKind::Melodic {
        let params = spec
            .melody_params()
            .with_context(|| format!("Invalid scale for layer '{}'", spec.name))?;
        Ok(strategies.with_melody(ScaleSmoothnessMelody::new(params.scale)))
    } else {
        Ok(strategies)
    }
}

fn attach_strategies(layers: &mut [LayerConfig]) -> Result<()> {
    for layer in layers.iter_mut() {
        layer.strategies = default_strategies(layer)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let as_json = args.iter().any(|a| a == "--json");
    let as_song = args.iter().any(|a| a == "--song");
    let config_path = args.iter().find(|a| !a.starts_with("--"));

    let manager = ConfigManager::new();
    if let Some(path) = config_path {
        manager
            .load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?;
    }
    let config: AppConfig = manager.get();
    config.validate().context("Invalid configuration")?;

    info!(
        "Population {}, mutation rate {}, elitism {}",
        config.evolution.population_size,
        config.evolution.mutation_rate,
        config.evolution.elitism_count
    );

    let renderer = StrudelRenderer::default();

    if as_song {
        let mut composer = SongComposer::from_config(&config);
        attach_strategies(composer.layers_mut())?;
        let song = composer.compose().context("Song evolution failed")?;
        if as_json {
            println!("{}", song.to_json()?);
        } else {
            println!("{}", renderer.render_song(&song));
        }
    } else {
        let mut composer = LayeredComposer::from_config(&config);
        attach_strategies(composer.layers_mut())?;
        let composition = composer.compose().context("Composition failed")?;
        if as_json {
            println!("{}", composition.to_json()?);
        } else {
            println!("{}", renderer.render_composition(&composition));
        }
    }

    Ok(())
}
