use super::{
    evolution::EvolutionConfig,
    layer::LayerSpec,
    section::SongConfig,
    traits::ConfigSection,
};
use crate::engines::composition::layer::{LayerKind, LayerRole, RenderMetadata};
use crate::error::{EvotuneError, Result};
use crate::types::parse_scale;
use config::{Config, Environment, File};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment overrides, e.g. `EVOTUNE_EVOLUTION__SEED=7`
pub const ENV_PREFIX: &str = "EVOTUNE";

/// Composition-wide settings shared by every layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    pub bpm: u32,
    pub scale: String,
    /// Blend contextual compatibility into melody fitness
    pub use_context: bool,
    /// Share of the context score in the blended fitness
    pub inter_layer_weight: f64,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            bpm: 120,
            scale: "c:major".to_string(),
            use_context: true,
            inter_layer_weight: 0.3,
        }
    }
}

impl ConfigSection for CompositionConfig {
    fn section_name() -> &'static str {
        "composition"
    }

    fn validate(&self) -> Result<()> {
        if self.bpm == 0 {
            return Err(EvotuneError::Configuration(
                "BPM must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.inter_layer_weight) {
            return Err(EvotuneError::Configuration(
                "Inter-layer weight must be between 0 and 1".to_string(),
            ));
        }
        parse_scale(&self.scale)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub evolution: EvolutionConfig,
    pub composition: CompositionConfig,
    pub layers: Vec<LayerSpec>,
    pub song: SongConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            evolution: EvolutionConfig::default(),
            composition: CompositionConfig::default(),
            layers: default_band(),
            song: SongConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.evolution.validate()?;
        self.composition.validate()?;
        self.song.validate()?;

        let mut names = HashSet::new();
        for layer in &self.layers {
            layer.validate()?;
            if !names.insert(layer.name.as_str()) {
                return Err(EvotuneError::Configuration(format!(
                    "Duplicate layer name '{}'",
                    layer.name
                )));
            }
        }
        Ok(())
    }
}

/// Chords, drums, bass and a lead line in C major
pub fn default_band() -> Vec<LayerSpec> {
    let keys = LayerSpec {
        num_chords: 4,
        render: RenderMetadata {
            instrument: "gm_epiano1".to_string(),
            gain: 0.4,
            lpf: 3000,
            ..RenderMetadata::default()
        },
        ..LayerSpec::new("keys", LayerRole::Chords, LayerKind::Chords)
    };

    let kick = LayerSpec {
        bars: 1,
        beats_per_bar: 4,
        max_subdivision: 2,
        render: RenderMetadata {
            instrument: String::new(),
            gain: 0.8,
            lpf: 0,
            drum_sound: "bd".to_string(),
            ..RenderMetadata::default()
        },
        ..LayerSpec::new("kick", LayerRole::Drums, LayerKind::Drum)
    };

    let hats = LayerSpec {
        bars: 1,
        beats_per_bar: 4,
        max_subdivision: 4,
        render: RenderMetadata {
            instrument: String::new(),
            gain: 0.4,
            lpf: 0,
            drum_sound: "hh".to_string(),
            ..RenderMetadata::default()
        },
        ..LayerSpec::new("hats", LayerRole::Drums, LayerKind::Drum)
    };

    let bass = LayerSpec {
        bars: 2,
        beats_per_bar: 4,
        max_subdivision: 2,
        octave_range: (2, 3),
        render: RenderMetadata {
            instrument: "gm_acoustic_bass".to_string(),
            gain: 0.6,
            lpf: 800,
            ..RenderMetadata::default()
        },
        ..LayerSpec::new("bass", LayerRole::Bass, LayerKind::Melodic)
    };

    let lead = LayerSpec {
        bars: 2,
        beats_per_bar: 4,
        max_subdivision: 3,
        octave_range: (4, 5),
        render: RenderMetadata {
            instrument: "triangle".to_string(),
            gain: 0.5,
            lpf: 5000,
            ..RenderMetadata::default()
        },
        ..LayerSpec::new("lead", LayerRole::Lead, LayerKind::Melodic)
    };

    vec![keys, kick, hats, bass, lead]
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Wrap an explicit configuration after validating it
    pub fn with_config(config: AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Load a TOML or JSON file (chosen by extension), then apply
    /// `EVOTUNE_*` environment overrides with `__` separating nested keys
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config: AppConfig = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        info!(
            "Loaded configuration from {} ({} layers)",
            path.display(),
            config.layers.len()
        );

        *self.write_lock()? = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_str = toml::to_string_pretty(&self.get())?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        match self.config.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Apply an edit; the stored configuration only changes when the edited
    /// copy validates
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut edited = self.get();
        f(&mut edited);
        edited.validate()?;
        *self.write_lock()? = edited;
        Ok(())
    }

    fn write_lock(&self) -> Result<std::sync::RwLockWriteGuard<'_, AppConfig>> {
        self.config
            .write()
            .map_err(|_| EvotuneError::Configuration("configuration lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_duplicate_layer_names_rejected() {
        let mut config = AppConfig::default();
        let copy = config.layers[0].clone();
        config.layers.push(copy);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate layer name"));
    }

    #[test]
    fn test_update_keeps_old_config_on_error() {
        let manager = ConfigManager::new();
        let result = manager.update(|c| c.evolution.population_size = 0);
        assert!(result.is_err());
        assert_eq!(manager.get().evolution.population_size, 20);

        manager.update(|c| c.composition.bpm = 90).unwrap();
        assert_eq!(manager.get().composition.bpm, 90);
    }
}
