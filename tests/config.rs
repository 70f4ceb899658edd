use evotune::config::{
    AppConfig, ConfigManager, ConfigSection, EvolutionConfig, EvolutionPhase, LayerSpec,
    SongConfig, SongForm,
};
use evotune::engines::composition::{LayerKind, LayerRole};
use evotune::engines::generation::StoppingRule;
use std::io::Write;

fn write_config(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

const SAMPLE: &str = r#"
[evolution]
population_size = 12
mutation_rate = 0.2
elitism_count = 3
fitness_threshold = 0.9
max_generations = 40
seed = 77

[composition]
bpm = 96
scale = "d:minor"

[song]
form = "aaba"

[[layers]]
name = "keys"
role = "chords"
kind = "chords"
num_chords = 8
allowed_chord_types = ["minor", "dom7"]

[[layers]]
name = "bass"
role = "bass"
kind = "melodic"
beats_per_bar = 4
octave_range = [2, 3]
context_group = "low"

[layers.render]
instrument = "gm_synth_bass_1"
gain = 0.7
scale = "d:minor"
"#;

#[test]
fn test_load_toml_file() {
    let file = write_config(SAMPLE, ".toml");
    let manager = ConfigManager::new();
    manager.load_from_file(file.path()).unwrap();
    let config = manager.get();

    assert_eq!(config.evolution.population_size, 12);
    assert_eq!(config.evolution.seed, Some(77));
    assert_eq!(
        config.evolution.stopping_rule(EvolutionPhase::Melody),
        StoppingRule::Threshold {
            fitness_threshold: 0.9,
            max_generations: 40
        }
    );
    assert_eq!(config.composition.bpm, 96);
    assert_eq!(config.song.form, Some(SongForm::Aaba));

    assert_eq!(config.layers.len(), 2);
    let bass = &config.layers[1];
    assert_eq!(bass.role, LayerRole::Bass);
    assert_eq!(bass.kind, LayerKind::Melodic);
    assert_eq!(bass.octave_range, (2, 3));
    assert_eq!(bass.context_group.as_deref(), Some("low"));
    assert_eq!(bass.render.instrument, "gm_synth_bass_1");
    // unspecified fields keep their defaults
    assert_eq!(bass.render.lpf, 4000);
    assert_eq!(bass.max_subdivision, 2);
}

#[test]
fn test_invalid_file_is_rejected_and_previous_config_kept() {
    let file = write_config(
        r#"
[evolution]
population_size = 4
elitism_count = 6
"#,
        ".toml",
    );
    let manager = ConfigManager::new();
    assert!(manager.load_from_file(file.path()).is_err());
    assert_eq!(
        manager.get().evolution.population_size,
        EvolutionConfig::default().population_size
    );
}

#[test]
fn test_missing_file_is_an_error() {
    let manager = ConfigManager::new();
    assert!(manager.load_from_file("does/not/exist.toml").is_err());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evotune.toml");

    let mut config = AppConfig::default();
    config.composition.bpm = 140;
    config.evolution.seed = Some(5);
    config.song = SongConfig::from_form(SongForm::ElectronicDrop);
    let manager = ConfigManager::with_config(config).unwrap();
    manager.save_to_file(&path).unwrap();

    let reloaded = ConfigManager::new();
    reloaded.load_from_file(&path).unwrap();
    let config = reloaded.get();
    assert_eq!(config.composition.bpm, 140);
    assert_eq!(config.evolution.seed, Some(5));
    assert_eq!(config.song.form, Some(SongForm::ElectronicDrop));
    assert_eq!(config.layers, AppConfig::default().layers);
}

#[test]
fn test_validation_errors() {
    let cases: [fn(&mut AppConfig); 12] = [
        |c| c.evolution.population_size = 0,
        |c| c.evolution.mutation_rate = 1.5,
        |c| c.evolution.fitness_threshold = Some(0.0),
        |c| c.evolution.max_generations = 0,
        |c| c.composition.scale = "h:major".to_string(),
        |c| c.composition.inter_layer_weight = 2.0,
        |c| c.layers[1].beats_per_bar = 0,
        |c| c.layers[1].max_subdivision = 10,
        |c| c.layers[0].num_chords = 0,
        |c| c.layers[0].allowed_chord_types = vec!["polychord".to_string()],
        |c| c.layers.push(c.layers[0].clone()),
        |c| c.layers[4].variation_similarity = 1.5,
    ];

    for (idx, edit) in cases.iter().enumerate() {
        let mut config = AppConfig::default();
        edit(&mut config);
        if idx == 3 {
            // the cap only matters in threshold mode
            config.evolution.fitness_threshold = Some(0.9);
        }
        assert!(config.validate().is_err(), "case {} should fail", idx);
    }
}

#[test]
fn test_layer_spec_section_name() {
    assert_eq!(LayerSpec::section_name(), "layers");
    assert_eq!(EvolutionConfig::section_name(), "evolution");
    let spec = LayerSpec::new("lead", LayerRole::Lead, LayerKind::Melodic);
    assert!(spec.validate().is_ok());
}
