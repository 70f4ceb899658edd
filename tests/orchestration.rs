use evotune::config::{
    CompositionConfig, EvolutionConfig, LayerConfig, LayerSpec, SectionConfig, SectionKind,
    SongForm,
};
use evotune::engines::composition::{
    EvolvedContext, Layer, LayerEvolver, LayerKind, LayerRole, LayeredComposer, PhaseParams,
    SongComposer,
};
use evotune::engines::generation::{HistoryProgressCallback, ProgressCallback, Rhythm};
use evotune::fitness::{FitnessStrategies, ScaleSmoothnessMelody};
use evotune::render::{Renderer, StrudelRenderer};
use evotune::types::parse_scale;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};

/// Records the order in which layers start their phases
struct PhaseRecorder {
    phases: Arc<Mutex<Vec<(String, String)>>>,
}

impl ProgressCallback for PhaseRecorder {
    fn on_phase_start(&mut self, layer: &str, phase: &str) {
        if let Ok(mut phases) = self.phases.lock() {
            phases.push((layer.to_string(), phase.to_string()));
        }
    }

    fn on_generation_start(&mut self, _generation: usize) {}
    fn on_generation_complete(&mut self, _generation: usize, _best_fitness: f64) {}
    fn on_threshold_reached(&mut self, _generation: usize, _best_fitness: f64) {}
}

/// Small, seeded evolution settings for fast tests
fn quick_evolution() -> EvolutionConfig {
    EvolutionConfig {
        population_size: 8,
        mutation_rate: 0.3,
        elitism_count: 2,
        rhythm_generations: 3,
        melody_generations: 3,
        chord_generations: 3,
        seed: Some(1234),
        ..Default::default()
    }
}

fn melodic(name: &str, role: LayerRole) -> LayerConfig {
    let spec = LayerSpec {
        beats_per_bar: 4,
        max_subdivision: 3,
        ..LayerSpec::new(name, role, LayerKind::Melodic)
    };
    let scale = parse_scale(&spec.render.scale).unwrap();
    LayerConfig::new(spec)
        .with_strategies(FitnessStrategies::default().with_melody(ScaleSmoothnessMelody::new(scale)))
}

fn drums(name: &str) -> LayerConfig {
    LayerConfig::new(LayerSpec {
        beats_per_bar: 4,
        ..LayerSpec::new(name, LayerRole::Drums, LayerKind::Drum)
    })
    .with_strategies(
        FitnessStrategies::default()
            .with_rhythm(|r: &Rhythm| r.active_beats() as f64 / r.len() as f64),
    )
}

fn chords(name: &str) -> LayerConfig {
    LayerConfig::new(LayerSpec {
        beats_per_bar: 4,
        ..LayerSpec::new(name, LayerRole::Chords, LayerKind::Chords)
    })
}

fn assert_bound(layer: &Layer) {
    if let Some(melody) = layer.melody() {
        let rhythm = layer.rhythm().unwrap();
        let sounding = melody.sounding_notes().count();
        assert_eq!(rhythm.note_count(), sounding, "layer {}", layer.name);
        assert!(melody.is_consistent());
    }
}

#[test]
fn test_drum_layer_without_melody_fitness() {
    let mut rng = StdRng::seed_from_u64(10);
    let evolver = LayerEvolver::new(&quick_evolution()).unwrap();
    let layer = LayerConfig::new(LayerSpec::new("snare", LayerRole::Drums, LayerKind::Drum));
    let mut history = HistoryProgressCallback::default();

    let finished = evolver
        .evolve(
            &layer,
            &PhaseParams::for_layer(&layer.spec),
            &EvolvedContext::new(),
            Some(0.3),
            &mut rng,
            &mut history,
        )
        .unwrap();

    assert!(finished.is_drum());
    assert!(finished.melody().is_none());
    assert!(finished.chords().is_none());
    assert_eq!(history.best_per_generation().len(), 3);
}

#[test]
fn test_layers_evolve_in_priority_order() {
    let phases = Arc::new(Mutex::new(Vec::new()));
    let mut composer = LayeredComposer::new(quick_evolution(), CompositionConfig::default())
        .with_progress(Box::new(PhaseRecorder {
            phases: Arc::clone(&phases),
        }));

    composer.add_layer(melodic("lead", LayerRole::Lead));
    composer.add_layer(melodic("bass", LayerRole::Bass));
    composer.add_layer(drums("kick"));
    composer.add_layer(chords("keys"));
    composer.add_layer(melodic("pad", LayerRole::Pad));

    let composition = composer.compose().unwrap();

    let recorded = phases.lock().unwrap().clone();
    let started: Vec<(&str, &str)> = recorded
        .iter()
        .map(|(l, p)| (l.as_str(), p.as_str()))
        .collect();
    assert_eq!(
        started,
        vec![
            ("keys", "chords"),
            ("kick", "rhythm"),
            ("bass", "rhythm"),
            ("bass", "melody"),
            ("pad", "rhythm"),
            ("pad", "melody"),
            ("lead", "rhythm"),
            ("lead", "melody"),
        ]
    );

    // registration order is kept in the result
    let names: Vec<&str> = composition.layers.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["lead", "bass", "kick", "keys", "pad"]);
    composition.layers.iter().for_each(assert_bound);
}

#[test]
fn test_context_only_sees_group_peers() {
    let mut context = EvolvedContext::new();
    let mut rng = StdRng::seed_from_u64(3);
    let evolver = LayerEvolver::new(&quick_evolution()).unwrap();

    for (name, group) in [("kick", Some("groove")), ("hats", None)] {
        let mut layer = drums(name);
        layer.spec.context_group = group.map(str::to_string);
        let finished = evolver
            .evolve(
                &layer,
                &PhaseParams::for_layer(&layer.spec),
                &context,
                Some(0.3),
                &mut rng,
                &mut HistoryProgressCallback::default(),
            )
            .unwrap();
        assert!(context.record(finished));
    }

    assert_eq!(context.names().collect::<Vec<_>>(), vec!["kick", "hats"]);
    assert_eq!(context.peers(Some("groove")).len(), 1);
    assert_eq!(context.peers(None).len(), 2);

    let mut bass = melodic("bass", LayerRole::Bass);
    bass.spec.context_group = Some("groove".to_string());
    let finished = evolver
        .evolve(
            &bass,
            &PhaseParams::for_layer(&bass.spec),
            &context,
            Some(0.3),
            &mut rng,
            &mut HistoryProgressCallback::default(),
        )
        .unwrap();
    assert_bound(&finished);
}

#[test]
fn test_invalid_layer_fails_before_evolution() {
    let phases = Arc::new(Mutex::new(Vec::new()));
    let mut composer = LayeredComposer::new(quick_evolution(), CompositionConfig::default())
        .with_progress(Box::new(PhaseRecorder {
            phases: Arc::clone(&phases),
        }));
    composer.add_layer(chords("keys"));
    let mut broken = melodic("lead", LayerRole::Lead);
    broken.spec.octave_range = (0, 9);
    composer.add_layer(broken);

    let err = composer.compose().unwrap_err();
    assert!(err.to_string().contains("lead"));
    assert!(phases.lock().unwrap().is_empty());
}

#[test]
fn test_seeded_compositions_match() {
    let build = || {
        let mut composer = LayeredComposer::new(quick_evolution(), CompositionConfig::default());
        composer.add_layer(drums("kick"));
        composer.add_layer(melodic("lead", LayerRole::Lead));
        composer.compose().unwrap()
    };
    assert_eq!(build(), build());
}

#[test]
fn test_song_sections_evolve_independently() {
    let mut composer = SongComposer::new(quick_evolution(), CompositionConfig::default());
    composer.add_section(SectionConfig::new(SectionKind::Verse, 2, 0.0));
    composer.add_section(SectionConfig::new(SectionKind::Chorus, 1, 1.0));
    composer.set_structure(vec![
        SectionKind::Verse,
        SectionKind::Chorus,
        SectionKind::Verse,
        SectionKind::Chorus,
    ]);

    let mut lead = melodic("lead", LayerRole::Lead);
    lead.spec.play_in_sections = vec![SectionKind::Chorus];
    composer.add_layer(drums("kick"));
    composer.add_layer(chords("keys"));
    composer.add_layer(lead);

    let song = composer.compose().unwrap();
    assert_eq!(song.sections.len(), 2);
    assert_eq!(song.total_bars(), 6);

    let verse = song.section(SectionKind::Verse).unwrap();
    assert!(verse.layer("lead").is_none());
    assert_eq!(verse.layer("kick").and_then(|l| l.rhythm()).map(|r| r.len()), Some(8));
    // one chord per beat in the section
    assert_eq!(verse.layer("keys").and_then(|l| l.chords()).map(|c| c.len()), Some(8));
    // low energy halves the subdivision ceiling
    let kick = verse.layer("kick").and_then(|l| l.rhythm()).unwrap();
    assert!(kick.beats().iter().all(|d| *d <= 1));

    let chorus = song.section(SectionKind::Chorus).unwrap();
    let lead = chorus.layer("lead").unwrap();
    assert_eq!(lead.rhythm().map(|r| r.len()), Some(4));
    assert_bound(lead);

    let text = StrudelRenderer::default().render_song(&song);
    assert!(text.contains("setcpm(30)"));
    assert_eq!(text.matches("$: ").count(), 3);
}

#[test]
fn test_song_form_structure() {
    let mut composer = SongComposer::new(quick_evolution(), CompositionConfig::default());
    composer.use_form(SongForm::Aaba);
    assert_eq!(composer.structure().len(), 4);
    assert_eq!(
        composer.unique_sections(),
        vec![SectionKind::Verse, SectionKind::Bridge]
    );
}

#[test]
fn test_song_rejects_chord_layer_without_beats() {
    let phases = Arc::new(Mutex::new(Vec::new()));
    let mut composer = SongComposer::new(quick_evolution(), CompositionConfig::default())
        .with_progress(Box::new(PhaseRecorder {
            phases: Arc::clone(&phases),
        }));
    composer.add_section(SectionConfig::new(SectionKind::Verse, 2, 0.5));
    composer.set_structure(vec![SectionKind::Verse]);

    let mut keys = chords("keys");
    keys.spec.beats_per_bar = 0;
    composer.add_layer(drums("kick"));
    composer.add_layer(keys);

    let err = composer.validate().unwrap_err();
    assert!(err.to_string().contains("keys"));
    assert!(composer.compose().is_err());
    assert!(phases.lock().unwrap().is_empty());
}

#[test]
fn test_song_themes_and_section_dynamics() {
    let mut composer = SongComposer::new(quick_evolution(), CompositionConfig::default());
    composer.add_section(SectionConfig::new(SectionKind::Verse, 1, 0.5));
    composer.add_section(SectionConfig::new(SectionKind::Chorus, 1, 1.0));
    composer.set_structure(vec![SectionKind::Verse, SectionKind::Chorus, SectionKind::Verse]);

    let mut lead = melodic("lead", LayerRole::Lead);
    lead.spec.use_variations = true;
    lead.spec.evolve_dynamics = true;
    composer.add_layer(drums("kick"));
    composer.add_layer(lead);

    let song = composer.compose().unwrap();

    // the first section's melody becomes the theme
    let theme = song.themes.get("lead").unwrap();
    let verse = song.section(SectionKind::Verse).unwrap();
    assert_eq!(verse.layer("lead").and_then(|l| l.melody()).unwrap().notes(), theme.as_slice());
    assert!(!song.themes.contains_key("kick"));

    let chorus = song.section(SectionKind::Chorus).unwrap();
    assert_bound(chorus.layer("lead").unwrap());
    let dynamics = chorus.dynamics_for("lead").unwrap();
    assert!(dynamics.gain.values().all(|v| (0.8..=1.0).contains(&v)));
    assert!(dynamics.lpf.values().all(|v| (6000.0..=10000.0).contains(&v)));
    assert!(verse.dynamics_for("kick").is_none());

    let text = StrudelRenderer::default().render_song(&song);
    assert!(text.contains(".lpf(\"<["));
}
