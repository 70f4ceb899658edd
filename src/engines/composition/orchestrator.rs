use crate::config::evolution::{EvolutionConfig, EvolutionPhase};
use crate::config::layer::{LayerConfig, LayerSpec};
use crate::config::section::SectionConfig;
use crate::engines::composition::context::{ContextualFitness, EvolvedContext};
use crate::engines::composition::layer::{Layer, LayerDynamics, LayerGenome, LayerKind};
use crate::engines::generation::{
    ChordProgression, Envelope, EnvelopeRange, EvolutionOutcome, GeneticEngine, Melody,
    ProgressCallback, Rhythm, ENVELOPE_POINTS,
};
use crate::error::Result;
use crate::fitness::dynamics::{FilterEnvelopeFitness, GainEnvelopeFitness};
use crate::fitness::traits::{EnvelopeFitness, MelodyFitness, NEUTRAL_SCORE};
use crate::fitness::variation::VariationFitness;
use crate::types::Note;
use log::{debug, info};
use rand::Rng;
use std::sync::Arc;

/// Genome shape and fitness multipliers for one layer run
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseParams {
    pub total_beats: usize,
    pub max_subdivision: u8,
    pub num_chords: usize,
    pub rhythm_modifier: f64,
    pub melody_modifier: f64,
    pub chord_modifier: f64,
    /// Stored theme; melodies are then scored as variations of it
    pub theme: Option<Arc<Vec<Note>>>,
}

impl PhaseParams {
    /// The layer's own shape with neutral modifiers
    pub fn for_layer(spec: &LayerSpec) -> Self {
        Self {
            total_beats: spec.total_beats(),
            max_subdivision: spec.max_subdivision,
            num_chords: spec.num_chords,
            rhythm_modifier: 1.0,
            melody_modifier: 1.0,
            chord_modifier: 1.0,
            theme: None,
        }
    }

    /// Shape stretched to a section: its bar count, energy-scaled
    /// subdivision, one chord per beat, and its modifiers
    pub fn for_section(spec: &LayerSpec, section: &SectionConfig) -> Self {
        let total_beats = section.bars * spec.beats_per_bar;
        Self {
            total_beats,
            max_subdivision: section.effective_max_subdivision(spec.max_subdivision),
            num_chords: total_beats,
            rhythm_modifier: section.rhythm_modifier,
            melody_modifier: section.melody_modifier,
            chord_modifier: section.chord_modifier,
            theme: None,
        }
    }
}

/// Turns one [`LayerConfig`] into a finished [`Layer`].
///
/// Drum layers run the rhythm phase only, chord layers the chord phase only,
/// and melodic layers a rhythm phase followed by a melody phase bound to the
/// frozen rhythm. A phase without a strategy scores every candidate at
/// [`NEUTRAL_SCORE`], so it still completes and returns some genome.
pub struct LayerEvolver {
    config: EvolutionConfig,
    engine: GeneticEngine,
}

impl LayerEvolver {
    pub fn new(config: &EvolutionConfig) -> Result<Self> {
        let engine = GeneticEngine::new(
            config.population_size,
            config.mutation_rate,
            config.elitism_count,
        )?;
        Ok(Self {
            config: config.clone(),
            engine,
        })
    }

    /// Evolve a layer against the finished peers in `context`.
    ///
    /// `context_weight` enables contextual melody fitness with the given
    /// share of the blended score; `None` scores melodies intrinsically. A
    /// theme in `params` wraps whichever melody fitness results in a
    /// variation score.
    pub fn evolve<R: Rng>(
        &self,
        layer: &LayerConfig,
        params: &PhaseParams,
        context: &EvolvedContext,
        context_weight: Option<f64>,
        rng: &mut R,
        progress: &mut dyn ProgressCallback,
    ) -> Result<Layer> {
        let spec = &layer.spec;
        info!("Evolving layer '{}' ({}, {:?})", spec.name, spec.role, spec.kind);

        let genome = match spec.kind {
            LayerKind::Drum => LayerGenome::Drum {
                rhythm: self.evolve_rhythm(layer, params, rng, progress)?,
            },
            LayerKind::Melodic => {
                let rhythm = Arc::new(self.evolve_rhythm(layer, params, rng, progress)?);
                let melody_fitness = match context_weight {
                    Some(weight) if spec.use_context => {
                        let peers = context.peers(spec.context_group.as_deref());
                        if peers.is_empty() {
                            layer.strategies.melody.clone()
                        } else {
                            debug!("Layer '{}' scored against {} peers", spec.name, peers.len());
                            let contextual = ContextualFitness::new(
                                layer.strategies.melody.clone(),
                                peers,
                                weight,
                                spec.context_weights,
                            );
                            Some(Arc::new(contextual) as Arc<dyn MelodyFitness>)
                        }
                    }
                    _ => layer.strategies.melody.clone(),
                };
                let melody_fitness = match &params.theme {
                    Some(theme) => {
                        debug!("Layer '{}' evolves as a variation of its theme", spec.name);
                        let variation = VariationFitness::new(
                            theme.to_vec(),
                            melody_fitness,
                            spec.variation_similarity,
                        );
                        Some(Arc::new(variation) as Arc<dyn MelodyFitness>)
                    }
                    None => melody_fitness,
                };
                LayerGenome::Melodic {
                    melody: self.evolve_melody(
                        spec,
                        rhythm,
                        melody_fitness,
                        params.melody_modifier,
                        rng,
                        progress,
                    )?,
                }
            }
            LayerKind::Chords => LayerGenome::Chords {
                progression: self.evolve_chords(layer, params, rng, progress)?,
            },
        };

        Ok(spec.to_layer(genome))
    }

    /// Phase 1: evolve the rhythm that every later phase is bound to
    pub fn evolve_rhythm<R: Rng>(
        &self,
        layer: &LayerConfig,
        params: &PhaseParams,
        rng: &mut R,
        progress: &mut dyn ProgressCallback,
    ) -> Result<Rhythm> {
        let phase = EvolutionPhase::Rhythm;
        let name = layer.name();
        progress.on_phase_start(name, phase.as_str());

        let strategies = &layer.strategies;
        let modifier = params.rhythm_modifier;
        let max_subdivision = params.max_subdivision;
        let mutation_rate = self.engine.mutation_rate();

        let outcome = self
            .engine
            .initialize(rng, |rng| {
                Rhythm::random(params.total_beats, max_subdivision, rng)
            })
            .and_then(|initial| {
                self.engine.run(
                    initial,
                    self.config.stopping_rule(phase),
                    |rhythm: &Rhythm| {
                        strategies
                            .score_rhythm(rhythm)
                            .map(|score| score * modifier)
                            .unwrap_or(NEUTRAL_SCORE)
                    },
                    |rhythm: &Rhythm, rng: &mut R| rhythm.mutate(mutation_rate, max_subdivision, rng),
                    |a: &Rhythm, b: &Rhythm, rng: &mut R| a.crossover(b, rng),
                    rng,
                    progress,
                )
            })
            .map_err(|e| e.in_layer(name, phase.as_str()))?;

        log_outcome(name, phase, &outcome, &outcome.best.genome.to_string());
        Ok(outcome.best.genome)
    }

    /// Phase 2: evolve pitches over a frozen rhythm. Every candidate is
    /// re-snapped to `rhythm` after mutation and crossover.
    pub fn evolve_melody<R: Rng>(
        &self,
        spec: &LayerSpec,
        rhythm: Arc<Rhythm>,
        fitness: Option<Arc<dyn MelodyFitness>>,
        modifier: f64,
        rng: &mut R,
        progress: &mut dyn ProgressCallback,
    ) -> Result<Melody> {
        let phase = EvolutionPhase::Melody;
        progress.on_phase_start(&spec.name, phase.as_str());

        let melody_params = spec
            .melody_params()
            .map_err(|e| e.in_layer(&spec.name, phase.as_str()))?;
        let mutation_rate = self.engine.mutation_rate();

        let outcome = self
            .engine
            .initialize(rng, |rng| {
                Ok(Melody::random(Arc::clone(&rhythm), &melody_params, rng))
            })
            .and_then(|initial| {
                self.engine.run(
                    initial,
                    self.config.stopping_rule(phase),
                    |melody: &Melody| match &fitness {
                        Some(fitness) => {
                            let candidate = spec.to_layer(LayerGenome::Melodic {
                                melody: melody.clone(),
                            });
                            fitness.evaluate(&candidate) * modifier
                        }
                        None => NEUTRAL_SCORE,
                    },
                    |melody: &Melody, rng: &mut R| melody.mutate(mutation_rate, &melody_params, rng),
                    |a: &Melody, b: &Melody, rng: &mut R| a.crossover(b, &melody_params, rng),
                    rng,
                    progress,
                )
            })
            .map_err(|e| e.in_layer(&spec.name, phase.as_str()))?;

        let summary = format!("{} notes", outcome.best.genome.sounding_notes().count());
        log_outcome(&spec.name, phase, &outcome, &summary);
        Ok(outcome.best.genome)
    }

    /// Chord-layer phase: evolve a progression of `params.num_chords` chords
    pub fn evolve_chords<R: Rng>(
        &self,
        layer: &LayerConfig,
        params: &PhaseParams,
        rng: &mut R,
        progress: &mut dyn ProgressCallback,
    ) -> Result<ChordProgression> {
        let phase = EvolutionPhase::Chords;
        let name = layer.name();
        progress.on_phase_start(name, phase.as_str());

        let strategies = &layer.strategies;
        let modifier = params.chord_modifier;
        let mutation_rate = self.engine.mutation_rate();

        let outcome = layer
            .spec
            .chord_params(params.num_chords)
            .and_then(|chord_params| {
                let initial = self
                    .engine
                    .initialize(rng, |rng| ChordProgression::random(&chord_params, rng))?;
                self.engine.run(
                    initial,
                    self.config.stopping_rule(phase),
                    |progression: &ChordProgression| {
                        strategies
                            .score_chords(progression)
                            .map(|score| score * modifier)
                            .unwrap_or(NEUTRAL_SCORE)
                    },
                    |progression: &ChordProgression, rng: &mut R| {
                        progression.mutate(mutation_rate, &chord_params, rng)
                    },
                    |a: &ChordProgression, b: &ChordProgression, rng: &mut R| a.crossover(b, rng),
                    rng,
                    progress,
                )
            })
            .map_err(|e| e.in_layer(name, phase.as_str()))?;

        log_outcome(name, phase, &outcome, &outcome.best.genome.to_string());
        Ok(outcome.best.genome)
    }

    /// Section dynamics: a gain envelope, then a filter envelope, each
    /// scored against the section's expected range
    pub fn evolve_dynamics<R: Rng>(
        &self,
        layer_name: &str,
        section: &SectionConfig,
        rng: &mut R,
        progress: &mut dyn ProgressCallback,
    ) -> Result<LayerDynamics> {
        let phase = EvolutionPhase::Dynamics;
        progress.on_phase_start(layer_name, phase.as_str());

        let gain = self
            .evolve_envelope(
                section.gain_envelope_range(),
                &GainEnvelopeFitness::for_section(section),
                rng,
                progress,
            )
            .map_err(|e| e.in_layer(layer_name, phase.as_str()))?;
        let lpf = self
            .evolve_envelope(
                section.lpf_envelope_range(),
                &FilterEnvelopeFitness::for_section(section),
                rng,
                progress,
            )
            .map_err(|e| e.in_layer(layer_name, phase.as_str()))?;

        let fitness = (gain.best.fitness + lpf.best.fitness) / 2.0;
        info!(
            "  {} {}: gain {} / lpf {} (fitness {:.3})",
            layer_name, phase, gain.best.genome, lpf.best.genome, fitness
        );
        Ok(LayerDynamics {
            layer: layer_name.to_string(),
            gain: gain.best.genome,
            lpf: lpf.best.genome,
            fitness,
        })
    }

    fn evolve_envelope<R: Rng>(
        &self,
        range: EnvelopeRange,
        fitness: &dyn EnvelopeFitness,
        rng: &mut R,
        progress: &mut dyn ProgressCallback,
    ) -> Result<EvolutionOutcome<Envelope>> {
        let mutation_rate = self.engine.mutation_rate();
        let initial = self
            .engine
            .initialize(rng, |rng| Envelope::random(ENVELOPE_POINTS, range, rng))?;
        self.engine.run(
            initial,
            self.config.stopping_rule(EvolutionPhase::Dynamics),
            |envelope: &Envelope| fitness.score(envelope),
            |envelope: &Envelope, rng: &mut R| envelope.mutate(mutation_rate, range, rng),
            |a: &Envelope, b: &Envelope, rng: &mut R| a.crossover(b, rng),
            rng,
            progress,
        )
    }
}

fn log_outcome<T>(layer: &str, phase: EvolutionPhase, outcome: &EvolutionOutcome<T>, summary: &str) {
    info!(
        "  {} {}: {} (fitness {:.3}, {} generations{})",
        layer,
        phase,
        summary,
        outcome.best.fitness,
        outcome.generations_run,
        if outcome.reached_threshold {
            ", threshold reached"
        } else {
            ""
        }
    );
}
