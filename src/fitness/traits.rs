use crate::engines::composition::layer::Layer;
use crate::engines::generation::{ChordProgression, Envelope, Rhythm};
use std::fmt;
use std::sync::Arc;

/// Score handed out when a layer has no strategy for a phase
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Scores a bare rhythm. Expected range 0.0 - 1.0.
pub trait RhythmFitness: Send + Sync {
    fn score(&self, rhythm: &Rhythm) -> f64;
}

/// Scores a whole layer; melody candidates are wrapped in a throwaway layer.
pub trait MelodyFitness: Send + Sync {
    fn evaluate(&self, layer: &Layer) -> f64;
}

pub trait ChordFitness: Send + Sync {
    fn evaluate(&self, progression: &ChordProgression) -> f64;
}

/// Scores a gain or filter envelope for one song section
pub trait EnvelopeFitness: Send + Sync {
    fn score(&self, envelope: &Envelope) -> f64;
}

impl<F> RhythmFitness for F
where
    F: Fn(&Rhythm) -> f64 + Send + Sync,
{
    fn score(&self, rhythm: &Rhythm) -> f64 {
        self(rhythm)
    }
}

impl<F> MelodyFitness for F
where
    F: Fn(&Layer) -> f64 + Send + Sync,
{
    fn evaluate(&self, layer: &Layer) -> f64 {
        self(layer)
    }
}

impl<F> ChordFitness for F
where
    F: Fn(&ChordProgression) -> f64 + Send + Sync,
{
    fn evaluate(&self, progression: &ChordProgression) -> f64 {
        self(progression)
    }
}

impl<F> EnvelopeFitness for F
where
    F: Fn(&Envelope) -> f64 + Send + Sync,
{
    fn score(&self, envelope: &Envelope) -> f64 {
        self(envelope)
    }
}

/// Per-phase strategies attached to a layer. Unset phases score
/// [`NEUTRAL_SCORE`].
#[derive(Clone, Default)]
pub struct FitnessStrategies {
    pub rhythm: Option<Arc<dyn RhythmFitness>>,
    pub melody: Option<Arc<dyn MelodyFitness>>,
    pub chord: Option<Arc<dyn ChordFitness>>,
}

impl FitnessStrategies {
    pub fn with_rhythm(mut self, fitness: impl RhythmFitness + 'static) -> Self {
        self.rhythm = Some(Arc::new(fitness));
        self
    }

    pub fn with_melody(mut self, fitness: impl MelodyFitness + 'static) -> Self {
        self.melody = Some(Arc::new(fitness));
        self
    }

    pub fn with_chord(mut self, fitness: impl ChordFitness + 'static) -> Self {
        self.chord = Some(Arc::new(fitness));
        self
    }

    pub fn score_rhythm(&self, rhythm: &Rhythm) -> Option<f64> {
        self.rhythm.as_ref().map(|f| f.score(rhythm))
    }

    pub fn score_chords(&self, progression: &ChordProgression) -> Option<f64> {
        self.chord.as_ref().map(|f| f.evaluate(progression))
    }
}

impl fmt::Debug for FitnessStrategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitnessStrategies")
            .field("rhythm", &self.rhythm.is_some())
            .field("melody", &self.melody.is_some())
            .field("chord", &self.chord.is_some())
            .finish()
    }
}
