pub mod builtin;
pub mod dynamics;
pub mod traits;
pub mod variation;

pub use builtin::{ChordVarietyFitness, DensityTargetRhythm, ScaleSmoothnessMelody};
pub use dynamics::{FilterEnvelopeFitness, GainEnvelopeFitness};
pub use traits::{
    ChordFitness, EnvelopeFitness, FitnessStrategies, MelodyFitness, RhythmFitness, NEUTRAL_SCORE,
};
pub use variation::{phrase_similarity, VariationFitness, DEFAULT_SIMILARITY_TARGET};
