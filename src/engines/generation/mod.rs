pub mod chord;
pub mod envelope;
pub mod evolution_engine;
pub mod genome;
pub mod melody;
pub mod operators;
pub mod progress;
pub mod rhythm;

pub use chord::{Chord, ChordParams, ChordProgression, ChordQuality};
pub use envelope::{Envelope, EnvelopePoint, EnvelopeRange, ENVELOPE_POINTS};
pub use evolution_engine::{EvolutionOutcome, GeneticEngine, ProgressCallback, StoppingRule};
pub use genome::{Individual, Population};
pub use melody::{Melody, MelodyParams, Phrase};
pub use progress::{HistoryProgressCallback, LogProgressCallback};
pub use rhythm::Rhythm;
