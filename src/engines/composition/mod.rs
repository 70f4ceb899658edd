pub mod context;
pub mod layer;
pub mod orchestrator;
pub mod scheduler;
pub mod song;

pub use context::{
    ContextBreakdown, ContextEntry, ContextWeights, ContextualFitness, EvolvedContext,
    HarmonicContext,
};
pub use layer::{
    Composition, Layer, LayerDynamics, LayerGenome, LayerKind, LayerRole, RenderMetadata,
};
pub use orchestrator::{LayerEvolver, PhaseParams};
pub use scheduler::LayeredComposer;
pub use song::{EvolvedSection, Song, SongComposer};
