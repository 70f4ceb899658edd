pub mod traits;
pub mod evolution;
pub mod layer;
pub mod section;
pub mod manager;

pub use manager::{ConfigManager, AppConfig, CompositionConfig};
pub use evolution::{EvolutionConfig, EvolutionPhase};
pub use layer::{LayerConfig, LayerSpec};
pub use section::{SectionConfig, SectionKind, SongConfig, SongForm};
pub use traits::ConfigSection;
