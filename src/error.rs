use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvotuneError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Evolution of layer '{layer}' failed during {phase} phase: {message}")]
    Evolution {
        layer: String,
        phase: String,
        message: String,
    },

    #[error("Invalid genome: {0}")]
    InvalidGenome(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Config source error: {0}")]
    Config(#[from] config::ConfigError),
}

impl EvotuneError {
    /// Attach layer and phase information to an error raised while evolving.
    pub fn in_layer(self, layer: &str, phase: &str) -> Self {
        match self {
            EvotuneError::Evolution { .. } => self,
            other => EvotuneError::Evolution {
                layer: layer.to_string(),
                phase: phase.to_string(),
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, EvotuneError>;
