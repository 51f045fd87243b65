use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A document failed structural validation on import. The current
    /// pattern is left untouched when this is returned.
    #[error("invalid pattern document: {reason}")]
    InvalidDocument { reason: String },

    #[error("unknown sound id: {0}")]
    UnknownSound(String),

    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio error: {0}")]
    Audio(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
