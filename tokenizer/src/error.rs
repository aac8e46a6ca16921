use std::path::PathBuf;

use thiserror::Error;

use crate::traits::TokenIdType;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to load model from {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    #[error("unsupported model format at {}: {reason}", .path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("decoding failed: {0}")]
    Decode(String),

    #[error("piece id {id} is out of range [0, {size})")]
    IdOutOfRange { id: TokenIdType, size: usize },

    #[error("failed to read tokenizer config: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True when the failure came from the model file rather than a call
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound(_)
                | EngineError::Load { .. }
                | EngineError::UnsupportedFormat { .. }
                | EngineError::Config(_)
                | EngineError::Io(_)
        )
    }
}
