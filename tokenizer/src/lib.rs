//! Tokenizer engine behind the SentencePiece C bridge.
//!
//! The bridge only sees the [`traits::Engine`] capability set. The one
//! concrete adapter is [`huggingface::HuggingFaceEngine`]; [`mock::MockEngine`]
//! stands in for it in tests.

use std::{ops::Deref, path::Path, sync::Arc};

pub mod config;
pub mod error;
pub mod huggingface;
pub mod mock;
pub mod sentencepiece;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;


pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use huggingface::HuggingFaceEngine;
pub use traits::{Decoder, Encoder, Engine, TokenIdType};

/// Shared handle to a loaded engine
#[derive(Clone)]
pub struct Processor(Arc<dyn Engine>);

impl Processor {
    pub fn from_arc(engine: Arc<dyn Engine>) -> Self {
        Self(engine)
    }

    /// Load a model, see [`create_engine_from_file`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        create_engine_from_file(path).map(Self)
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.0
    }
}

impl Deref for Processor {
    type Target = dyn Engine;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl<E: Engine + 'static> From<E> for Processor {
    fn from(engine: E) -> Self {
        Self(Arc::new(engine))
    }
}

/// Load an engine from a `tokenizer.json` or SentencePiece `.model` file, or
/// a directory containing one
pub fn create_engine_from_file(path: impl AsRef<Path>) -> Result<Arc<dyn Engine>> {
    let file_path = huggingface::resolve_model_path(path.as_ref());
    let engine = HuggingFaceEngine::from_file(&file_path)?;
    Ok(Arc::new(engine))
}
