//! Engine behavior switches and the sidecar `tokenizer_config.json` reader.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// How the engine encodes and decodes.
///
/// Defaults follow SentencePiece: encoding never adds BOS/EOS and decoding
/// drops control pieces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub add_special_tokens: bool,
    pub skip_special_tokens: bool,
    /// Explicit unknown piece; otherwise discovered from the vocabulary
    pub unk_token: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            add_special_tokens: false,
            skip_special_tokens: true,
            unk_token: None,
        }
    }
}

impl EngineConfig {
    /// Read `tokenizer_config.json` next to `model_path`, if present.
    ///
    /// Only `add_bos_token`, `add_eos_token` and `unk_token` are honored. A
    /// missing file yields the defaults; a malformed one is an error.
    pub fn discover(model_path: &Path) -> Result<Self> {
        let Some(config_path) = model_path.parent().map(|p| p.join(TOKENIZER_CONFIG_FILE)) else {
            return Ok(Self::default());
        };
        if !config_path.is_file() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config = Self::from_tokenizer_config(&content)?;
        debug!(path = %config_path.display(), ?config, "Loaded tokenizer config");
        Ok(config)
    }

    /// Parse the relevant keys out of a `tokenizer_config.json` document
    pub fn from_tokenizer_config(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;

        let add_bos = value.get("add_bos_token").and_then(|v| v.as_bool());
        let add_eos = value.get("add_eos_token").and_then(|v| v.as_bool());

        // Either `"unk_token": "<unk>"` or `"unk_token": {"content": "<unk>", ...}`
        let unk_token = value.get("unk_token").and_then(|v| {
            v.as_str()
                .map(String::from)
                .or_else(|| v.get("content").and_then(|c| c.as_str()).map(String::from))
        });

        Ok(Self {
            add_special_tokens: add_bos == Some(true) || add_eos == Some(true),
            unk_token,
            ..Self::default()
        })
    }
}
