use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use tokenizers::tokenizer::Tokenizer as HfTokenizer;
use tracing::{debug, info};

use crate::{
    config::EngineConfig,
    error::{EngineError, Result},
    sentencepiece::SentencePieceModel,
    traits::{Decoder, Encoder, Engine, TokenIdType},
};

const UNK_CANDIDATES: &[&str] = &["<unk>", "<UNK>", "[UNK]"];

pub const TOKENIZER_JSON_FILE: &str = "tokenizer.json";
pub const SENTENCEPIECE_MODEL_FILE: &str = "tokenizer.model";

/// Engine adapter over a HuggingFace `tokenizers` pipeline.
///
/// Serialized SentencePiece conversions (Unigram or BPE with a Metaspace
/// pre-tokenizer) load as-is; native `.model` files are converted on load.
/// Scores come from Unigram tables or the `.model` file itself.
pub struct HuggingFaceEngine {
    tokenizer: HfTokenizer,
    config: EngineConfig,
    vocab: HashMap<String, TokenIdType>,
    /// Indexed by id; holes in the id space stay empty
    pieces: Vec<String>,
    scores: Vec<f32>,
    unk_id: Option<TokenIdType>,
}

impl HuggingFaceEngine {
    /// Load a `tokenizer.json` or SentencePiece `.model` file, honoring a
    /// sibling `tokenizer_config.json`
    pub fn from_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref();
        let config = EngineConfig::discover(file_path)?;
        Self::from_file_with_config(file_path, config)
    }

    pub fn from_file_with_config(file_path: &Path, config: EngineConfig) -> Result<Self> {
        let bytes = read_model(file_path)?;

        let engine = if looks_like_json(&bytes) {
            let tokenizer = HfTokenizer::from_bytes(&bytes).map_err(|e| EngineError::Load {
                path: file_path.to_path_buf(),
                reason: e.to_string(),
            })?;
            Self::from_tokenizer_with_config(tokenizer, config)
        } else {
            Self::from_sentencepiece_bytes(file_path, &bytes, config)?
        };

        info!(
            path = %file_path.display(),
            piece_size = engine.pieces.len(),
            unk_id = ?engine.unk_id,
            "Loaded tokenizer model"
        );
        Ok(engine)
    }

    /// Load a native SentencePiece `.model` file
    pub fn from_sentencepiece_model(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref();
        let config = EngineConfig::discover(file_path)?;
        let bytes = read_model(file_path)?;
        Self::from_sentencepiece_bytes(file_path, &bytes, config)
    }

    fn from_sentencepiece_bytes(
        file_path: &Path,
        bytes: &[u8],
        config: EngineConfig,
    ) -> Result<Self> {
        let unsupported = |reason: String| EngineError::UnsupportedFormat {
            path: file_path.to_path_buf(),
            reason,
        };
        let load_error = |reason: String| EngineError::Load {
            path: file_path.to_path_buf(),
            reason,
        };

        let model = SentencePieceModel::decode(bytes)
            .map_err(|e| unsupported(format!("not a tokenizer.json or SentencePiece model: {e}")))?;
        let document = model.to_tokenizer_json().map_err(unsupported)?;
        let serialized = serde_json::to_vec(&document).map_err(|e| load_error(e.to_string()))?;
        let tokenizer =
            HfTokenizer::from_bytes(&serialized).map_err(|e| load_error(e.to_string()))?;
        debug!(
            kind = ?model.kind(),
            piece_size = model.piece_size(),
            "Converted SentencePiece model"
        );

        let metadata = ModelMetadata {
            scores: model.scores(),
            unk_id: model.unk_id(),
        };
        Ok(Self::assemble(tokenizer, config, metadata))
    }

    /// Wrap an already constructed tokenizer with default config
    pub fn from_tokenizer(tokenizer: HfTokenizer) -> Self {
        Self::from_tokenizer_with_config(tokenizer, EngineConfig::default())
    }

    pub fn from_tokenizer_with_config(tokenizer: HfTokenizer, config: EngineConfig) -> Self {
        let metadata = ModelMetadata::from_tokenizer(&tokenizer);
        Self::assemble(tokenizer, config, metadata)
    }

    fn assemble(tokenizer: HfTokenizer, config: EngineConfig, metadata: ModelMetadata) -> Self {
        // true = include added tokens, SentencePiece counts control pieces too
        let vocab = tokenizer.get_vocab(true);
        let piece_size = tokenizer.get_vocab_size(true);

        let mut pieces = vec![String::new(); piece_size];
        for (piece, &id) in &vocab {
            if let Some(slot) = pieces.get_mut(id as usize) {
                slot.clone_from(piece);
            }
        }

        let mut scores = metadata.scores;
        scores.resize(piece_size, 0.0);
        let unk_id = Self::find_unk_id(&config, metadata.unk_id, &vocab);

        HuggingFaceEngine {
            tokenizer,
            config,
            vocab,
            pieces,
            scores,
            unk_id,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// An explicit `unk_token` wins, then the id the model records, then the
    /// conventional names
    fn find_unk_id(
        config: &EngineConfig,
        recorded: Option<TokenIdType>,
        vocab: &HashMap<String, TokenIdType>,
    ) -> Option<TokenIdType> {
        if let Some(unk) = config.unk_token.as_deref() {
            return vocab.get(unk).copied();
        }
        recorded.or_else(|| {
            UNK_CANDIDATES
                .iter()
                .find_map(|candidate| vocab.get(*candidate).copied())
        })
    }

    fn check_range(&self, ids: &[TokenIdType]) -> Result<()> {
        let size = self.pieces.len();
        match ids.iter().find(|&&id| id as usize >= size) {
            Some(&id) => Err(EngineError::IdOutOfRange { id, size }),
            None => Ok(()),
        }
    }
}

/// What the serialized model records beyond its vocabulary
struct ModelMetadata {
    scores: Vec<f32>,
    unk_id: Option<TokenIdType>,
}

impl ModelMetadata {
    /// Unigram models carry a `[piece, score]` table and an `unk_id`; BPE
    /// models name their `unk_token`. Anything else has neither.
    fn from_tokenizer(tokenizer: &HfTokenizer) -> Self {
        let empty = Self {
            scores: Vec::new(),
            unk_id: None,
        };
        let Ok(model) = serde_json::to_value(tokenizer.get_model()) else {
            return empty;
        };

        match model.get("type").and_then(|t| t.as_str()) {
            Some("Unigram") => {
                let scores = model
                    .get("vocab")
                    .and_then(|v| v.as_array())
                    .map(|entries| {
                        entries
                            .iter()
                            .map(|entry| entry.get(1).and_then(|s| s.as_f64()).unwrap_or(0.0) as f32)
                            .collect()
                    })
                    .unwrap_or_default();
                let unk_id = model
                    .get("unk_id")
                    .and_then(|id| id.as_u64())
                    .and_then(|id| TokenIdType::try_from(id).ok());
                Self { scores, unk_id }
            }
            Some("BPE") => {
                let unk_id = model
                    .get("unk_token")
                    .and_then(|t| t.as_str())
                    .and_then(|unk| tokenizer.token_to_id(unk));
                Self {
                    unk_id,
                    ..empty
                }
            }
            _ => {
                debug!("Model carries no piece scores");
                empty
            }
        }
    }
}

fn read_model(file_path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(file_path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(EngineError::NotFound(file_path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Serialized tokenizer definitions are JSON objects; protobuf models are not
fn looks_like_json(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'{')
}

/// Accept a model file or a directory holding `tokenizer.json` or, failing
/// that, `tokenizer.model`
pub(crate) fn resolve_model_path(path: &Path) -> PathBuf {
    if !path.is_dir() {
        return path.to_path_buf();
    }
    let json = path.join(TOKENIZER_JSON_FILE);
    let native = path.join(SENTENCEPIECE_MODEL_FILE);
    if !json.is_file() && native.is_file() {
        native
    } else {
        json
    }
}

impl Encoder for HuggingFaceEngine {
    fn encode_as_pieces(&self, input: &str) -> Result<Vec<String>> {
        self.tokenizer
            .encode(input, self.config.add_special_tokens)
            .map(|encoding| encoding.get_tokens().to_vec())
            .map_err(|e| EngineError::Encode(e.to_string()))
    }

    fn encode_as_ids(&self, input: &str) -> Result<Vec<TokenIdType>> {
        self.tokenizer
            .encode(input, self.config.add_special_tokens)
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(|e| EngineError::Encode(e.to_string()))
    }
}

impl Decoder for HuggingFaceEngine {
    fn decode(&self, ids: &[TokenIdType]) -> Result<String> {
        self.check_range(ids)?;
        self.tokenizer
            .decode(ids, self.config.skip_special_tokens)
            .map_err(|e| EngineError::Decode(e.to_string()))
    }
}

impl Engine for HuggingFaceEngine {
    fn piece_size(&self) -> usize {
        self.pieces.len()
    }

    fn piece_to_id(&self, piece: &str) -> Option<TokenIdType> {
        self.vocab.get(piece).copied()
    }

    fn id_to_piece(&self, id: TokenIdType) -> Option<&str> {
        self.pieces.get(id as usize).map(String::as_str)
    }

    fn score(&self, id: TokenIdType) -> Option<f32> {
        self.scores.get(id as usize).copied()
    }

    fn unk_id(&self) -> Option<TokenIdType> {
        self.unk_id
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
