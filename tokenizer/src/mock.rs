//! Mock engine for testing
//!
//! Whitespace segmentation over a fixed vocabulary. Words are prefixed with
//! the SentencePiece space marker, unknown words map to `<unk>` unless the
//! engine was built [`MockEngine::without_unk`].

use std::collections::HashMap;

use crate::{
    error::{EngineError, Result},
    traits::{Decoder, Encoder, Engine, TokenIdType},
};

pub const SPACE_MARKER: char = '\u{2581}';

const VOCAB: &[&str] = &[
    "<unk>", "<s>", "</s>", "▁Hello", "▁world", "▁hello", "▁test", "▁the", "▁quick", "▁brown",
    "▁fox",
];
const UNK_ID: TokenIdType = 0;
const CONTROL_IDS: &[TokenIdType] = &[1, 2];

pub struct MockEngine {
    vocab: HashMap<String, TokenIdType>,
    unk: Option<TokenIdType>,
    failing: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        let vocab = VOCAB
            .iter()
            .enumerate()
            .map(|(id, piece)| (piece.to_string(), id as TokenIdType))
            .collect();
        Self {
            vocab,
            unk: Some(UNK_ID),
            failing: false,
        }
    }

    /// An engine with no unknown piece; out-of-vocabulary words fail to encode
    pub fn without_unk() -> Self {
        Self {
            unk: None,
            ..Self::new()
        }
    }

    /// An engine whose encode and decode calls always fail
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    fn segment(&self, input: &str) -> Result<Vec<(String, TokenIdType)>> {
        if self.failing {
            return Err(EngineError::Encode("mock engine configured to fail".into()));
        }
        input
            .split_whitespace()
            .map(|word| {
                let piece = format!("{SPACE_MARKER}{word}");
                let id = self
                    .vocab
                    .get(&piece)
                    .copied()
                    .or(self.unk)
                    .ok_or_else(|| EngineError::Encode(format!("no piece for {word:?}")))?;
                Ok((piece, id))
            })
            .collect()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for MockEngine {
    fn encode_as_pieces(&self, input: &str) -> Result<Vec<String>> {
        Ok(self.segment(input)?.into_iter().map(|(p, _)| p).collect())
    }

    fn encode_as_ids(&self, input: &str) -> Result<Vec<TokenIdType>> {
        Ok(self.segment(input)?.into_iter().map(|(_, id)| id).collect())
    }
}

impl Decoder for MockEngine {
    fn decode(&self, ids: &[TokenIdType]) -> Result<String> {
        if self.failing {
            return Err(EngineError::Decode("mock engine configured to fail".into()));
        }

        let mut text = String::new();
        for &id in ids {
            if CONTROL_IDS.contains(&id) {
                continue;
            }
            if Some(id) == self.unk {
                text.push_str(" \u{2047}");
                continue;
            }
            let piece = VOCAB.get(id as usize).ok_or(EngineError::IdOutOfRange {
                id,
                size: VOCAB.len(),
            })?;
            text.push_str(&piece.replace(SPACE_MARKER, " "));
        }
        Ok(text.strip_prefix(' ').unwrap_or(&text).to_string())
    }
}

impl Engine for MockEngine {
    fn piece_size(&self) -> usize {
        VOCAB.len()
    }

    fn piece_to_id(&self, piece: &str) -> Option<TokenIdType> {
        self.vocab.get(piece).copied()
    }

    fn id_to_piece(&self, id: TokenIdType) -> Option<&str> {
        VOCAB.get(id as usize).copied()
    }

    fn score(&self, id: TokenIdType) -> Option<f32> {
        if (id as usize) >= VOCAB.len() {
            return None;
        }
        if id == UNK_ID || CONTROL_IDS.contains(&id) {
            Some(0.0)
        } else {
            Some(-(id as f32))
        }
    }

    fn unk_id(&self) -> Option<TokenIdType> {
        self.unk
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
