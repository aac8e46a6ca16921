//! Fixture writers for tests that need a real model on disk.

use std::path::{Path, PathBuf};

use prost::Message;
use tokenizers::{
    models::unigram::Unigram, pre_tokenizers::metaspace::Metaspace,
    tokenizer::Tokenizer as HfTokenizer,
};

use crate::sentencepiece::{
    ModelProto, SentencePiece, TrainerSpec, MODEL_BPE, MODEL_UNIGRAM, PIECE_CONTROL,
    PIECE_NORMAL, PIECE_UNKNOWN,
};

/// `(piece, score)` in id order. Id 0 is the unknown piece.
pub const FIXTURE_VOCAB: &[(&str, f64)] = &[
    ("<unk>", 0.0),
    ("<s>", 0.0),
    ("</s>", 0.0),
    ("▁hello", -2.0),
    ("▁world", -2.5),
    ("▁test", -2.8),
    ("▁", -3.0),
    ("ing", -3.5),
    ("h", -5.0),
    ("e", -5.0),
    ("l", -5.0),
    ("o", -5.0),
    ("w", -5.1),
    ("r", -5.1),
    ("d", -5.1),
    ("t", -5.2),
    ("s", -5.2),
    ("i", -5.2),
    ("n", -5.3),
    ("g", -5.3),
    ("!", -6.0),
];

/// Build the fixture as a SentencePiece-style Unigram pipeline
pub fn unigram_tokenizer() -> std::io::Result<HfTokenizer> {
    let vocab = FIXTURE_VOCAB
        .iter()
        .map(|(piece, score)| (piece.to_string(), *score))
        .collect();
    let model = Unigram::from(vocab, Some(0), false)
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let mut tokenizer = HfTokenizer::new(model);
    tokenizer.with_pre_tokenizer(Some(Metaspace::default()));
    tokenizer.with_decoder(Some(Metaspace::default()));
    Ok(tokenizer)
}

/// Write the fixture to `dir/tokenizer.json` and return its path
pub fn write_unigram_model(dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join("tokenizer.json");
    unigram_tokenizer()?
        .save(&path, false)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(path)
}

/// BPE pieces in id order, each merge outscoring the merges built on it
pub const BPE_FIXTURE_VOCAB: &[(&str, f32)] = &[
    ("<unk>", 0.0),
    ("<s>", 0.0),
    ("</s>", 0.0),
    ("ll", -1.0),
    ("he", -2.0),
    ("hell", -3.0),
    ("hello", -4.0),
    ("▁hello", -5.0),
    ("wo", -6.0),
    ("wor", -7.0),
    ("ld", -8.0),
    ("world", -9.0),
    ("▁world", -10.0),
    ("▁", -11.0),
    ("h", -12.0),
    ("e", -13.0),
    ("l", -14.0),
    ("o", -15.0),
    ("w", -16.0),
    ("r", -17.0),
    ("d", -18.0),
];

fn model_proto(pieces: impl Iterator<Item = (&'static str, f32)>, model_type: i32) -> ModelProto {
    let pieces = pieces
        .enumerate()
        .map(|(id, (piece, score))| {
            let kind = match id {
                0 => PIECE_UNKNOWN,
                1 | 2 => PIECE_CONTROL,
                _ => PIECE_NORMAL,
            };
            SentencePiece::new(piece, score, kind)
        })
        .collect();
    ModelProto {
        pieces,
        trainer_spec: Some(TrainerSpec {
            model_type: Some(model_type),
            ..Default::default()
        }),
        normalizer_spec: None,
    }
}

/// [`FIXTURE_VOCAB`] as a native Unigram `ModelProto`
pub fn unigram_model_proto() -> ModelProto {
    model_proto(
        FIXTURE_VOCAB.iter().map(|&(piece, score)| (piece, score as f32)),
        MODEL_UNIGRAM,
    )
}

/// [`BPE_FIXTURE_VOCAB`] as a native BPE `ModelProto`
pub fn bpe_model_proto() -> ModelProto {
    model_proto(BPE_FIXTURE_VOCAB.iter().copied(), MODEL_BPE)
}

/// Serialize `proto` to `dir/tokenizer.model` and return its path
pub fn write_sentencepiece_model(dir: &Path, proto: &ModelProto) -> std::io::Result<PathBuf> {
    let path = dir.join("tokenizer.model");
    std::fs::write(&path, proto.encode_to_vec())?;
    Ok(path)
}
