//! Native SentencePiece `.model` files.
//!
//! The protobuf is decoded with `prost` and rewritten as a `tokenizers`
//! pipeline: Unigram or BPE model, Metaspace pre-tokenizer and decoder, and
//! the normalizer steps the model asks for. Only the fields needed for that
//! are declared; everything else in the file is skipped on decode.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use prost::Message;
use serde_json::{json, Value};

use crate::traits::TokenIdType;

const SPACE_MARKER: &str = "\u{2581}";

// SentencePiece.Type
pub const PIECE_NORMAL: i32 = 1;
pub const PIECE_UNKNOWN: i32 = 2;
pub const PIECE_CONTROL: i32 = 3;
pub const PIECE_USER_DEFINED: i32 = 4;

// TrainerSpec.ModelType
pub const MODEL_UNIGRAM: i32 = 1;
pub const MODEL_BPE: i32 = 2;

#[derive(Clone, PartialEq, Message)]
pub struct ModelProto {
    #[prost(message, repeated, tag = "1")]
    pub pieces: Vec<SentencePiece>,
    #[prost(message, optional, tag = "2")]
    pub trainer_spec: Option<TrainerSpec>,
    #[prost(message, optional, tag = "3")]
    pub normalizer_spec: Option<NormalizerSpec>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SentencePiece {
    #[prost(string, optional, tag = "1")]
    pub piece: Option<String>,
    #[prost(float, optional, tag = "2")]
    pub score: Option<f32>,
    #[prost(int32, optional, tag = "3")]
    pub r#type: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TrainerSpec {
    #[prost(int32, optional, tag = "3")]
    pub model_type: Option<i32>,
    #[prost(bool, optional, tag = "35")]
    pub byte_fallback: Option<bool>,
    #[prost(int32, optional, tag = "40")]
    pub unk_id: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct NormalizerSpec {
    #[prost(bytes = "vec", optional, tag = "2")]
    pub precompiled_charsmap: Option<Vec<u8>>,
    #[prost(bool, optional, tag = "3")]
    pub add_dummy_prefix: Option<bool>,
    #[prost(bool, optional, tag = "4")]
    pub remove_extra_whitespaces: Option<bool>,
}

impl SentencePiece {
    pub fn new(piece: &str, score: f32, kind: i32) -> Self {
        Self {
            piece: Some(piece.to_string()),
            score: Some(score),
            r#type: Some(kind),
        }
    }

    fn text(&self) -> &str {
        self.piece.as_deref().unwrap_or_default()
    }

    fn kind(&self) -> i32 {
        self.r#type.unwrap_or(PIECE_NORMAL)
    }
}

/// Segmentation algorithm recorded in the trainer spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Unigram,
    Bpe,
}

/// A decoded `.model` file
#[derive(Debug, Clone)]
pub struct SentencePieceModel {
    proto: ModelProto,
}

impl SentencePieceModel {
    /// Decode a serialized `ModelProto`. The error is a human readable reason.
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let proto = ModelProto::decode(bytes).map_err(|e| e.to_string())?;
        if proto.pieces.is_empty() {
            return Err("model contains no pieces".to_string());
        }
        Ok(Self { proto })
    }

    pub fn from_proto(proto: ModelProto) -> Self {
        Self { proto }
    }

    pub fn kind(&self) -> Result<ModelKind, String> {
        let model_type = self
            .proto
            .trainer_spec
            .as_ref()
            .and_then(|spec| spec.model_type)
            .unwrap_or(MODEL_UNIGRAM);
        match model_type {
            MODEL_UNIGRAM => Ok(ModelKind::Unigram),
            MODEL_BPE => Ok(ModelKind::Bpe),
            other => Err(format!("model type {other} is not supported, expected Unigram or BPE")),
        }
    }

    pub fn piece_size(&self) -> usize {
        self.proto.pieces.len()
    }

    /// Scores in id order
    pub fn scores(&self) -> Vec<f32> {
        self.proto
            .pieces
            .iter()
            .map(|p| p.score.unwrap_or(0.0))
            .collect()
    }

    /// The piece typed UNKNOWN, else the trainer's `unk_id` if it is in range
    pub fn unk_id(&self) -> Option<TokenIdType> {
        let typed = self
            .proto
            .pieces
            .iter()
            .position(|p| p.kind() == PIECE_UNKNOWN);
        let declared = || {
            let id = self
                .proto
                .trainer_spec
                .as_ref()
                .and_then(|spec| spec.unk_id)
                .unwrap_or(0);
            usize::try_from(id).ok().filter(|&id| id < self.piece_size())
        };
        typed
            .or_else(declared)
            .and_then(|id| TokenIdType::try_from(id).ok())
    }

    fn byte_fallback(&self) -> bool {
        self.proto
            .trainer_spec
            .as_ref()
            .and_then(|spec| spec.byte_fallback)
            .unwrap_or(false)
    }

    /// Render the model as a `tokenizer.json` document
    pub fn to_tokenizer_json(&self) -> Result<Value, String> {
        let model = match self.kind()? {
            ModelKind::Unigram => self.unigram_json(),
            ModelKind::Bpe => self.bpe_json(),
        };

        let normalizer = self.normalizer_json();
        let prepend_scheme = if self.add_dummy_prefix() { "always" } else { "never" };
        let metaspace = json!({
            "type": "Metaspace",
            "replacement": SPACE_MARKER,
            "prepend_scheme": prepend_scheme,
            "split": true,
        });

        Ok(json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": self.added_tokens_json(),
            "normalizer": normalizer,
            "pre_tokenizer": metaspace.clone(),
            "post_processor": null,
            "decoder": metaspace,
            "model": model,
        }))
    }

    fn add_dummy_prefix(&self) -> bool {
        self.proto
            .normalizer_spec
            .as_ref()
            .and_then(|spec| spec.add_dummy_prefix)
            .unwrap_or(true)
    }

    fn unigram_json(&self) -> Value {
        let vocab: Vec<Value> = self
            .proto
            .pieces
            .iter()
            .map(|p| json!([p.text(), p.score.unwrap_or(0.0) as f64]))
            .collect();
        json!({
            "type": "Unigram",
            "unk_id": self.unk_id(),
            "vocab": vocab,
            "byte_fallback": self.byte_fallback(),
        })
    }

    fn bpe_json(&self) -> Value {
        let vocab: serde_json::Map<String, Value> = self
            .proto
            .pieces
            .iter()
            .enumerate()
            .map(|(id, p)| (p.text().to_string(), json!(id)))
            .collect();
        let merges: Vec<Value> = self
            .bpe_merges()
            .into_iter()
            .map(|(left, right)| json!([left, right]))
            .collect();
        let unk_token = self
            .unk_id()
            .and_then(|id| self.proto.pieces.get(id as usize))
            .map(|p| p.text().to_string());

        json!({
            "type": "BPE",
            "dropout": null,
            "unk_token": unk_token,
            "continuing_subword_prefix": null,
            "end_of_word_suffix": null,
            "fuse_unk": true,
            "byte_fallback": self.byte_fallback(),
            "ignore_merges": false,
            "vocab": vocab,
            "merges": merges,
        })
    }

    /// SentencePiece BPE stores no merge table. Every split of a piece into two
    /// other pieces is a merge, ranked by the merged piece's score.
    fn bpe_merges(&self) -> Vec<(String, String)> {
        let ids: HashMap<&str, usize> = self
            .proto
            .pieces
            .iter()
            .enumerate()
            .filter(|(_, p)| matches!(p.kind(), PIECE_NORMAL | PIECE_USER_DEFINED))
            .map(|(id, p)| (p.text(), id))
            .collect();

        let mut ranked = Vec::new();
        for (id, piece) in self.proto.pieces.iter().enumerate() {
            if piece.kind() != PIECE_NORMAL {
                continue;
            }
            let text = piece.text();
            for (split, _) in text.char_indices().skip(1) {
                let (left, right) = text.split_at(split);
                if let (Some(&l), Some(&r)) = (ids.get(left), ids.get(right)) {
                    ranked.push((piece.score.unwrap_or(0.0), id, l, r, left, right));
                }
            }
        }

        ranked.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
                .then(a.3.cmp(&b.3))
        });
        ranked
            .into_iter()
            .map(|(_, _, _, _, left, right)| (left.to_string(), right.to_string()))
            .collect()
    }

    /// Control pieces never appear in segmented text and are dropped on
    /// decode. User-defined pieces are matched verbatim.
    fn added_tokens_json(&self) -> Vec<Value> {
        self.proto
            .pieces
            .iter()
            .enumerate()
            .filter(|(_, p)| matches!(p.kind(), PIECE_CONTROL | PIECE_USER_DEFINED))
            .map(|(id, p)| {
                json!({
                    "id": id,
                    "content": p.text(),
                    "single_word": false,
                    "lstrip": false,
                    "rstrip": false,
                    "normalized": false,
                    "special": p.kind() == PIECE_CONTROL,
                })
            })
            .collect()
    }

    fn normalizer_json(&self) -> Value {
        let spec = self.proto.normalizer_spec.as_ref();
        let mut steps = Vec::new();

        if let Some(charsmap) = spec
            .and_then(|s| s.precompiled_charsmap.as_deref())
            .filter(|map| !map.is_empty())
        {
            steps.push(json!({
                "type": "Precompiled",
                "precompiled_charsmap": STANDARD.encode(charsmap),
            }));
        }

        if spec
            .and_then(|s| s.remove_extra_whitespaces)
            .unwrap_or(true)
        {
            steps.push(json!({ "type": "Strip", "strip_left": true, "strip_right": true }));
            steps.push(json!({
                "type": "Replace",
                "pattern": { "Regex": " {2,}" },
                "content": " ",
            }));
        }

        if steps.is_empty() {
            Value::Null
        } else {
            json!({ "type": "Sequence", "normalizers": steps })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proto(pieces: &[(&str, f32, i32)], model_type: i32) -> ModelProto {
        ModelProto {
            pieces: pieces
                .iter()
                .map(|&(piece, score, kind)| SentencePiece::new(piece, score, kind))
                .collect(),
            trainer_spec: Some(TrainerSpec {
                model_type: Some(model_type),
                ..Default::default()
            }),
            normalizer_spec: None,
        }
    }

    #[test]
    fn test_decode_minimal_model() {
        // One piece: "<unk>" with score 0.0
        let bytes = [
            0x0a, 0x0c, 0x0a, 0x05, b'<', b'u', b'n', b'k', b'>', 0x15, 0x00, 0x00, 0x00, 0x00,
        ];
        let model = SentencePieceModel::decode(&bytes).unwrap();
        assert_eq!(model.piece_size(), 1);
        assert_eq!(model.scores(), vec![0.0]);
        assert_eq!(model.kind().unwrap(), ModelKind::Unigram);
    }

    #[test]
    fn test_decode_rejects_garbage_and_empty() {
        assert!(SentencePieceModel::decode(b"not a model").is_err());
        assert!(SentencePieceModel::decode(&[]).is_err());
    }

    #[test]
    fn test_unk_id_prefers_typed_piece() {
        let mut p = proto(
            &[
                ("<s>", 0.0, PIECE_CONTROL),
                ("<unk>", 0.0, PIECE_UNKNOWN),
                ("a", -1.0, PIECE_NORMAL),
            ],
            MODEL_UNIGRAM,
        );
        assert_eq!(SentencePieceModel::from_proto(p.clone()).unk_id(), Some(1));

        p.pieces[1].r#type = Some(PIECE_NORMAL);
        p.trainer_spec.as_mut().unwrap().unk_id = Some(2);
        assert_eq!(SentencePieceModel::from_proto(p.clone()).unk_id(), Some(2));

        p.trainer_spec.as_mut().unwrap().unk_id = Some(-1);
        assert_eq!(SentencePieceModel::from_proto(p).unk_id(), None);
    }

    #[test]
    fn test_bpe_merges_ranked_by_merged_score() {
        let p = proto(
            &[
                ("<unk>", 0.0, PIECE_UNKNOWN),
                ("ab", -1.0, PIECE_NORMAL),
                ("abc", -2.0, PIECE_NORMAL),
                ("a", -3.0, PIECE_NORMAL),
                ("b", -4.0, PIECE_NORMAL),
                ("c", -5.0, PIECE_NORMAL),
            ],
            MODEL_BPE,
        );
        let merges = SentencePieceModel::from_proto(p).bpe_merges();
        assert_eq!(
            merges,
            vec![
                ("a".to_string(), "b".to_string()),
                ("ab".to_string(), "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_unsupported_model_type() {
        let p = proto(&[("<unk>", 0.0, PIECE_UNKNOWN)], 3);
        let err = SentencePieceModel::from_proto(p).to_tokenizer_json().unwrap_err();
        assert!(err.contains("model type 3"), "{err}");
    }

    #[test]
    fn test_tokenizer_json_shape() {
        let p = proto(
            &[
                ("<unk>", 0.0, PIECE_UNKNOWN),
                ("<s>", 0.0, PIECE_CONTROL),
                ("▁a", -1.0, PIECE_NORMAL),
            ],
            MODEL_UNIGRAM,
        );
        let doc = SentencePieceModel::from_proto(p).to_tokenizer_json().unwrap();
        assert_eq!(doc["model"]["type"], "Unigram");
        assert_eq!(doc["model"]["unk_id"], 0);
        assert_eq!(doc["pre_tokenizer"]["prepend_scheme"], "always");
        assert_eq!(doc["added_tokens"][0]["content"], "<s>");
        assert_eq!(doc["added_tokens"][0]["special"], true);
        assert_eq!(doc["normalizer"]["normalizers"][0]["type"], "Strip");
    }
}
