use std::any::Any;

use crate::error::Result;

/// Token id as produced by the engine
pub type TokenIdType = u32;

/// Turns text into pieces or ids
pub trait Encoder: Send + Sync {
    /// Segment `input` into vocabulary pieces
    fn encode_as_pieces(&self, input: &str) -> Result<Vec<String>>;

    /// Segment `input` into vocabulary ids
    fn encode_as_ids(&self, input: &str) -> Result<Vec<TokenIdType>>;
}

/// Turns ids back into text
pub trait Decoder: Send + Sync {
    /// Reconstruct text from `ids`.
    ///
    /// Fails when any id lies outside `[0, piece_size)`.
    fn decode(&self, ids: &[TokenIdType]) -> Result<String>;
}

/// The capability set of a loaded tokenizer model.
///
/// Loading is not part of the trait; adapters expose their own constructors
/// and [`crate::create_engine_from_file`] picks one.
pub trait Engine: Encoder + Decoder {
    /// Fixed vocabulary cardinality
    fn piece_size(&self) -> usize;

    /// Exact-match lookup of a piece
    fn piece_to_id(&self, piece: &str) -> Option<TokenIdType>;

    /// Piece text for `id`, `None` when out of range
    fn id_to_piece(&self, id: TokenIdType) -> Option<&str>;

    /// Log-probability-like score for `id`, `None` when out of range.
    ///
    /// Models that carry no scores report `Some(0.0)` for valid ids.
    fn score(&self, id: TokenIdType) -> Option<f32>;

    /// Id of the unknown piece, if the model defines one
    fn unk_id(&self) -> Option<TokenIdType>;

    fn as_any(&self) -> &dyn Any;
}
