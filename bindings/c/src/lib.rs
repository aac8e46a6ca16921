//! FFI module exposing a SentencePiece-style tokenizer to C-compatible
//! languages (C, Swift, cgo, ...)
//!
//! This module provides C-compatible function signatures for:
//! - Processor lifecycle (create, destroy)
//! - Encoding text to pieces or ids
//! - Vocabulary lookups (piece/id conversion, scores, size)
//! - Decoding ids back to text
//! - Releasing every buffer handed to the caller
//!
//! Plain functions report failure through sentinels (null, 0, -1, 0.0). The
//! `_ex` variants return an [`SpmStatus`] and an optional error message.
//!
//! # Safety
//! All functions marked with `#[no_mangle]` and `extern "C"` must be called
//! with valid pointers and follow the documented memory management rules.

// Re-export decode functions
pub use decode::{sentencepiece_decode_ids, sentencepiece_decode_ids_ex};
// Re-export encode functions
pub use encode::{
    sentencepiece_encode_as_ids, sentencepiece_encode_as_ids_ex, sentencepiece_encode_as_pieces,
    sentencepiece_encode_as_pieces_ex,
};
// Re-export error types
pub use error::{BridgeError, SpmStatus};
// Re-export logging setup
pub use logging::{init_logging, sentencepiece_init_logging, LOG_ENV_VAR};
// Re-export memory management functions
pub use memory::{sentencepiece_free_ids, sentencepiece_free_pieces, sentencepiece_free_string};
// Re-export processor lifecycle functions
pub use processor::{
    sentencepiece_create, sentencepiece_create_ex, sentencepiece_destroy,
    sentencepiece_free_processor,
};
pub use registry::ProcessorHandle;
// Re-export vocabulary functions
pub use vocab::{
    sentencepiece_get_piece_size, sentencepiece_get_score, sentencepiece_id_to_piece,
    sentencepiece_id_to_piece_copy, sentencepiece_id_to_piece_into, sentencepiece_piece_to_id,
    sentencepiece_unk_id,
};

// Sub-modules
pub mod client;
mod decode;
mod encode;
mod error;
mod logging;
mod memory;
mod owned;
mod processor;
pub mod registry;
mod scratch;
mod utils;
mod vocab;
