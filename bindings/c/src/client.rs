//! Safe Rust client over the C surface
//!
//! [`SentencePieceProcessor`] drives the exported functions the way a C host
//! would: it owns one handle and destroys it on drop. Every buffer it receives
//! is taken back into its [`crate::owned`] type, whose destructor performs the
//! same release as the exported free functions. Loading skips the message
//! round trip of `sentencepiece_create_ex` to keep the typed error.

use std::{
    ffi::CString,
    os::raw::{c_char, c_int},
    path::Path,
    ptr,
};

use spm_tokenizer::Processor;

use crate::{
    decode::sentencepiece_decode_ids_ex,
    encode::{sentencepiece_encode_as_ids_ex, sentencepiece_encode_as_pieces_ex},
    error::{BridgeError, SpmStatus},
    owned::{OwnedIdArray, OwnedPieceList, OwnedString},
    processor::{create_impl, sentencepiece_destroy},
    registry::{self, ProcessorHandle},
    vocab::{
        sentencepiece_get_piece_size, sentencepiece_get_score, sentencepiece_id_to_piece_copy,
        sentencepiece_piece_to_id, sentencepiece_unk_id,
    },
};

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Owner of one live processor handle
#[derive(Debug)]
pub struct SentencePieceProcessor {
    handle: ProcessorHandle,
}

// The handle is a registry key, and the registry is thread-safe
unsafe impl Send for SentencePieceProcessor {}
unsafe impl Sync for SentencePieceProcessor {}

/// Take ownership of a library-allocated string
unsafe fn take_string(raw: *mut c_char) -> String {
    OwnedString::from_raw(raw)
        .map(|owned| owned.as_c_str().to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A negative count from the C side means nothing was returned
fn returned_len(count: c_int) -> usize {
    usize::try_from(count).unwrap_or(0)
}

/// Turn an `_ex` status and its message into a `Result`
unsafe fn check(status: SpmStatus, error: *mut c_char) -> Result<()> {
    let message = take_string(error);
    match status {
        SpmStatus::Success => Ok(()),
        status => Err(BridgeError::Status { status, message }),
    }
}

fn c_string(text: &str, what: &'static str) -> Result<CString> {
    CString::new(text).map_err(|_| {
        tracing::debug!(what, "Rejecting input with interior NUL");
        BridgeError::InteriorNul
    })
}

impl SentencePieceProcessor {
    /// Load a model from a `tokenizer.json` or `.model` file, or a directory
    /// holding one
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let c_path = c_string(&path.to_string_lossy(), "model path")?;
        let handle = unsafe { create_impl(c_path.as_ptr()) }?;
        Ok(Self { handle })
    }

    /// Wrap an already loaded engine
    pub fn from_processor(processor: Processor) -> Self {
        Self {
            handle: registry::register(processor),
        }
    }

    /// Raw handle for passing to the C functions directly. It stays owned by
    /// `self`.
    pub fn handle(&self) -> ProcessorHandle {
        self.handle
    }

    /// Segment `text` into pieces
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let text = c_string(text, "text")?;
        let mut pieces: *mut *mut c_char = ptr::null_mut();
        let mut count: c_int = 0;
        let mut error: *mut c_char = ptr::null_mut();

        unsafe {
            let status = sentencepiece_encode_as_pieces_ex(
                self.handle,
                text.as_ptr(),
                &mut pieces,
                &mut count,
                &mut error,
            );
            check(status, error)?;
            let pieces = OwnedPieceList::from_raw(pieces, returned_len(count));
            Ok(pieces
                .iter()
                .map(|piece| piece.to_string_lossy().into_owned())
                .collect())
        }
    }

    /// Segment `text` into ids
    pub fn encode(&self, text: &str) -> Result<Vec<i32>> {
        let text = c_string(text, "text")?;
        let mut ids: *mut c_int = ptr::null_mut();
        let mut count: c_int = 0;
        let mut error: *mut c_char = ptr::null_mut();

        unsafe {
            let status = sentencepiece_encode_as_ids_ex(
                self.handle,
                text.as_ptr(),
                &mut ids,
                &mut count,
                &mut error,
            );
            check(status, error)?;
            let ids = OwnedIdArray::from_raw(ids, returned_len(count));
            Ok(ids.as_slice().to_vec())
        }
    }

    /// Reconstruct text from ids
    pub fn decode(&self, ids: &[i32]) -> Result<String> {
        let count = crate::utils::count_to_c_int(ids.len())?;
        let mut text: *mut c_char = ptr::null_mut();
        let mut error: *mut c_char = ptr::null_mut();

        unsafe {
            let status =
                sentencepiece_decode_ids_ex(self.handle, ids.as_ptr(), count, &mut text, &mut error);
            check(status, error)?;
            Ok(take_string(text))
        }
    }

    /// Exact id of `token`, `None` when the handle is gone or nothing matches
    /// (not even an unknown piece)
    pub fn convert_token_to_id(&self, token: &str) -> Option<i32> {
        let token = CString::new(token).ok()?;
        let id = unsafe { sentencepiece_piece_to_id(self.handle, token.as_ptr()) };
        (id >= 0).then_some(id)
    }

    /// Piece text for `id`, `None` for ids outside the vocabulary
    pub fn convert_id_to_token(&self, id: i32) -> Option<String> {
        let raw = sentencepiece_id_to_piece_copy(self.handle, id);
        if raw.is_null() {
            return None;
        }
        Some(unsafe { take_string(raw) })
    }

    pub fn vocab_size(&self) -> usize {
        usize::try_from(sentencepiece_get_piece_size(self.handle)).unwrap_or(0)
    }

    pub fn score(&self, id: i32) -> f32 {
        sentencepiece_get_score(self.handle, id)
    }

    pub fn unknown_token_id(&self) -> Option<i32> {
        let id = sentencepiece_unk_id(self.handle);
        (id >= 0).then_some(id)
    }

    pub fn unknown_token(&self) -> Option<String> {
        self.unknown_token_id()
            .and_then(|id| self.convert_id_to_token(id))
    }
}

impl Drop for SentencePieceProcessor {
    fn drop(&mut self) {
        sentencepiece_destroy(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use spm_tokenizer::{mock::MockEngine, testing};

    use super::*;

    #[test]
    fn test_open_fixture() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_unigram_model(dir.path()).unwrap();

        let processor = SentencePieceProcessor::open(dir.path()).unwrap();
        assert_eq!(processor.vocab_size(), testing::FIXTURE_VOCAB.len());
        assert_eq!(processor.tokenize("hello world").unwrap(), vec!["▁hello", "▁world"]);

        let ids = processor.encode("hello world").unwrap();
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(processor.decode(&ids).unwrap(), "hello world");
    }

    #[test]
    fn test_open_missing_model() {
        let err = SentencePieceProcessor::open("/nonexistent/tokenizer.json").unwrap_err();
        assert_eq!(err.status(), SpmStatus::NotFound);
    }

    #[test]
    fn test_drop_destroys_handle() {
        let processor = SentencePieceProcessor::from_processor(Processor::from(MockEngine::new()));
        let handle = processor.handle();
        assert!(registry::is_live(handle));
        drop(processor);
        assert!(!registry::is_live(handle));
    }

    #[test]
    fn test_lookups() {
        let processor = SentencePieceProcessor::from_processor(Processor::from(MockEngine::new()));
        assert_eq!(processor.convert_token_to_id("▁world"), Some(4));
        assert_eq!(processor.convert_token_to_id("▁zebra"), Some(0));
        assert_eq!(processor.convert_id_to_token(4).as_deref(), Some("▁world"));
        assert_eq!(processor.convert_id_to_token(999), None);
        assert_eq!(processor.unknown_token_id(), Some(0));
        assert_eq!(processor.unknown_token().as_deref(), Some("<unk>"));
        assert_eq!(processor.score(4), -4.0);
    }

    #[test]
    fn test_lookups_without_unk_piece() {
        let processor =
            SentencePieceProcessor::from_processor(Processor::from(MockEngine::without_unk()));
        assert_eq!(processor.convert_token_to_id("▁world"), Some(4));
        assert_eq!(processor.convert_token_to_id("▁zebra"), None);
        assert_eq!(processor.unknown_token_id(), None);
        assert_eq!(processor.unknown_token(), None);

        let err = processor.encode("Hello zebra").unwrap_err();
        assert_eq!(err.status(), SpmStatus::EncodeError);
    }

    #[test]
    fn test_open_native_model() {
        let dir = tempfile::tempdir().unwrap();
        let path =
            testing::write_sentencepiece_model(dir.path(), &testing::unigram_model_proto()).unwrap();

        let processor = SentencePieceProcessor::open(&path).unwrap();
        assert_eq!(processor.tokenize("hello world").unwrap(), vec!["▁hello", "▁world"]);
        assert_eq!(processor.encode("hello world").unwrap(), vec![3, 4]);
        assert_eq!(processor.decode(&[3, 4]).unwrap(), "hello world");
        assert_eq!(processor.score(3), -2.0);
        assert_eq!(processor.unknown_token().as_deref(), Some("<unk>"));
    }

    #[test]
    fn test_empty_and_failure_are_distinct() {
        let ok = SentencePieceProcessor::from_processor(Processor::from(MockEngine::new()));
        assert!(ok.encode("").unwrap().is_empty());
        assert!(ok.tokenize("").unwrap().is_empty());
        assert_eq!(ok.decode(&[]).unwrap(), "");

        let failing = SentencePieceProcessor::from_processor(Processor::from(MockEngine::failing()));
        let err = failing.encode("Hello").unwrap_err();
        assert_eq!(err.status(), SpmStatus::EncodeError);
        assert!(err.to_string().contains("mock engine"), "{err}");
    }

    #[test]
    fn test_decode_out_of_range() {
        let processor = SentencePieceProcessor::from_processor(Processor::from(MockEngine::new()));
        let err = processor.decode(&[3, 999]).unwrap_err();
        assert_eq!(err.status(), SpmStatus::OutOfRange);
    }

    #[test]
    fn test_interior_nul_input() {
        let processor = SentencePieceProcessor::from_processor(Processor::from(MockEngine::new()));
        let err = processor.encode("a\0b").unwrap_err();
        assert_eq!(err.status(), SpmStatus::InvalidArgument);
        assert_eq!(processor.convert_token_to_id("a\0b"), None);
    }
}
