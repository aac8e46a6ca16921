//! Vocabulary lookup FFI functions

use std::{
    ffi::CStr,
    os::raw::{c_char, c_float, c_int},
    ptr,
};

use spm_tokenizer::{Processor, TokenIdType};
use tracing::debug;

use crate::{
    owned::OwnedString,
    registry::{self, ProcessorHandle},
    scratch,
};

fn processor_or_log(processor: ProcessorHandle, operation: &'static str) -> Option<Processor> {
    registry::lookup(processor)
        .map_err(|e| debug!(operation, error = %e, "Rejected vocabulary lookup"))
        .ok()
}

/// Piece text for `id`, `None` for negative or out-of-range ids
fn piece_for_id(processor: &Processor, id: c_int) -> Option<&str> {
    let id = TokenIdType::try_from(id).ok()?;
    processor.id_to_piece(id)
}

fn id_to_c_int(id: TokenIdType) -> c_int {
    c_int::try_from(id).unwrap_or(-1)
}

/// Number of pieces in the vocabulary
///
/// # Returns
/// * The vocabulary size, or 0 for a null or destroyed handle
#[no_mangle]
pub extern "C" fn sentencepiece_get_piece_size(processor: ProcessorHandle) -> c_int {
    processor_or_log(processor, "get_piece_size")
        .map(|p| c_int::try_from(p.piece_size()).unwrap_or(c_int::MAX))
        .unwrap_or(0)
}

/// Id of the unknown piece
///
/// # Returns
/// * The unknown-piece id, or -1 if the model has none or the handle is invalid
#[no_mangle]
pub extern "C" fn sentencepiece_unk_id(processor: ProcessorHandle) -> c_int {
    processor_or_log(processor, "unk_id")
        .and_then(|p| p.unk_id())
        .map(id_to_c_int)
        .unwrap_or(-1)
}

/// Look up the id of an exact piece
///
/// # Arguments
/// * `processor` - Processor handle
/// * `piece` - Piece text (NUL-terminated UTF-8)
///
/// # Returns
/// * The piece id. Pieces outside the vocabulary map to the unknown-piece id
///   (-1 if the model has none). -1 for a null handle or piece.
///
/// # Safety
/// `piece` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_piece_to_id(
    processor: ProcessorHandle,
    piece: *const c_char,
) -> c_int {
    if piece.is_null() {
        return -1;
    }
    let Some(processor) = processor_or_log(processor, "piece_to_id") else {
        return -1;
    };

    // Bytes that are not UTF-8 cannot name a piece
    let found = CStr::from_ptr(piece)
        .to_str()
        .ok()
        .and_then(|piece| processor.piece_to_id(piece));

    found.or_else(|| processor.unk_id()).map(id_to_c_int).unwrap_or(-1)
}

/// Piece text for `id` as a borrowed view
///
/// The view points into a buffer owned by the calling thread. The next call
/// to this function on the same thread overwrites it, so copy the text out
/// before calling again. Never free it.
///
/// # Returns
/// * The piece, "" for negative or out-of-range ids, null for a null or
///   destroyed handle
#[no_mangle]
pub extern "C" fn sentencepiece_id_to_piece(processor: ProcessorHandle, id: c_int) -> *const c_char {
    let Some(processor) = processor_or_log(processor, "id_to_piece") else {
        return ptr::null();
    };
    scratch::stage_piece(piece_for_id(&processor, id).unwrap_or(""))
}

/// Piece text for `id` as an owned string
///
/// # Returns
/// * A string to release with `sentencepiece_free_string`; null for a null or
///   destroyed handle, negative or out-of-range ids
#[no_mangle]
pub extern "C" fn sentencepiece_id_to_piece_copy(processor: ProcessorHandle, id: c_int) -> *mut c_char {
    let Some(processor) = processor_or_log(processor, "id_to_piece_copy") else {
        return ptr::null_mut();
    };
    piece_for_id(&processor, id)
        .and_then(|piece| OwnedString::new(piece).ok())
        .map(OwnedString::into_raw)
        .unwrap_or(ptr::null_mut())
}

/// Copy the piece text for `id` into a caller buffer
///
/// Works like `snprintf`: at most `buf_len - 1` bytes are written followed by
/// a NUL, and the full piece length is returned so callers can detect
/// truncation. A null `buf` or zero `buf_len` only measures.
///
/// # Returns
/// * The piece length in bytes (0 for negative or out-of-range ids), -1 for a
///   null or destroyed handle
///
/// # Safety
/// `buf` must be null or valid for `buf_len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_id_to_piece_into(
    processor: ProcessorHandle,
    id: c_int,
    buf: *mut c_char,
    buf_len: usize,
) -> c_int {
    let Some(processor) = processor_or_log(processor, "id_to_piece_into") else {
        return -1;
    };
    let bytes = piece_for_id(&processor, id).unwrap_or("").as_bytes();

    if !buf.is_null() && buf_len > 0 {
        let written = bytes.len().min(buf_len - 1);
        ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buf, written);
        buf.add(written).write(0);
    }
    c_int::try_from(bytes.len()).unwrap_or(c_int::MAX)
}

/// Score of the piece `id`
///
/// # Returns
/// * The engine's score, 0.0 for a null or destroyed handle, negative or
///   out-of-range ids
#[no_mangle]
pub extern "C" fn sentencepiece_get_score(processor: ProcessorHandle, id: c_int) -> c_float {
    let Some(processor) = processor_or_log(processor, "get_score") else {
        return 0.0;
    };
    TokenIdType::try_from(id)
        .ok()
        .and_then(|id| processor.score(id))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use spm_tokenizer::mock::MockEngine;

    use super::*;
    use crate::memory::sentencepiece_free_string;

    fn mock_handle() -> ProcessorHandle {
        registry::register(Processor::from(MockEngine::new()))
    }

    fn read(ptr: *const c_char) -> String {
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
    }

    #[test]
    fn test_piece_size() {
        let handle = mock_handle();
        assert_eq!(sentencepiece_get_piece_size(handle), 11);
        registry::release(handle);
        assert_eq!(sentencepiece_get_piece_size(handle), 0);
        assert_eq!(sentencepiece_get_piece_size(ptr::null_mut()), 0);
    }

    #[test]
    fn test_piece_to_id() {
        let handle = mock_handle();
        let world = CString::new("▁world").unwrap();
        let missing = CString::new("▁zebra").unwrap();

        unsafe {
            assert_eq!(sentencepiece_piece_to_id(handle, world.as_ptr()), 4);
            // OOV resolves to the unknown piece
            assert_eq!(sentencepiece_piece_to_id(handle, missing.as_ptr()), 0);
            assert_eq!(sentencepiece_piece_to_id(handle, ptr::null()), -1);
            assert_eq!(sentencepiece_piece_to_id(ptr::null_mut(), world.as_ptr()), -1);
        }
        registry::release(handle);
    }

    #[test]
    fn test_piece_to_id_without_unk_piece() {
        let handle = registry::register(Processor::from(MockEngine::without_unk()));
        let world = CString::new("▁world").unwrap();
        let missing = CString::new("▁zebra").unwrap();

        unsafe {
            assert_eq!(sentencepiece_piece_to_id(handle, world.as_ptr()), 4);
            assert_eq!(sentencepiece_piece_to_id(handle, missing.as_ptr()), -1);
        }
        assert_eq!(sentencepiece_unk_id(handle), -1);
        registry::release(handle);
    }

    #[test]
    fn test_piece_to_id_invalid_utf8_is_oov() {
        let handle = mock_handle();
        let bytes = CString::new(vec![0xff, 0xfe]).unwrap();
        assert_eq!(unsafe { sentencepiece_piece_to_id(handle, bytes.as_ptr()) }, 0);
        registry::release(handle);
    }

    #[test]
    fn test_unk_id() {
        let handle = mock_handle();
        assert_eq!(sentencepiece_unk_id(handle), 0);
        registry::release(handle);
        assert_eq!(sentencepiece_unk_id(handle), -1);
    }

    #[test]
    fn test_id_to_piece_sentinels() {
        let handle = mock_handle();
        assert_eq!(read(sentencepiece_id_to_piece(handle, 3)), "▁Hello");
        assert_eq!(read(sentencepiece_id_to_piece(handle, 999)), "");
        assert_eq!(read(sentencepiece_id_to_piece(handle, -1)), "");
        assert!(sentencepiece_id_to_piece(ptr::null_mut(), 3).is_null());
        registry::release(handle);
        assert!(sentencepiece_id_to_piece(handle, 3).is_null());
    }

    #[test]
    fn test_id_to_piece_copy_is_independent() {
        let handle = mock_handle();
        let first = sentencepiece_id_to_piece_copy(handle, 3);
        let second = sentencepiece_id_to_piece_copy(handle, 4);
        assert_eq!(read(first), "▁Hello");
        assert_eq!(read(second), "▁world");
        assert!(sentencepiece_id_to_piece_copy(handle, 999).is_null());

        unsafe {
            sentencepiece_free_string(first);
            sentencepiece_free_string(second);
        }
        registry::release(handle);
    }

    #[test]
    fn test_id_to_piece_into_truncates() {
        let handle = mock_handle();
        let mut buf = [0 as c_char; 4];

        // "▁world" is 8 bytes: 3 for the marker plus 5 letters
        let len = unsafe { sentencepiece_id_to_piece_into(handle, 4, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(len, 8);
        assert_eq!(read(buf.as_ptr()).as_bytes(), &"▁world".as_bytes()[..3]);

        let measured = unsafe { sentencepiece_id_to_piece_into(handle, 4, ptr::null_mut(), 0) };
        assert_eq!(measured, 8);

        let mut big = [0 as c_char; 32];
        let len = unsafe { sentencepiece_id_to_piece_into(handle, 4, big.as_mut_ptr(), big.len()) };
        assert_eq!(len, 8);
        assert_eq!(read(big.as_ptr()), "▁world");

        assert_eq!(
            unsafe { sentencepiece_id_to_piece_into(ptr::null_mut(), 4, big.as_mut_ptr(), big.len()) },
            -1
        );
        registry::release(handle);
    }

    #[test]
    fn test_id_to_piece_into_out_of_range_writes_empty() {
        let handle = mock_handle();
        for id in [999, -1] {
            let mut buf = [b'x' as c_char; 8];
            let len =
                unsafe { sentencepiece_id_to_piece_into(handle, id, buf.as_mut_ptr(), buf.len()) };
            assert_eq!(len, 0);
            assert_eq!(read(buf.as_ptr()), "");
        }
        registry::release(handle);
    }

    #[test]
    fn test_get_score() {
        let handle = mock_handle();
        assert_eq!(sentencepiece_get_score(handle, 4), -4.0);
        assert_eq!(sentencepiece_get_score(handle, 0), 0.0);
        assert_eq!(sentencepiece_get_score(handle, 999), 0.0);
        assert_eq!(sentencepiece_get_score(handle, -5), 0.0);
        assert_eq!(sentencepiece_get_score(ptr::null_mut(), 4), 0.0);
        registry::release(handle);
    }
}
