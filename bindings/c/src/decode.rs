//! Decoding FFI functions

use std::{
    os::raw::{c_char, c_int},
    ptr, slice,
};

use spm_tokenizer::TokenIdType;
use tracing::debug;

use crate::{
    error::{clear_error_message, report, BridgeError, SpmStatus},
    owned::OwnedString,
    registry::{self, ProcessorHandle},
};

/// Decode `count` ids. A count of 0 yields the empty string.
unsafe fn decode_impl(
    processor: ProcessorHandle,
    ids: *const c_int,
    count: c_int,
) -> Result<OwnedString, BridgeError> {
    let processor = registry::lookup(processor)?;
    if ids.is_null() {
        return Err(BridgeError::NullArgument("ids"));
    }
    if count < 0 {
        return Err(BridgeError::InvalidCount(count));
    }

    let ids = slice::from_raw_parts(ids, count as usize)
        .iter()
        .map(|&id| TokenIdType::try_from(id).map_err(|_| BridgeError::NegativeId(id)))
        .collect::<Result<Vec<_>, _>>()?;

    let text = processor.decode(&ids)?;
    OwnedString::new(&text)
}

/// Decode ids back to text
///
/// # Arguments
/// * `processor` - Processor handle
/// * `ids` - Array of piece ids
/// * `num_ids` - Number of ids
///
/// # Returns
/// * Decoded text (must be freed with `sentencepiece_free_string`), or null if
///   the handle or `ids` is null, `num_ids <= 0`, or any id is outside the
///   vocabulary
///
/// # Safety
/// `ids` must be null or valid for `num_ids` reads.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_decode_ids(
    processor: ProcessorHandle,
    ids: *const c_int,
    num_ids: c_int,
) -> *mut c_char {
    if num_ids <= 0 {
        return ptr::null_mut();
    }

    match decode_impl(processor, ids, num_ids) {
        Ok(text) => text.into_raw(),
        Err(e) => {
            debug!(num_ids, error = %e, "decode_ids failed");
            ptr::null_mut()
        }
    }
}

/// Decode ids back to text, reporting why decoding failed
///
/// # Arguments
/// * `processor` - Processor handle
/// * `ids` - Array of piece ids
/// * `num_ids` - Number of ids. 0 decodes to the empty string.
/// * `text_out` - Receives the decoded text (must be freed with `sentencepiece_free_string`)
/// * `error_out` - Optional pointer to receive an error message (must be freed with
///   `sentencepiece_free_string`)
///
/// # Returns
/// * `SpmStatus::Success`, or the failure status. `text_out` is only written on success.
///
/// # Safety
/// `ids` must be null or valid for `num_ids` reads; `text_out` must be writable;
/// `error_out` may be null.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_decode_ids_ex(
    processor: ProcessorHandle,
    ids: *const c_int,
    num_ids: c_int,
    text_out: *mut *mut c_char,
    error_out: *mut *mut c_char,
) -> SpmStatus {
    if text_out.is_null() {
        return report(error_out, &BridgeError::NullArgument("text_out"));
    }

    match decode_impl(processor, ids, num_ids) {
        Ok(text) => {
            *text_out = text.into_raw();
            clear_error_message(error_out);
            SpmStatus::Success
        }
        Err(e) => report(error_out, &e),
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use spm_tokenizer::{mock::MockEngine, Processor};

    use super::*;
    use crate::memory::sentencepiece_free_string;

    fn mock_handle() -> ProcessorHandle {
        registry::register(Processor::from(MockEngine::new()))
    }

    fn take(text: *mut c_char) -> String {
        let owned = unsafe { CStr::from_ptr(text) }.to_str().unwrap().to_string();
        unsafe { sentencepiece_free_string(text) };
        owned
    }

    #[test]
    fn test_decode_ids() {
        let handle = mock_handle();
        let ids: [c_int; 2] = [3, 4];
        let text = unsafe { sentencepiece_decode_ids(handle, ids.as_ptr(), 2) };
        assert_eq!(take(text), "Hello world");
        registry::release(handle);
    }

    #[test]
    fn test_decode_sentinels() {
        let handle = mock_handle();
        let ids: [c_int; 2] = [3, 4];
        unsafe {
            assert!(sentencepiece_decode_ids(ptr::null_mut(), ids.as_ptr(), 2).is_null());
            assert!(sentencepiece_decode_ids(handle, ptr::null(), 2).is_null());
            assert!(sentencepiece_decode_ids(handle, ids.as_ptr(), 0).is_null());
            assert!(sentencepiece_decode_ids(handle, ids.as_ptr(), -3).is_null());
        }
        registry::release(handle);
    }

    #[test]
    fn test_decode_out_of_range_and_negative_ids() {
        let handle = mock_handle();
        let out_of_range: [c_int; 2] = [3, 999];
        let negative: [c_int; 2] = [3, -1];
        unsafe {
            assert!(sentencepiece_decode_ids(handle, out_of_range.as_ptr(), 2).is_null());
            assert!(sentencepiece_decode_ids(handle, negative.as_ptr(), 2).is_null());
        }
        registry::release(handle);
    }

    #[test]
    fn test_decode_ex_statuses() {
        let handle = mock_handle();
        let mut text: *mut c_char = ptr::null_mut();

        let empty: [c_int; 0] = [];
        let status = unsafe {
            sentencepiece_decode_ids_ex(handle, empty.as_ptr(), 0, &mut text, ptr::null_mut())
        };
        assert_eq!(status, SpmStatus::Success);
        assert_eq!(take(text), "");

        let bad: [c_int; 1] = [999];
        let mut error_out: *mut c_char = ptr::null_mut();
        text = ptr::null_mut();
        let status = unsafe {
            sentencepiece_decode_ids_ex(handle, bad.as_ptr(), 1, &mut text, &mut error_out)
        };
        assert_eq!(status, SpmStatus::OutOfRange);
        assert!(text.is_null());
        assert!(!take(error_out).is_empty());

        let negative: [c_int; 1] = [-7];
        let status = unsafe {
            sentencepiece_decode_ids_ex(handle, negative.as_ptr(), 1, &mut text, ptr::null_mut())
        };
        assert_eq!(status, SpmStatus::OutOfRange);
        registry::release(handle);
    }

    #[test]
    fn test_decode_ex_failing_engine() {
        let handle = registry::register(Processor::from(MockEngine::failing()));
        let ids: [c_int; 1] = [3];
        let mut text: *mut c_char = ptr::null_mut();
        let status = unsafe {
            sentencepiece_decode_ids_ex(handle, ids.as_ptr(), 1, &mut text, ptr::null_mut())
        };
        assert_eq!(status, SpmStatus::DecodeError);
        registry::release(handle);
    }
}
