//! Encoding FFI functions
//!
//! Ownership of every returned buffer passes to the caller:
//! - piece lists are released with `sentencepiece_free_pieces(pieces, count)`
//! - id arrays are released with `sentencepiece_free_ids(ids)`
//!
//! A count of 0 means there is nothing to free.

use std::os::raw::{c_char, c_int};

use tracing::debug;

use crate::{
    error::{clear_error_message, report, BridgeError, SpmStatus},
    owned::{OwnedIdArray, OwnedPieceList},
    registry::{self, ProcessorHandle},
    utils::{c_str_arg, count_to_c_int},
};

unsafe fn encode_pieces_impl(
    processor: ProcessorHandle,
    text: *const c_char,
) -> Result<(OwnedPieceList, c_int), BridgeError> {
    let processor = registry::lookup(processor)?;
    let text = c_str_arg(text, "text")?;

    let pieces = processor.encode_as_pieces(text)?;
    let count = count_to_c_int(pieces.len())?;
    Ok((OwnedPieceList::from_pieces(&pieces)?, count))
}

unsafe fn encode_ids_impl(
    processor: ProcessorHandle,
    text: *const c_char,
) -> Result<(OwnedIdArray, c_int), BridgeError> {
    let processor = registry::lookup(processor)?;
    let text = c_str_arg(text, "text")?;

    let ids = processor.encode_as_ids(text)?;
    let count = count_to_c_int(ids.len())?;
    Ok((OwnedIdArray::from_ids(&ids)?, count))
}

/// Encode text to pieces
///
/// # Arguments
/// * `processor` - Processor handle
/// * `text` - Input text (NUL-terminated UTF-8)
/// * `pieces` - Receives the piece list (must be freed with `sentencepiece_free_pieces`)
///
/// # Returns
/// * Number of pieces. 0 on failure, in which case `*pieces` is left untouched.
///   Empty input also yields 0 and writes null.
///
/// # Safety
/// `text` must be null or NUL-terminated; `pieces` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_encode_as_pieces(
    processor: ProcessorHandle,
    text: *const c_char,
    pieces: *mut *mut *mut c_char,
) -> c_int {
    if pieces.is_null() {
        return 0;
    }

    match encode_pieces_impl(processor, text) {
        Ok((list, count)) => {
            *pieces = list.into_raw().0;
            count
        }
        Err(e) => {
            debug!(error = %e, "encode_as_pieces failed");
            0
        }
    }
}

/// Encode text to ids
///
/// # Arguments
/// * `processor` - Processor handle
/// * `text` - Input text (NUL-terminated UTF-8)
/// * `ids` - Receives the id array (must be freed with `sentencepiece_free_ids`)
///
/// # Returns
/// * Number of ids. 0 on failure, in which case `*ids` is left untouched.
///   Empty input also yields 0 and writes null.
///
/// # Safety
/// `text` must be null or NUL-terminated; `ids` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_encode_as_ids(
    processor: ProcessorHandle,
    text: *const c_char,
    ids: *mut *mut c_int,
) -> c_int {
    if ids.is_null() {
        return 0;
    }

    match encode_ids_impl(processor, text) {
        Ok((array, count)) => {
            *ids = array.into_raw().0;
            count
        }
        Err(e) => {
            debug!(error = %e, "encode_as_ids failed");
            0
        }
    }
}

/// Encode text to pieces, telling empty output apart from failure
///
/// # Arguments
/// * `processor` - Processor handle
/// * `text` - Input text (NUL-terminated UTF-8)
/// * `pieces_out` - Receives the piece list (must be freed with `sentencepiece_free_pieces`)
/// * `count_out` - Receives the number of pieces
/// * `error_out` - Optional pointer to receive an error message (must be freed with
///   `sentencepiece_free_string`)
///
/// # Returns
/// * `SpmStatus::Success` (possibly with a count of 0), or the failure status.
///   Outputs are only written on success.
///
/// # Safety
/// All non-null pointers must be valid; `error_out` may be null.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_encode_as_pieces_ex(
    processor: ProcessorHandle,
    text: *const c_char,
    pieces_out: *mut *mut *mut c_char,
    count_out: *mut c_int,
    error_out: *mut *mut c_char,
) -> SpmStatus {
    if pieces_out.is_null() || count_out.is_null() {
        return report(error_out, &BridgeError::NullArgument("pieces_out/count_out"));
    }

    match encode_pieces_impl(processor, text) {
        Ok((list, count)) => {
            *pieces_out = list.into_raw().0;
            *count_out = count;
            clear_error_message(error_out);
            SpmStatus::Success
        }
        Err(e) => report(error_out, &e),
    }
}

/// Encode text to ids, telling empty output apart from failure
///
/// # Arguments
/// * `processor` - Processor handle
/// * `text` - Input text (NUL-terminated UTF-8)
/// * `ids_out` - Receives the id array (must be freed with `sentencepiece_free_ids`)
/// * `count_out` - Receives the number of ids
/// * `error_out` - Optional pointer to receive an error message (must be freed with
///   `sentencepiece_free_string`)
///
/// # Returns
/// * `SpmStatus::Success` (possibly with a count of 0), or the failure status.
///   Outputs are only written on success.
///
/// # Safety
/// All non-null pointers must be valid; `error_out` may be null.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_encode_as_ids_ex(
    processor: ProcessorHandle,
    text: *const c_char,
    ids_out: *mut *mut c_int,
    count_out: *mut c_int,
    error_out: *mut *mut c_char,
) -> SpmStatus {
    if ids_out.is_null() || count_out.is_null() {
        return report(error_out, &BridgeError::NullArgument("ids_out/count_out"));
    }

    match encode_ids_impl(processor, text) {
        Ok((array, count)) => {
            *ids_out = array.into_raw().0;
            *count_out = count;
            clear_error_message(error_out);
            SpmStatus::Success
        }
        Err(e) => report(error_out, &e),
    }
}
