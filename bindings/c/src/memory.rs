//! Release functions for buffers returned across the boundary
//!
//! Every function here accepts null and does nothing with it.

use std::os::raw::{c_char, c_int};

use crate::owned::{OwnedIdArray, OwnedPieceList, OwnedString};

/// Free a piece list returned by `sentencepiece_encode_as_pieces`
///
/// # Arguments
/// * `pieces` - The list, or null
/// * `count` - The count the list was returned with. 0 (or a negative value)
///   releases nothing.
///
/// # Safety
/// `pieces` must come from this library with exactly `count` entries and must
/// not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_free_pieces(pieces: *mut *mut c_char, count: c_int) {
    if pieces.is_null() || count <= 0 {
        return;
    }
    drop(OwnedPieceList::from_raw(pieces, count as usize));
}

/// Free an id array returned by `sentencepiece_encode_as_ids`
///
/// # Safety
/// `ids` must be null or come from this library and not have been freed.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_free_ids(ids: *mut c_int) {
    drop(OwnedIdArray::from_raw(ids, 0));
}

/// Free a string returned by this library (decoded text, owned pieces and
/// error messages)
///
/// # Safety
/// `s` must be null or come from this library and not have been freed.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_free_string(s: *mut c_char) {
    drop(OwnedString::from_raw(s));
}
