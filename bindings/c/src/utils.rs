//! Argument conversion helpers shared by the FFI functions

use std::{
    ffi::CStr,
    os::raw::{c_char, c_int},
};

use crate::error::BridgeError;

/// Borrow a required NUL-terminated UTF-8 argument
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub unsafe fn c_str_arg<'a>(ptr: *const c_char, name: &'static str) -> Result<&'a str, BridgeError> {
    if ptr.is_null() {
        return Err(BridgeError::NullArgument(name));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| BridgeError::InvalidUtf8(name))
}

/// Convert an element count for the boundary
pub fn count_to_c_int(count: usize) -> Result<c_int, BridgeError> {
    c_int::try_from(count).map_err(|_| BridgeError::CountOverflow(count))
}
