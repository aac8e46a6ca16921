//! Caller-owned buffers handed across the boundary
//!
//! Each allocation shape has one type here and one release function in
//! [`crate::memory`]. Everything is allocated with the C allocator, so the id
//! array and strings can be released without knowing their length. While a
//! buffer is still on the Rust side its destructor frees it; `into_raw`
//! transfers ownership to the caller.

use std::{
    ffi::CStr,
    mem,
    os::raw::{c_char, c_int},
    ptr::{self, NonNull},
    slice,
};

use spm_tokenizer::TokenIdType;

use crate::error::BridgeError;

/// Allocate `len` elements of `T` with the C allocator
fn alloc_array<T>(len: usize) -> Result<*mut T, BridgeError> {
    let bytes = len
        .checked_mul(size_of::<T>())
        .ok_or(BridgeError::Allocation(usize::MAX))?;
    let raw = unsafe { libc::malloc(bytes) } as *mut T;
    if raw.is_null() {
        return Err(BridgeError::Allocation(bytes));
    }
    Ok(raw)
}

/// A NUL-terminated string, released with `sentencepiece_free_string`
#[derive(Debug)]
pub struct OwnedString {
    ptr: NonNull<c_char>,
}

impl OwnedString {
    pub fn new(text: &str) -> Result<Self, BridgeError> {
        if text.as_bytes().contains(&0) {
            return Err(BridgeError::InteriorNul);
        }

        let len = text.len();
        let raw = alloc_array::<c_char>(len + 1)?;
        unsafe {
            ptr::copy_nonoverlapping(text.as_ptr() as *const c_char, raw, len);
            raw.add(len).write(0);
        }
        // alloc_array never returns null
        NonNull::new(raw)
            .map(|ptr| Self { ptr })
            .ok_or(BridgeError::Allocation(len + 1))
    }

    pub fn as_c_str(&self) -> &CStr {
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
    }

    /// Hand the string to the caller
    pub fn into_raw(self) -> *mut c_char {
        let raw = self.ptr.as_ptr();
        mem::forget(self);
        raw
    }

    /// Take back a string produced by [`OwnedString::into_raw`]
    ///
    /// # Safety
    /// `raw` must be null or come from `into_raw` and not have been released.
    pub unsafe fn from_raw(raw: *mut c_char) -> Option<Self> {
        NonNull::new(raw).map(|ptr| Self { ptr })
    }
}

impl Drop for OwnedString {
    fn drop(&mut self) {
        unsafe { libc::free(self.ptr.as_ptr().cast()) }
    }
}

/// A flat array of ids, released with `sentencepiece_free_ids`.
///
/// Empty arrays are represented by a null pointer.
#[derive(Debug)]
pub struct OwnedIdArray {
    ptr: *mut c_int,
    len: usize,
}

impl OwnedIdArray {
    pub fn from_ids(ids: &[TokenIdType]) -> Result<Self, BridgeError> {
        let converted = ids
            .iter()
            .map(|&id| c_int::try_from(id).map_err(|_| BridgeError::IdOverflow(id)))
            .collect::<Result<Vec<c_int>, _>>()?;

        if converted.is_empty() {
            return Ok(Self {
                ptr: ptr::null_mut(),
                len: 0,
            });
        }

        let raw = alloc_array::<c_int>(converted.len())?;
        unsafe { ptr::copy_nonoverlapping(converted.as_ptr(), raw, converted.len()) };
        Ok(Self {
            ptr: raw,
            len: converted.len(),
        })
    }

    pub fn as_slice(&self) -> &[c_int] {
        if self.ptr.is_null() {
            &[]
        } else {
            unsafe { slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    pub fn into_raw(self) -> (*mut c_int, usize) {
        let parts = (self.ptr, self.len);
        mem::forget(self);
        parts
    }

    /// # Safety
    /// `raw` must be null or come from [`OwnedIdArray::into_raw`] and not have
    /// been released. `len` only bounds [`OwnedIdArray::as_slice`]; release
    /// does not depend on it.
    pub unsafe fn from_raw(raw: *mut c_int, len: usize) -> Self {
        Self {
            ptr: raw,
            len: if raw.is_null() { 0 } else { len },
        }
    }
}

impl Drop for OwnedIdArray {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { libc::free(self.ptr.cast()) }
        }
    }
}

/// A list of independently owned strings, released with
/// `sentencepiece_free_pieces` and the same count it was returned with.
#[derive(Debug)]
pub struct OwnedPieceList {
    ptr: *mut *mut c_char,
    len: usize,
}

impl OwnedPieceList {
    pub fn from_pieces<S: AsRef<str>>(pieces: &[S]) -> Result<Self, BridgeError> {
        // Strings first: if anything fails, the ones already built drop here
        let strings = pieces
            .iter()
            .map(|piece| OwnedString::new(piece.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        if strings.is_empty() {
            return Ok(Self {
                ptr: ptr::null_mut(),
                len: 0,
            });
        }

        let len = strings.len();
        let raw = alloc_array::<*mut c_char>(len)?;
        for (i, string) in strings.into_iter().enumerate() {
            unsafe { raw.add(i).write(string.into_raw()) };
        }
        Ok(Self { ptr: raw, len })
    }

    pub fn get(&self, index: usize) -> Option<&CStr> {
        if index >= self.len {
            return None;
        }
        let entry = unsafe { *self.ptr.add(index) };
        if entry.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(entry) })
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CStr> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    pub fn into_raw(self) -> (*mut *mut c_char, usize) {
        let parts = (self.ptr, self.len);
        mem::forget(self);
        parts
    }

    /// # Safety
    /// `raw` must be null or come from [`OwnedPieceList::into_raw`] together
    /// with `len`, and must not have been released.
    pub unsafe fn from_raw(raw: *mut *mut c_char, len: usize) -> Self {
        Self {
            ptr: raw,
            len: if raw.is_null() { 0 } else { len },
        }
    }
}

impl Drop for OwnedPieceList {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        for i in 0..self.len {
            let entry = unsafe { *self.ptr.add(i) };
            if !entry.is_null() {
                unsafe { libc::free(entry.cast()) };
            }
        }
        unsafe { libc::free(self.ptr.cast()) };
    }
}
