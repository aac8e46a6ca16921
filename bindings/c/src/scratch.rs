//! Per-thread scratch buffer behind `sentencepiece_id_to_piece`
//!
//! Each thread owns one buffer that every lookup on that thread overwrites.
//! The returned pointer stays valid until the next lookup on the same thread
//! (or thread exit). Callers that need to keep a piece must copy it first, or
//! use the owned/caller-buffer variants.

use std::{cell::RefCell, os::raw::c_char};

thread_local! {
    static PIECE_SCRATCH: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

/// Copy `piece` into this thread's buffer and return the NUL-terminated copy.
///
/// Text after an interior NUL would be invisible to C readers anyway, so the
/// copy stops there.
pub fn stage_piece(piece: &str) -> *const c_char {
    let bytes = piece.as_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());

    PIECE_SCRATCH.with(|cell| {
        let mut buffer = cell.borrow_mut();
        buffer.clear();
        buffer.extend_from_slice(&bytes[..end]);
        buffer.push(0);
        buffer.as_ptr() as *const c_char
    })
}

#[cfg(test)]
mod tests {
    use std::{ffi::CStr, thread};

    use super::*;

    fn read(ptr: *const c_char) -> String {
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
    }

    #[test]
    fn test_stage_piece_is_nul_terminated() {
        let ptr = stage_piece("▁hello");
        assert_eq!(read(ptr), "▁hello");
    }

    #[test]
    fn test_second_lookup_overwrites_first() {
        let first = stage_piece("▁hello");
        let first_copy = read(first);
        let second = stage_piece("▁world");

        // Same buffer, reused in place
        assert_eq!(first, second);
        assert_eq!(first_copy, "▁hello");
        assert_eq!(read(second), "▁world");
    }

    #[test]
    fn test_threads_do_not_share_the_buffer() {
        let mine = stage_piece("main");
        let theirs = thread::spawn(|| read(stage_piece("worker"))).join().unwrap();

        assert_eq!(theirs, "worker");
        assert_eq!(read(mine), "main");
    }

    #[test]
    fn test_interior_nul_truncates() {
        assert_eq!(read(stage_piece("ab\0cd")), "ab");
    }
}
