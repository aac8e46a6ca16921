//! Processor lifecycle FFI functions

use std::{os::raw::c_char, ptr};

use spm_tokenizer::Processor;
use tracing::{debug, warn};

use crate::{
    error::{clear_error_message, report, BridgeError},
    registry::{self, ProcessorHandle},
    utils::c_str_arg,
};

pub(crate) unsafe fn create_impl(model_path: *const c_char) -> Result<ProcessorHandle, BridgeError> {
    let path = c_str_arg(model_path, "model_path")?;

    let processor = Processor::from_file(path).map_err(|e| {
        warn!(path, error = %e, "Failed to load model");
        e
    })?;
    let piece_size = processor.piece_size();

    let handle = registry::register(processor);
    debug!(path, piece_size, ?handle, "Created processor");
    Ok(handle)
}

/// Load a model and return a handle that owns the engine
///
/// # Arguments
/// * `model_path` - Path to a `tokenizer.json` or SentencePiece `.model` file, or
///   a directory holding one
///
/// # Returns
/// * A non-null handle on success, null on any load failure
///
/// # Safety
/// `model_path` must be null or a NUL-terminated string. The returned handle
/// must be released exactly once with `sentencepiece_destroy`.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_create(model_path: *const c_char) -> ProcessorHandle {
    create_impl(model_path).unwrap_or(ptr::null_mut())
}

/// Same as `sentencepiece_create`, reporting why a load failed
///
/// # Arguments
/// * `model_path` - Path to a `tokenizer.json` or SentencePiece `.model` file, or
///   a directory holding one
/// * `error_out` - Optional pointer to receive an error message (must be freed with
///   `sentencepiece_free_string`)
///
/// # Safety
/// `model_path` must be null or a NUL-terminated string; `error_out` may be
/// null, otherwise it must point to writable memory.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_create_ex(
    model_path: *const c_char,
    error_out: *mut *mut c_char,
) -> ProcessorHandle {
    match create_impl(model_path) {
        Ok(handle) => {
            clear_error_message(error_out);
            handle
        }
        Err(e) => {
            report(error_out, &e);
            ptr::null_mut()
        }
    }
}

/// Release the engine owned by `processor`
///
/// Null and already destroyed handles are ignored. Every buffer returned by
/// other calls stays valid and must still be freed by the caller.
#[no_mangle]
pub extern "C" fn sentencepiece_destroy(processor: ProcessorHandle) {
    if processor.is_null() {
        return;
    }
    if registry::release(processor) {
        debug!(handle = ?processor, "Destroyed processor");
    } else {
        debug!(handle = ?processor, "Ignoring destroy of unknown handle");
    }
}

/// Alias of `sentencepiece_destroy`
#[no_mangle]
pub extern "C" fn sentencepiece_free_processor(processor: ProcessorHandle) {
    sentencepiece_destroy(processor);
}
