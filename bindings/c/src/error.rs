//! Error handling for FFI functions
//!
//! Internally every operation returns `Result<_, BridgeError>`. The plain
//! surface collapses failures into sentinels; the `_ex` surface returns an
//! [`SpmStatus`] and an optional message through `error_out`.

use std::os::raw::{c_char, c_int};

use spm_tokenizer::EngineError;
use thiserror::Error;

use crate::owned::OwnedString;

/// Status codes returned by the `_ex` functions
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpmStatus {
    Success = 0,
    InvalidArgument = 1,
    InvalidHandle = 2,
    NotFound = 3,
    LoadError = 4,
    EncodeError = 5,
    DecodeError = 6,
    OutOfRange = 7,
    MemoryError = 8,
    AlreadyInitialized = 9,
    UnknownError = 99,
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("{0} cannot be null")]
    NullArgument(&'static str),

    #[error("handle is not live (never created or already destroyed)")]
    InvalidHandle,

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("string contains an interior NUL byte")]
    InteriorNul,

    #[error("failed to allocate {0} bytes")]
    Allocation(usize),

    #[error("count must be positive, got {0}")]
    InvalidCount(c_int),

    #[error("{0} elements do not fit in a C int count")]
    CountOverflow(usize),

    #[error("negative piece id {0}")]
    NegativeId(c_int),

    #[error("piece id {0} does not fit in a C int")]
    IdOverflow(u32),

    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("a global tracing subscriber is already installed")]
    LoggingAlreadyInitialized,

    #[error("{message}")]
    Status { status: SpmStatus, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl BridgeError {
    pub fn status(&self) -> SpmStatus {
        match self {
            BridgeError::NullArgument(_)
            | BridgeError::InvalidUtf8(_)
            | BridgeError::InteriorNul
            | BridgeError::InvalidCount(_)
            | BridgeError::InvalidFilter(_) => SpmStatus::InvalidArgument,
            BridgeError::InvalidHandle => SpmStatus::InvalidHandle,
            BridgeError::Allocation(_) | BridgeError::CountOverflow(_) => SpmStatus::MemoryError,
            BridgeError::NegativeId(_) | BridgeError::IdOverflow(_) => SpmStatus::OutOfRange,
            BridgeError::LoggingAlreadyInitialized => SpmStatus::AlreadyInitialized,
            BridgeError::Status { status, .. } => *status,
            BridgeError::Engine(e) => match e {
                EngineError::NotFound(_) => SpmStatus::NotFound,
                EngineError::Load { .. }
                | EngineError::UnsupportedFormat { .. }
                | EngineError::Config(_)
                | EngineError::Io(_) => SpmStatus::LoadError,
                EngineError::Encode(_) => SpmStatus::EncodeError,
                EngineError::Decode(_) => SpmStatus::DecodeError,
                EngineError::IdOutOfRange { .. } => SpmStatus::OutOfRange,
            },
        }
    }
}

/// Helper to set error message in FFI output parameter
///
/// The message is allocated like every other owned string and must be
/// released with `sentencepiece_free_string`.
///
/// # Safety
/// - `error_out` may be null; if non-null, must point to valid writable memory
/// - Caller must free any previous string at `*error_out` before calling
pub unsafe fn set_error_message(error_out: *mut *mut c_char, message: &str) {
    if !error_out.is_null() {
        *error_out = match OwnedString::new(message) {
            Ok(owned) => owned.into_raw(),
            Err(_) => std::ptr::null_mut(),
        };
    }
}

/// Helper to clear error message
///
/// # Safety
/// - `error_out` may be null; if non-null, must point to valid writable memory
pub unsafe fn clear_error_message(error_out: *mut *mut c_char) {
    if !error_out.is_null() {
        *error_out = std::ptr::null_mut();
    }
}

/// Write `error` to `error_out` and return its status code
///
/// # Safety
/// Same contract as [`set_error_message`].
pub unsafe fn report(error_out: *mut *mut c_char, error: &BridgeError) -> SpmStatus {
    set_error_message(error_out, &error.to_string());
    error.status()
}
