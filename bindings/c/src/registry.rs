//! Live processor handles
//!
//! A handle is an opaque token, not an address. Every successful create mints
//! a fresh non-zero key that is never reused, so a destroyed handle can never
//! alias a later processor and any call made with it simply misses the table.
//! Calls clone the processor out of the table, which keeps the engine alive
//! until an in-flight call on another thread returns even if the handle is
//! destroyed meanwhile.

use std::{
    os::raw::c_void,
    sync::atomic::{AtomicUsize, Ordering},
};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use spm_tokenizer::Processor;

use crate::error::BridgeError;

/// Opaque processor handle as seen by C callers
pub type ProcessorHandle = *mut c_void;

static NEXT_HANDLE: AtomicUsize = AtomicUsize::new(1);

static HANDLES: Lazy<DashMap<usize, Processor>> = Lazy::new(DashMap::new);

/// Take ownership of `processor` and mint a handle for it
pub fn register(processor: Processor) -> ProcessorHandle {
    let key = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    HANDLES.insert(key, processor);
    key as ProcessorHandle
}

/// Resolve a handle to its processor
pub fn lookup(handle: ProcessorHandle) -> Result<Processor, BridgeError> {
    if handle.is_null() {
        return Err(BridgeError::NullArgument("processor"));
    }
    HANDLES
        .get(&(handle as usize))
        .map(|entry| entry.value().clone())
        .ok_or(BridgeError::InvalidHandle)
}

/// Drop the table's reference to the processor. Returns false for null or
/// unknown handles.
pub fn release(handle: ProcessorHandle) -> bool {
    !handle.is_null() && HANDLES.remove(&(handle as usize)).is_some()
}

pub fn is_live(handle: ProcessorHandle) -> bool {
    !handle.is_null() && HANDLES.contains_key(&(handle as usize))
}
