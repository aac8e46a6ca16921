//! Opt-in diagnostics for host applications
//!
//! The library emits `tracing` events but never installs a subscriber on its
//! own. Hosts that want the events on stderr call `sentencepiece_init_logging`
//! once.

use std::os::raw::c_char;

use tracing_subscriber::EnvFilter;

use crate::error::{BridgeError, SpmStatus};

/// Environment variable consulted when no explicit filter is given
pub const LOG_ENV_VAR: &str = "SPM_BRIDGE_LOG";

const DEFAULT_FILTER: &str = "warn";

fn build_filter(filter: Option<&str>) -> Result<EnvFilter, BridgeError> {
    match filter {
        Some(directives) => {
            EnvFilter::try_new(directives).map_err(|e| BridgeError::InvalidFilter(e.to_string()))
        }
        None => Ok(EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Install a stderr fmt subscriber as the global default
pub fn init_logging(filter: Option<&str>) -> Result<(), BridgeError> {
    let filter = build_filter(filter)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| BridgeError::LoggingAlreadyInitialized)
}

/// Route library diagnostics to stderr
///
/// # Arguments
/// * `filter` - `tracing` filter directives such as `"spm_bridge=debug"`, or
///   null to read `SPM_BRIDGE_LOG` (falling back to `warn`)
///
/// # Returns
/// * `Success`, `InvalidArgument` for unparsable directives, or
///   `AlreadyInitialized` if a global subscriber already exists
///
/// # Safety
/// `filter` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn sentencepiece_init_logging(filter: *const c_char) -> SpmStatus {
    let filter = if filter.is_null() {
        None
    } else {
        match crate::utils::c_str_arg(filter, "filter") {
            Ok(directives) => Some(directives),
            Err(e) => return e.status(),
        }
    };

    match init_logging(filter) {
        Ok(()) => SpmStatus::Success,
        Err(e) => e.status(),
    }
}
