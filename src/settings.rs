//! Internal settings for Qdex.
//!
//! This module initializes the logging configuration for Qdex at startup, when the
//! `setup_tracing` feature is enabled. The logging behavior is controlled by the
//! `DEBUG_QDEX` environment variable. If `DEBUG_QDEX` is not set or is set to a falsy
//! value ("0", "false", or empty), logging stays disabled. Otherwise logging is enabled
//! with a maximum level of DEBUG.

#[cfg(feature = "setup_tracing")]
use ctor::ctor;
#[cfg(feature = "setup_tracing")]
use tracing::Level;

#[cfg(feature = "setup_tracing")]
#[ctor]
fn set_debug_level() {
    if std::env::var("DEBUG_QDEX").map_or(true, |v| v == "0" || v == "false" || v.is_empty()) {
        // Logging stays disabled; macros are no-ops without a global subscriber.
    } else {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }
}
