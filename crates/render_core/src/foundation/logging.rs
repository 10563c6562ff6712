//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// Reads the filter from `RUST_LOG`. Panics if a logger was already installed.
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system, ignoring an already-installed logger
///
/// Tests call this from many places so it has to be idempotent.
pub fn try_init() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(cfg!(test))
        .try_init();
}
