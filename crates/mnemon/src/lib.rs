//! Public SDK surface for mnemon.
//!
//! This crate re-exports the store, config and runtime crates and provides a
//! small initialization helper to keep consumer setup consistent.

pub mod cli;

/// Re-export for convenience.
pub use mnemon_config as config;
/// Re-export for convenience.
pub use mnemon_memory as memory;
pub use mnemon_runtime as runtime;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// No-op without the feature. Binaries should call this before building a
/// store so backend selection is logged.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
