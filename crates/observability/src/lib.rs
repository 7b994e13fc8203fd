//! Process-wide tracing setup shared by every quarry binary.

/// Initialize tracing with JSON output and `RUST_LOG` filtering (default
/// `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&tracing::LogConfig::default());
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogConfig, LogFormat};
