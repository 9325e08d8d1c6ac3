//! Structured logging setup.
//!
//! `axon-core` never configures a global subscriber implicitly — the
//! embedding process owns that decision — but it provides an
//! env-filter-based initializer for embedders that want a sane default.

use tracing_subscriber::EnvFilter;

/// Install a process-wide `tracing` subscriber reading `RUST_LOG` (default
/// `info`). Safe to call at most once; a second call is a no-op (the
/// underlying `try_init` swallows "already set" errors).
pub fn init_default_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
