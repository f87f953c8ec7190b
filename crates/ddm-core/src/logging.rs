//! Logging init: structured `tracing` output to stderr.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging. Call once, as early as possible in `main`.
///
/// Defaults to `info` for everything and `debug` for `ddm_core`, overridable
/// with `RUST_LOG`.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ddm_core=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
