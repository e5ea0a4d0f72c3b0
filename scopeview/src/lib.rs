//! Shared glue for the `scopeview` and `scopeview-dump` binaries
//!
//! The capture machinery lives in `scopeview-capture`; this crate only adds
//! the presentation loop, the raw dump sink, and the JSON metadata record.

pub mod display;
pub mod metadata;
pub mod sink;

/// Device name searched for when no `--device` token is given
pub const DEFAULT_DEVICE_HINT: &str = "MikrOkularHD";

/// Initialize logging for the binaries.
///
/// Set RUST_LOG to control the log level, e.g. RUST_LOG=debug or
/// RUST_LOG=scopeview_capture=debug.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();
}
