//! Logging bootstrap for graph-node binaries, grounded on `core/lib/vlog`
//! (same crate name, same `tracing` + `tracing-subscriber` + `sentry`
//! dependency set as the teacher). Every core crate logs through
//! `tracing`'s macros rather than `println!`; this crate only owns process
//! start-up wiring, not the macros themselves.

pub use tracing::{debug, error, info, warn};

/// Installs a `tracing_subscriber` `fmt` layer as the global default
/// subscriber and, if `SENTRY_DSN` is set, initializes Sentry error
/// reporting. Returns the Sentry guard, which the binary must hold for the
/// life of the process (dropping it flushes pending events).
///
/// Call this once, at the top of `main`.
pub fn init() -> Option<sentry::ClientInitGuard> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    })
}
