//! Logging setup for the `wb_cache` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary. `RUST_LOG` overrides the default filter:
//!
//! ```bash
//! RUST_LOG=wb_cache=trace wb_cache self-test   # per-block hit/miss
//! RUST_LOG=wb_cache::cache=debug wb_cache search hosts 10
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber. Safe to call more than once.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("wb_cache=debug")
        } else {
            EnvFilter::new("wb_cache=info")
        }
    });

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
