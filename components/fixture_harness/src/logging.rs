//! Tracing setup for the harness binaries

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TRACING_INIT: Once = Once::new();

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "FIXTURE_LOG";

/// Initialize tracing for the current process.
///
/// The filter comes from `FIXTURE_LOG`, then `RUST_LOG`, then `verbosity`
/// (0 = warn, 1 = info, 2 = debug, 3+ = trace). Output goes to stderr so
/// reports on stdout stay machine-readable. Safe to call multiple times.
pub fn init_tracing(verbosity: u8) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_level(true),
            )
            .with(filter)
            .try_init();
    });
}

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
