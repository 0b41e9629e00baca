//! Tracing initialisation.

use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber with env-filter support.
///
/// `SHOTFLOW_LOG` (falling back to `RUST_LOG` conventions via `default`)
/// controls verbosity. Safe to call more than once; subsequent calls are
/// no-ops.
pub fn init_tracing(default: &str) {
    let filter = EnvFilter::try_from_env("SHOTFLOW_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default.to_string()));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}
