//! Logging initialization.
//!
//! Logs go to stderr so stdout only carries the JSON result. `RUST_LOG` wins when set;
//! otherwise `--verbose` selects debug output for the engine and the binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Default filter when `RUST_LOG` is not set
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,wave_level_lib=debug,wave_level=debug"
    } else if cfg!(debug_assertions) {
        "info,wave_level_lib=debug"
    } else {
        "info"
    }
}

pub fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_filter(filter);
    let registry = tracing_subscriber::registry().with(fmt_layer);
    if registry.try_init().is_err() {
        // Already initialized (e.g. by a test harness)
        return;
    }

    tracing::debug!("Logging initialized");
}
