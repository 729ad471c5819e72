/*!
Logging setup for the command line tool.

Logs go to stderr so that `--json` output on stdout stays machine readable.
`RUST_LOG` overrides the default filter.
*/

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when `RUST_LOG` is not set
fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        // Release builds default to INFO to avoid excessive logs.
        "info"
    }
}

/// Initialize the global tracing subscriber
pub fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::debug!("Logging initialized");
}
