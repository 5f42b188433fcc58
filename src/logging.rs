//! Logging initialization using the `tracing` crate.
//!
//! - Uses the `RUST_LOG` environment variable for filtering (default:
//!   `warn,backdrop=info`)
//! - Writes to stderr; stdout is reserved for the readiness announcement

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn,backdrop=info";

/// Initializes the global tracing subscriber.
///
/// Call once at startup, before any logging occurs:
/// - `RUST_LOG=backdrop=debug` - per-frame and cache activity
/// - `RUST_LOG=trace` - everything
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    tracing_subscriber::registry().with(filter).with(subscriber).init();
}
