use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_LOG_DIRECTIVE: &str = "vetcare=info";

/// Initializes the global tracing subscriber with sensible defaults.
///
/// Events go to stderr so command output on stdout stays machine readable.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));

        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
