use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "bf_copy=info";
const VERBOSE_LOG_FILTER: &str = "bf_copy=debug";

/// Initialize tracing output on stderr.
///
/// `RUST_LOG` takes precedence over the built-in filter. Calling this twice
/// is harmless: the second install attempt is ignored.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
