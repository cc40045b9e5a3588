use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

use crate::util::env::{env_flag, init_env};

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`, and
/// is read after `.env` has been loaded.
///
/// Logs go to stderr so `catalog prep` and `catalog stats --json` can pipe
/// their stdout. `CATALOG_LOG_COMPACT=1` drops file and line locations.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    init_env();
    let verbose = !env_flag("CATALOG_LOG_COMPACT", false);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_line_number(verbose)
        .with_file(verbose)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
