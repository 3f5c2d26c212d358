use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use crate::error::{ConfigError, ConfigResult};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. Calling this twice is an error
/// from the subscriber registry, which is reported rather than panicking.
pub fn init_logging(log_level: &str) -> ConfigResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
