use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Fallback variable read when `RUST_LOG` is unset.
pub const LOG_ENV: &str = "NMOS_PORT_EXPLORER_LOGLEVEL";

/// Install the global tracing subscriber, writing to stderr.
///
/// `verbose` raises the default level to `debug` when no filter is set in the environment.
pub fn init(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV))
        .unwrap_or_else(|_| {
            format!(
                "{}={default_level},tower_http={default_level}",
                env!("CARGO_CRATE_NAME")
            )
        });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(EnvFilter::new(filter))
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
