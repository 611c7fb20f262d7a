//! Logging setup for the chat client binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// The default applies to this crate and the named binary; the `RUST_LOG`
/// environment variable overrides it.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "client")
/// * `default_level` - The default log level (e.g., "debug", "info", "warn")
pub fn setup_logger(binary_name: &str, default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}={},{}={}",
                    env!("CARGO_PKG_NAME").replace("-", "_"),
                    default_level,
                    binary_name,
                    default_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
