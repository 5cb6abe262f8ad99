//! Logging bootstrap for processes embedding the disperser core.
//!
//! Library crates only emit through `tracing`; the embedding process calls
//! [`init`] once at startup. Filtering follows the conventional `RUST_LOG`
//! environment variable, defaulting to `info`.

use serde::Deserialize;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    /// Service name stamped on startup logs.
    pub service_name: String,

    /// Emit newline-delimited JSON instead of the human-readable format.
    #[serde(default)]
    pub json_format: bool,
}

impl LoggerConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            json_format: false,
        }
    }
}

/// Installs the global tracing subscriber.
///
/// # Panics
///
/// Panics if a global subscriber is already installed; call once per
/// process.
pub fn init(config: LoggerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(service = %config.service_name, "logging initialized");
}
