//! Tracing setup for the depot CLI
//!
//! Usage:
//!   depot --debug ...              # Debug logging to console
//!   RUST_LOG=depot_repo=trace depot  # Fine-grained log control
//!
//! `RUST_LOG` always wins. Without it, `--debug` selects `debug`, otherwise the
//! `[log] level` from the config file is used.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Enable debug logging and show targets
    pub debug: bool,
    /// Fallback filter when neither `RUST_LOG` nor `--debug` is set
    pub level: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: "info".to_string(),
        }
    }
}

impl TracingConfig {
    fn fallback_filter(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.level
        }
    }
}

/// Initialize console tracing.
pub fn init(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.fallback_filter()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
