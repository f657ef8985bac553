//! Gateway configuration structures mapping the gateway TOML configuration.

#![deny(missing_docs)]

mod health;
mod loader;
mod server;
mod upstream;

use std::path::Path;

pub use health::HealthConfig;
pub use server::{ControlConfig, ServerConfig};
use serde::Deserialize;
pub use upstream::UpstreamConfig;

/// Main configuration structure for the gateway.
///
/// Built once at startup and never mutated afterwards. Components receive the
/// parts they need when they are constructed.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listener, control channel and shutdown settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// The upstream chat service requests are forwarded to.
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates that the configuration can be served.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}
