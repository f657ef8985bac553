//! Listener and lifecycle configuration.

use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    time::Duration,
};

use duration_str::deserialize_duration;
use serde::Deserialize;

use crate::HealthConfig;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CONTROL_PORT: u16 = 8081;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP server configuration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Port of the public API listener. Binds on all interfaces.
    pub port: u16,
    /// Upper bound for draining both listeners once shutdown starts.
    #[serde(deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,
    /// Control channel configuration.
    pub control: ControlConfig,
    /// Health endpoint configuration.
    pub health: HealthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            control: ControlConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// The address the public listener binds to.
    pub fn public_address(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// The address the control listener binds to. Always loopback.
    pub fn control_address(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, self.control.port))
    }
}

/// Loopback-only control channel configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    /// Port of the control listener on 127.0.0.1.
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_CONTROL_PORT,
        }
    }
}
