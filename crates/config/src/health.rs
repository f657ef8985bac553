//! Health endpoint configuration.

use std::{borrow::Cow, time::Duration};

use duration_str::deserialize_duration;
use serde::Deserialize;

/// Health endpoint configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// The path for the health endpoint on the public listener.
    pub path: Cow<'static, str>,
    /// How long to wait for the upstream health check before reporting it down.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            path: Cow::Borrowed("/healthz"),
            timeout: Duration::from_secs(5),
        }
    }
}
