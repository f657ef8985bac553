//! Upstream chat service configuration.

use serde::Deserialize;
use url::Url;

/// Where translated and passthrough requests are sent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL of the upstream API. Required; there is no default.
    pub url: Option<Url>,
}

impl UpstreamConfig {
    /// The base URL as a string without a trailing slash, ready to have paths appended.
    pub fn base_url(&self) -> Option<String> {
        self.url
            .as_ref()
            .map(|url| url.as_str().trim_end_matches('/').to_string())
    }
}
