use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use config::Config;

/// Probes `<upstream>/health` with a bounded timeout.
pub(crate) struct HealthProbe {
    client: reqwest::Client,
    url: String,
}

/// The two answers the health endpoint can give.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HealthState {
    /// The upstream answered 200 within the timeout.
    Healthy,
    /// The upstream could not be reached, or answered with something else.
    Unhealthy(String),
}

impl HealthProbe {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client for health checks: {e}"))?;

        Ok(Self {
            client,
            url: format!("{base_url}/health"),
        })
    }

    /// Checks the upstream once. `request_id` tags the log lines of this check.
    pub async fn probe(&self, request_id: &str) -> HealthState {
        log::debug!(request_id; "Checking upstream health at {}", self.url);

        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!(request_id; "Health check against {} failed: {e}", self.url);
                return HealthState::Unhealthy("Upstream service unavailable".to_string());
            }
        };

        let status = response.status();

        if status != StatusCode::OK {
            log::warn!(request_id, status_code = status.as_u16(); "Upstream reported unhealthy status");
            return HealthState::Unhealthy(format!("Upstream service unhealthy (status: {})", status.as_u16()));
        }

        HealthState::Healthy
    }
}

/// Router answering the health path on the public listener.
pub(crate) fn router(config: &Config) -> anyhow::Result<Router> {
    let base_url = config
        .upstream
        .base_url()
        .ok_or_else(|| anyhow!("No upstream URL configured"))?;

    let probe = HealthProbe::new(&base_url, config.server.health.timeout)?;

    log::debug!("Health check endpoint exposed at {}", config.server.health.path);

    Ok(Router::new()
        .route(&config.server.health.path, get(health))
        .with_state(Arc::new(probe)))
}

async fn health(State(probe): State<Arc<HealthProbe>>) -> (StatusCode, String) {
    match probe.probe(&llm::request_id()).await {
        HealthState::Healthy => (StatusCode::OK, "OK".to_string()),
        HealthState::Unhealthy(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
    }
}
