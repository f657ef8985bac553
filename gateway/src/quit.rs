use std::time::Duration;

use anyhow::{anyhow, bail};
use reqwest::StatusCode;

use crate::args::QuitArgs;

const QUIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Asks a gateway running on this host to shut down.
///
/// A gateway that is not running is not an error.
pub(super) async fn run(args: &QuitArgs) -> anyhow::Result<()> {
    let url = format!("http://127.0.0.1:{}{}", args.quit_port, server::QUIT_PATH);

    log::info!("Sending shutdown signal to {url}");

    let client = reqwest::Client::builder()
        .timeout(QUIT_TIMEOUT)
        .build()
        .map_err(|e| anyhow!("Failed to create quit request client: {e}"))?;

    let response = match client.post(&url).send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            bail!("Quit request timed out after {QUIT_TIMEOUT:?}: {e}");
        }
        Err(e) if e.is_connect() => {
            log::info!("Gateway server not found or not running at {url}");
            return Ok(());
        }
        Err(e) => bail!("Failed to send quit request: {e}"),
    };

    let status = response.status();

    if status != StatusCode::OK {
        bail!("Quit endpoint returned non-OK status: {}", status.as_u16());
    }

    log::info!("Shutdown signal sent successfully");

    Ok(())
}
