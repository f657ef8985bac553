use std::path::Path;

use anyhow::{Context, bail};
use indoc::indoc;

use crate::Config;

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();

    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read configuration at {}", path.display()))?;

    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse configuration at {}", path.display()))?;

    log::debug!("Loaded configuration from {}", path.display());

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    let Some(url) = config.upstream.url.as_ref() else {
        bail!(indoc! {r#"
            No upstream URL configured. The gateway requires an upstream to forward requests to.

            Set it with --open-webui-url, the OPEN_WEBUI_URL environment variable, or in the configuration file:

              [upstream]
              url = "http://open-webui:8080/api"
        "#});
    };

    if !matches!(url.scheme(), "http" | "https") {
        bail!("Upstream URL must use http or https, got '{}'", url.scheme());
    }

    let server = &config.server;

    if server.port != 0 && server.port == server.control.port {
        bail!(
            "The public port and the control port must differ, both are set to {}",
            server.port
        );
    }

    if server.shutdown_timeout.is_zero() {
        bail!("The shutdown timeout must be greater than zero");
    }

    Ok(())
}
