use std::{borrow::Cow, fmt, io::IsTerminal, path::PathBuf, str::FromStr, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use logforth::filter::EnvFilter;
use url::Url;

#[derive(Debug, Parser)]
#[command(
    name = "openai-gateway",
    version,
    about = "An OpenAI-compatible API gateway in front of Open-WebUI"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
    /// Set the logging level for the gateway crates. Dependencies log warnings only.
    #[arg(long = "log", env = "GATEWAY_LOG", default_value_t = LogLevel::default(), global = true)]
    pub log_level: LogLevel,
    /// Set the style of log output
    #[arg(long, env = "GATEWAY_LOG_STYLE", default_value_t = LogStyle::default(), global = true)]
    pub log_style: LogStyle,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Starts the OpenAI compatible gateway server
    Serve(ServeArgs),
    /// Sends a shutdown signal to a running gateway server
    Quit(QuitArgs),
}

#[derive(Debug, clap::Args)]
pub struct ServeArgs {
    /// Path to the TOML configuration file. Defaults apply when the file does not exist.
    #[arg(long, short, env = "GATEWAY_CONFIG_PATH", default_value = "./openai-gateway.toml")]
    pub config: PathBuf,
    /// Port number to listen on
    #[arg(long, short, env = "GATEWAY_PORT")]
    pub port: Option<u16>,
    /// Open-WebUI API endpoint URL
    #[arg(long, env = "OPEN_WEBUI_URL")]
    pub open_webui_url: Option<Url>,
    /// Internal port for the quit signal server, bound on 127.0.0.1
    #[arg(long, env = "GATEWAY_QUIT_PORT")]
    pub quit_port: Option<u16>,
    /// How long to wait for in-flight requests on shutdown, e.g. "15s"
    #[arg(long, env = "GATEWAY_SHUTDOWN_TIMEOUT", value_parser = parse_duration)]
    pub shutdown_timeout: Option<Duration>,
}

impl ServeArgs {
    /// Loads the configuration file and applies the command line on top of it.
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = if self.config.exists() {
            Config::load(&self.config)?
        } else {
            Config::default()
        };

        if let Some(port) = self.port {
            config.server.port = port;
        }

        if let Some(url) = &self.open_webui_url {
            config.upstream.url = Some(url.clone());
        }

        if let Some(port) = self.quit_port {
            config.server.control.port = port;
        }

        if let Some(timeout) = self.shutdown_timeout {
            config.server.shutdown_timeout = timeout;
        }

        Ok(config)
    }
}

#[derive(Debug, clap::Args)]
pub struct QuitArgs {
    /// Internal port where the target gateway's quit server listens
    #[arg(long, env = "GATEWAY_QUIT_PORT", default_value_t = 8081)]
    pub quit_port: u16,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    duration_str::parse(value).map_err(|e| e.to_string())
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogStyle {
    /// Colorized text, used as the default with TTY output
    Color,
    /// Standard text, used as the default with non-TTY output
    Text,
    /// JSON objects
    Json,
}

impl Default for LogStyle {
    fn default() -> Self {
        if std::io::stdout().is_terminal() {
            LogStyle::Color
        } else {
            LogStyle::Text
        }
    }
}

impl AsRef<str> for LogStyle {
    fn as_ref(&self) -> &str {
        match self {
            LogStyle::Color => "color",
            LogStyle::Text => "text",
            LogStyle::Json => "json",
        }
    }
}

impl fmt::Display for LogStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogLevel {
    /// Disable logging
    Off,
    /// Only log errors
    Error,
    /// Log errors, and warnings
    Warn,
    /// Log errors, warnings, and info messages
    #[default]
    Info,
    /// Log errors, warnings, info, and debug messages
    Debug,
    /// Log errors, warnings, info, debug, and trace messages
    Trace,
}

impl LogLevel {
    pub fn env_filter(self) -> anyhow::Result<EnvFilter> {
        let filter = match self {
            LogLevel::Off => Cow::Borrowed("off"),
            // dependencies stay at warn, workspace crates follow the selected level
            level => Cow::Owned(format!(
                "warn,openai_gateway={level},server={level},config={level},llm={level}"
            )),
        };

        EnvFilter::from_str(&filter).map_err(|e| anyhow::anyhow!("Invalid log filter '{filter}': {e:?}"))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(f)
    }
}

impl AsRef<str> for LogLevel {
    fn as_ref(&self) -> &str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
