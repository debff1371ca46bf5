//! Daemon bootstrap: CLI arguments, option resolution, and logging setup.

use std::fmt;
use std::path::PathBuf;

use clap::Parser;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use marquee_core::config::{Config, ConfigError};

pub use marquee_core::config::{DEFAULT_HOST, DEFAULT_PORT};

// ---------------------------------------------------------------------------
// DaemonOptions
// ---------------------------------------------------------------------------

/// Runtime options for the daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonOptions {
    pub host: String,
    pub port: u16,
    pub history_limit: Option<usize>,
    pub user_context: Map<String, Value>,
    /// Serve the agent tool endpoint on stdin/stdout.
    pub agent_stdio: bool,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            history_limit: None,
            user_context: Map::new(),
            agent_stdio: true,
        }
    }
}

impl DaemonOptions {
    /// Returns the bind address as "host:port".
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a log level string (case-insensitive, defaults to Info).
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().trim() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_filter().to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Console,
    Json,
}

impl LogFormat {
    /// Parse a format string (defaults to Console).
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().trim() {
            "json" => Self::Json,
            _ => Self::Console,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Console,
        }
    }
}

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over the configured level. Returns false if a
/// subscriber was already installed.
pub fn init_tracing(cfg: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.level.as_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cfg.format {
        LogFormat::Console => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct VersionInfo {
    pub version: String,
    pub commit: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: option_env!("MARQUEE_COMMIT").unwrap_or("none").to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Parsed daemon CLI arguments. Unset flags fall back to the config file.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "marqueed", version, about = "Shared display daemon")]
pub struct DaemonArgs {
    /// Host to bind the WebSocket endpoint on.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind the WebSocket endpoint on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Path to a YAML config file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// trace, debug, info, warn or error.
    #[arg(long)]
    pub log_level: Option<String>,

    /// console or json.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Maximum undo depth.
    #[arg(long)]
    pub history_limit: Option<usize>,

    /// Do not serve the agent tool endpoint on stdin/stdout.
    #[arg(long)]
    pub no_agent: bool,
}

/// Apply CLI overrides on top of `cfg`, validate the result, and derive
/// runtime options.
pub fn build_daemon_options(
    args: &DaemonArgs,
    cfg: &Config,
) -> Result<(DaemonOptions, LoggingConfig), ConfigError> {
    let mut cfg = cfg.clone();
    if let Some(host) = &args.host {
        cfg.server.host = host.clone();
    }
    if let Some(port) = args.port {
        cfg.server.port = port;
    }
    if let Some(level) = &args.log_level {
        cfg.logging.level = level.clone();
    }
    if let Some(format) = &args.log_format {
        cfg.logging.format = format.clone();
    }
    if args.history_limit.is_some() {
        cfg.session.history_limit = args.history_limit;
    }
    cfg.validate().map_err(ConfigError::Invalid)?;

    let opts = DaemonOptions {
        host: cfg.server.host,
        port: cfg.server.port,
        history_limit: cfg.session.history_limit,
        user_context: cfg.session.user_context,
        agent_stdio: !args.no_agent,
    };
    let log_cfg = LoggingConfig {
        level: LogLevel::parse(&cfg.logging.level),
        format: LogFormat::parse(&cfg.logging.format),
    };
    Ok((opts, log_cfg))
}
