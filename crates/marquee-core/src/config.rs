//! Configuration for the daemon and the viewer.
//!
//! Root configuration struct and nested sections with defaults, validation,
//! YAML file loading, environment variable overrides, and tilde expansion.
//! Every field is optional in the file; a missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_ENV: &str = "MARQUEE_CONFIG";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8765;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Root config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    pub client: ClientConfig,
}

impl Config {
    /// Load from `explicit`, `$MARQUEE_CONFIG`, or the search path, then apply
    /// environment overrides. Does not validate; callers validate after
    /// applying their own CLI overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let path = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Some(expand_tilde(&path)),
            None => find_config_file(),
        };

        let mut cfg = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        cfg.apply_env_overrides_from(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Apply `MARQUEE_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MARQUEE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("MARQUEE_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("MARQUEE_PORT {port:?} is not a port")))?;
        }
        if let Some(level) = lookup("MARQUEE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("MARQUEE_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(url) = lookup("MARQUEE_URL") {
            self.client.url = url;
        }
        Ok(())
    }

    /// Validates the entire configuration, returning an error message on failure.
    pub fn validate(&self) -> Result<(), String> {
        // Server
        if self.server.host.trim().is_empty() {
            return Err("server.host is required".into());
        }
        if self.server.port == 0 {
            return Err("server.port must be greater than 0".into());
        }

        // Session
        if self.session.history_limit == Some(0) {
            return Err("session.history_limit must be at least 1 or null".into());
        }

        // Logging
        match self.logging.level.to_lowercase().trim() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err("logging.level must be one of trace, debug, info, warn, error".into())
            }
        }
        match self.logging.format.to_lowercase().trim() {
            "console" | "json" => {}
            _ => return Err("logging.format must be one of console, json".into()),
        }

        // Client
        let url = self.client.url.trim();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err("client.url must start with ws:// or wss://".into());
        }
        if self.client.reconnect_delay_ms == 0 {
            return Err("client.reconnect_delay_ms must be greater than 0".into());
        }
        if self.client.action_log_limit == 0 {
            return Err("client.action_log_limit must be at least 1".into());
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// `None` keeps undo history unbounded.
    pub history_limit: Option<usize>,
    /// Metadata echoed to clients as `userContext`.
    pub user_context: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "console".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub reconnect_delay_ms: u64,
    pub action_log_limit: usize,
}

impl ClientConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: format!("ws://{DEFAULT_HOST}:{DEFAULT_PORT}"),
            reconnect_delay_ms: 2000,
            action_log_limit: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Expand a leading `~` component to the home directory. Other paths are
/// returned untouched, including ones that are not valid UTF-8.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home_dir(),
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Search `./marquee.yaml` then `~/.config/marquee/config.yaml`.
pub fn find_config_file() -> Option<PathBuf> {
    config_search_paths()
        .into_iter()
        .find(|candidate| candidate.is_file())
}

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("marquee.yaml")];
    let home = home_dir();
    if home.as_os_str() != "" {
        paths.push(home.join(".config/marquee/config.yaml"));
    }
    paths
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn rejected(cfg: &Config) -> String {
        match cfg.validate() {
            Ok(()) => panic!("expected validation error"),
            Err(err) => err,
        }
    }

    #[test]
    fn config_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 8765);
        assert_eq!(cfg.session.history_limit, None);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, "console");
        assert_eq!(cfg.client.url, "ws://127.0.0.1:8765");
        assert_eq!(cfg.client.reconnect_delay(), Duration::from_secs(2));
        assert_eq!(cfg.client.action_log_limit, 20);
        assert!(cfg.validate().is_ok(), "default config must validate");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = Config::from_yaml(
            "server:\n  port: 9000\nsession:\n  history_limit: 50\n  user_context:\n    team: ops\n",
        )
        .unwrap_or_else(|err| panic!("parse yaml: {err}"));
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.session.history_limit, Some(50));
        assert_eq!(cfg.session.user_context["team"], "ops");
        assert_eq!(cfg.logging, LoggingConfig::default());
    }

    #[test]
    fn empty_yaml_is_default() {
        let cfg = Config::from_yaml("  \n").unwrap_or_else(|err| panic!("parse yaml: {err}"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn unreadable_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let err = match Config::from_file(&dir.path().join("missing.yaml")) {
            Ok(_) => panic!("expected read error"),
            Err(err) => err,
        };
        assert!(matches!(err, ConfigError::Read { .. }), "err={err}");
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let path = dir.path().join("marquee.yaml");
        std::fs::write(&path, "server: [not, a, map]\n")
            .unwrap_or_else(|err| panic!("write config: {err}"));
        let err = match Config::from_file(&path) {
            Ok(_) => panic!("expected parse error"),
            Err(err) => err,
        };
        assert!(matches!(err, ConfigError::Parse { .. }), "err={err}");
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("MARQUEE_HOST", "0.0.0.0"),
            ("MARQUEE_PORT", "9100"),
            ("MARQUEE_LOG_LEVEL", "debug"),
            ("MARQUEE_LOG_FORMAT", "json"),
            ("MARQUEE_URL", "ws://example:9100"),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::default();
        cfg.apply_env_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap_or_else(|err| panic!("apply overrides: {err}"));
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, "json");
        assert_eq!(cfg.client.url, "ws://example:9100");
    }

    #[test]
    fn bad_env_port_is_rejected() {
        let mut cfg = Config::default();
        let result =
            cfg.apply_env_overrides_from(|key| (key == "MARQUEE_PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        assert!(rejected(&cfg).contains("server.port"));

        let mut cfg = Config::default();
        cfg.session.history_limit = Some(0);
        assert!(rejected(&cfg).contains("history_limit"));

        let mut cfg = Config::default();
        cfg.logging.level = "bogus".into();
        assert!(rejected(&cfg).contains("logging.level"));

        let mut cfg = Config::default();
        cfg.logging.format = "xml".into();
        assert!(rejected(&cfg).contains("logging.format"));

        let mut cfg = Config::default();
        cfg.client.reconnect_delay_ms = 0;
        assert!(rejected(&cfg).contains("reconnect_delay_ms"));

        let mut cfg = Config::default();
        cfg.client.action_log_limit = 0;
        assert!(rejected(&cfg).contains("action_log_limit"));

        let mut cfg = Config::default();
        cfg.client.url = "http://localhost".into();
        assert!(rejected(&cfg).contains("client.url"));
    }

    #[test]
    fn expand_tilde_only_touches_home_prefix() {
        assert_eq!(
            expand_tilde(Path::new("/etc/marquee.yaml")),
            PathBuf::from("/etc/marquee.yaml")
        );
        assert_eq!(expand_tilde(Path::new("~")), home_dir());
        assert_eq!(
            expand_tilde(Path::new("~/x.yaml")),
            home_dir().join("x.yaml")
        );
        assert_eq!(
            expand_tilde(Path::new("~other/x.yaml")),
            PathBuf::from("~other/x.yaml")
        );
    }

    #[cfg(unix)]
    #[test]
    fn expand_tilde_keeps_non_utf8_paths() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = Path::new(OsStr::from_bytes(b"/tmp/marquee-\xff.yaml"));
        assert_eq!(expand_tilde(raw), raw.to_path_buf());
    }
}
