use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub copy: CopyConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// REST base URL of the exchange
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Personal-events push stream URL
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

fn default_base_url() -> String {
    "https://www.mexc.com".to_string()
}

fn default_ws_url() -> String {
    "wss://contract.mexc.com/edge".to_string()
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: default_ws_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// When true, every REST write is logged and skipped. Reads still run.
    /// Defaults to true so a fresh install never trades by accident.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    /// Deadline applied to every ingest-driven action
    #[serde(default = "default_action_timeout")]
    pub action_timeout_secs: u64,
}

fn default_dry_run() -> bool {
    true
}

fn default_action_timeout() -> u64 {
    5
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            dry_run: default_dry_run(),
            action_timeout_secs: default_action_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Public URL of this server, stitched into the browser interceptor script
    #[serde(default = "default_mirror_api_url")]
    pub api_url: String,
}

fn default_mirror_api_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            api_url: default_mirror_api_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable file logging
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,
    /// Directory for log files (relative to working dir or absolute)
    #[serde(default = "default_log_directory")]
    pub directory: String,
    /// Prefix for log file names
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
    /// Rotation strategy: "daily", "hourly", or "never"
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
}

fn default_logging_enabled() -> bool {
    true
}
fn default_log_directory() -> String {
    "logs".to_string()
}
fn default_log_file_prefix() -> String {
    "mexc-copier-server".to_string()
}
fn default_log_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            directory: default_log_directory(),
            file_prefix: default_log_file_prefix(),
            rotation: default_log_rotation(),
        }
    }
}

impl Config {
    /// Read `<base>.toml`, then merge optional override files on top of it.
    ///
    /// Overrides, when present, win key by key: `<base>.<CONFIG_ENV>.toml`
    /// first (only if `CONFIG_ENV` is set), then `<base>.local.toml`, which
    /// is meant for per-machine tweaks and stays out of version control.
    /// Only the base file is required to exist.
    pub fn from_file<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base
            .as_ref()
            .to_str()
            .context("config path is not valid UTF-8")?;

        let mut sources = vec![(base.to_string(), true)];
        if let Ok(env) = std::env::var("CONFIG_ENV") {
            sources.push((format!("{}.{}", base, env), false));
        }
        sources.push((format!("{}.local", base), false));

        let mut builder = config::Config::builder();
        for (name, required) in sources {
            builder = builder.add_source(config::File::with_name(&name).required(required));
        }

        builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("configuration has invalid or missing fields")
    }

    /// Socket address the HTTP listener binds to
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://mexc_copier.db?mode=rwc".to_string(),
            },
            exchange: ExchangeConfig::default(),
            copy: CopyConfig::default(),
            mirror: MirrorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
