//! Process configuration: a TOML file whose path is supplied on the command
//! line, deserialized with per-field fallbacks via "parse CLI args, read
//! the file, deserialize".

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::listen")]
    pub listen: SocketAddr,
    #[serde(default = "ServerConfig::path")]
    pub path: String,
    #[serde(default = "ServerConfig::max_connections")]
    pub max_connections: usize,
    #[serde(default = "ServerConfig::ping_interval_secs")]
    pub ping_interval_secs: u64,
}

impl ServerConfig {
    fn listen() -> SocketAddr {
        "0.0.0.0:8080".parse().unwrap()
    }

    fn path() -> String {
        "/gateway".to_string()
    }

    fn max_connections() -> usize {
        100_000
    }

    fn ping_interval_secs() -> u64 {
        30
    }

    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: Self::listen(),
            path: Self::path(),
            max_connections: Self::max_connections(),
            ping_interval_secs: Self::ping_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "SessionConfig::session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "SessionConfig::resume_window_secs")]
    pub resume_window_secs: u64,
    #[serde(default = "SessionConfig::resume_buffer_max")]
    pub resume_buffer_max: usize,
}

impl SessionConfig {
    fn heartbeat_interval_ms() -> u64 {
        41_250
    }

    fn session_ttl_secs() -> u64 {
        120
    }

    fn resume_window_secs() -> u64 {
        90
    }

    fn resume_buffer_max() -> usize {
        crate::gateway::store::RESUME_BUFFER_MAX
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// The deadline the server allows after each `HEARTBEAT` before
    /// terminating the connection: `HEARTBEAT_INTERVAL + 10s`.
    #[must_use]
    pub fn heartbeat_deadline(&self) -> Duration {
        self.heartbeat_interval() + Duration::from_secs(10)
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    #[must_use]
    pub fn resume_window(&self) -> Duration {
        Duration::from_secs(self.resume_window_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: Self::heartbeat_interval_ms(),
            session_ttl_secs: Self::session_ttl_secs(),
            resume_window_secs: Self::resume_window_secs(),
            resume_buffer_max: Self::resume_buffer_max(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "RedisConfig::url")]
    pub url: String,
}

impl RedisConfig {
    fn url() -> String {
        "redis://127.0.0.1:6379".to_string()
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { url: Self::url() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollaboratorsConfig {
    #[serde(default = "CollaboratorsConfig::base_url")]
    pub auth_base_url: String,
    #[serde(default = "CollaboratorsConfig::base_url")]
    pub snapshot_base_url: String,
    #[serde(default = "CollaboratorsConfig::base_url")]
    pub voice_base_url: String,
    #[serde(default = "CollaboratorsConfig::base_url")]
    pub persistence_base_url: String,
    #[serde(default)]
    pub shared_key: String,
    #[serde(default = "CollaboratorsConfig::timeout_ms")]
    pub timeout_ms: u64,
}

impl CollaboratorsConfig {
    fn base_url() -> String {
        "http://127.0.0.1:4000".to_string()
    }

    fn timeout_ms() -> u64 {
        2_000
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            auth_base_url: Self::base_url(),
            snapshot_base_url: Self::base_url(),
            voice_base_url: Self::base_url(),
            persistence_base_url: Self::base_url(),
            shared_key: String::new(),
            timeout_ms: Self::timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub collaborators: CollaboratorsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Parser, Debug)]
#[command(about = env!("CARGO_PKG_DESCRIPTION"), version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<String>,
}

impl Config {
    /// Parses CLI args, reads the named file (if any), and deserializes it.
    /// No config file yields every field's default.
    pub fn load() -> Result<Self> {
        let cli = Cli::parse();
        let Some(path) = cli.config else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(&path).map_err(ConfigError::Read)?;
        let config = toml::from_str(&raw).map_err(ConfigError::Parse)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.path, "/gateway");
        assert_eq!(config.session.heartbeat_interval_ms, 41_250);
    }

    #[test]
    fn heartbeat_deadline_adds_ten_seconds() {
        let session = SessionConfig::default();
        assert_eq!(
            session.heartbeat_deadline(),
            session.heartbeat_interval() + Duration::from_secs(10)
        );
    }
}
