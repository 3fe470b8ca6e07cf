use std::fmt::Display;

use crate::gateway;

#[derive(Debug)]
pub enum Error {
    Json(serde_json::Error),
    Websocket(tokio_tungstenite::tungstenite::Error),
    Gateway(gateway::error::Error),
    Io(std::io::Error),
    Redis(redis::RedisError),
    Http(reqwest::Error),
    Config(ConfigError),
}

#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(toml::de::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read(e) => write!(f, "failed to read config file: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse config file: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Websocket(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<gateway::error::Error> for Error {
    fn from(e: gateway::error::Error) -> Self {
        Self::Gateway(e)
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Self::Redis(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Json(e) => Display::fmt(&e, f),
            Error::Websocket(e) => Display::fmt(&e, f),
            Error::Io(e) => Display::fmt(&e, f),
            Error::Gateway(e) => Display::fmt(&e, f),
            Error::Redis(e) => Display::fmt(&e, f),
            Error::Http(e) => Display::fmt(&e, f),
            Error::Config(e) => Display::fmt(&e, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(e) => Some(e),
            Error::Websocket(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Gateway(e) => Some(e),
            Error::Redis(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Config(e) => Some(e),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
