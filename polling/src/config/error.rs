use std::path::PathBuf;
use thiserror::Error;

/// Why a poller configuration could not be produced
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be read or merged, or the merged result has the
    /// wrong shape
    #[error("failed to load poller configuration: {0}")]
    LoadError(String),

    #[error("poller config file {0} does not exist")]
    FileNotFound(PathBuf),

    #[error("invalid poller configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        Self::LoadError(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::LoadError(err.to_string())
    }
}
