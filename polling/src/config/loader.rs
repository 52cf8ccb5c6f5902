use crate::backoff::{BackoffState, BackoffStrategy};
use crate::config::error::{ConfigError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment prefix for overrides, e.g. `TINKLINK_BACKOFF__STRATEGY=exponential`
const ENV_PREFIX: &str = "TINKLINK";

const CONFIG_FILE_NAME: &str = "tinklink.toml";

/// Configuration handed to every poller at construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Backoff between status queries
    #[serde(default)]
    pub backoff: BackoffConfig,
}

/// Backoff configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// How the interval grows after each unconverged cycle
    #[serde(default)]
    pub strategy: BackoffStrategy,

    /// First delay, the linear step, and the value restored on pause
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,

    /// Upper bound for the interval (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval_ms: Option<u64>,
}

fn default_base_interval_ms() -> u64 {
    1000
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::default(),
            base_interval_ms: default_base_interval_ms(),
            max_interval_ms: None,
        }
    }
}

impl BackoffConfig {
    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    pub fn max_interval(&self) -> Option<Duration> {
        self.max_interval_ms.map(Duration::from_millis)
    }

    /// Fresh backoff state for one poller.
    pub fn state(&self) -> BackoffState {
        BackoffState::new(self.strategy, self.base_interval(), self.max_interval())
    }
}

impl PollerConfig {
    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff.strategy = strategy;
        self
    }

    pub fn with_base_interval(mut self, interval: Duration) -> Self {
        self.backoff.base_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.backoff.max_interval_ms = Some(interval.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn validate(&self) -> Result<()> {
        let backoff = &self.backoff;
        if backoff.base_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "backoff.base_interval_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(max) = backoff.max_interval_ms
            && max < backoff.base_interval_ms
        {
            return Err(ConfigError::ValidationError(format!(
                "backoff.max_interval_ms ({max}) is below backoff.base_interval_ms ({})",
                backoff.base_interval_ms
            )));
        }
        Ok(())
    }
}

/// Configuration loader with layered merging support
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration with layered merging:
    /// 1. Start with defaults
    /// 2. Merge config file if provided
    /// 3. Override with environment variables (TINKLINK_ prefix)
    pub fn load(&self) -> Result<PollerConfig> {
        let mut builder = Config::builder();

        let defaults_json = serde_json::to_string(&PollerConfig::default())?;
        builder = builder.add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        if let Some(ref path) = self.config_path {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_ref()));
            } else {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
        }

        // Double underscore separates nested keys: TINKLINK_BACKOFF__BASE_INTERVAL_MS=500
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let poller_config: PollerConfig = config.try_deserialize()?;
        poller_config.validate()?;

        tracing::debug!(
            strategy = ?poller_config.backoff.strategy,
            base_interval_ms = poller_config.backoff.base_interval_ms,
            "loaded poller configuration"
        );
        Ok(poller_config)
    }

    /// First existing file among `./tinklink.toml`,
    /// `<config dir>/tinklink/config.toml` and `~/.tinklink.toml`.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            Some(PathBuf::from(".").join(CONFIG_FILE_NAME)),
            dirs::config_dir().map(|dir| dir.join("tinklink").join("config.toml")),
            dirs::home_dir().map(|dir| dir.join(format!(".{CONFIG_FILE_NAME}"))),
        ];
        candidates.into_iter().flatten().find(|path| path.exists())
    }

    /// [`ConfigLoader::load`] with whatever file [`ConfigLoader::find_config_file`]
    /// finds, or defaults and environment only.
    pub fn load_default() -> Result<PollerConfig> {
        Self {
            config_path: Self::find_config_file(),
        }
        .load()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("create temp config");
        file.write_all(contents.as_bytes()).expect("write temp config");
        file
    }

    #[test]
    fn test_default_config() {
        let config = PollerConfig::default();
        assert_eq!(config.backoff.strategy, BackoffStrategy::Linear);
        assert_eq!(config.backoff.base_interval(), Duration::from_secs(1));
        assert_eq!(config.backoff.max_interval(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_with_defaults_only() {
        let config = ConfigLoader::new().load().expect("Failed to load default config");
        assert_eq!(config, PollerConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let file = write_toml(
            r#"
[backoff]
strategy = "exponential"
base_interval_ms = 250
max_interval_ms = 8000
"#,
        );

        let config = ConfigLoader::new().with_file(file.path()).load().unwrap();

        assert_eq!(config.backoff.strategy, BackoffStrategy::Exponential);
        assert_eq!(config.backoff.base_interval(), Duration::from_millis(250));
        assert_eq!(config.backoff.max_interval(), Some(Duration::from_secs(8)));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let file = write_toml(
            r#"
[backoff]
strategy = "exponential"
"#,
        );
        unsafe {
            env::set_var("TINKLINK_BACKOFF__STRATEGY", "none");
            env::set_var("TINKLINK_BACKOFF__BASE_INTERVAL_MS", "2000");
        }

        let result = ConfigLoader::new().with_file(file.path()).load();

        unsafe {
            env::remove_var("TINKLINK_BACKOFF__STRATEGY");
            env::remove_var("TINKLINK_BACKOFF__BASE_INTERVAL_MS");
        }
        let config = result.unwrap();
        assert_eq!(config.backoff.strategy, BackoffStrategy::None);
        assert_eq!(config.backoff.base_interval_ms, 2000);
    }

    #[test]
    #[serial]
    fn test_missing_file_is_reported() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/tinklink.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    #[serial]
    fn test_load_default_prefers_working_directory_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[backoff]\nstrategy = \"none\"\nbase_interval_ms = 750\n",
        )
        .expect("write config");
        let previous = env::current_dir().expect("current dir");
        env::set_current_dir(dir.path()).expect("enter temp dir");

        let found = ConfigLoader::find_config_file();
        let loaded = ConfigLoader::load_default();

        env::set_current_dir(previous).expect("restore current dir");
        assert_eq!(found, Some(PathBuf::from("./tinklink.toml")));
        let config = loaded.unwrap();
        assert_eq!(config.backoff.strategy, BackoffStrategy::None);
        assert_eq!(config.backoff.base_interval(), Duration::from_millis(750));
    }

    #[test]
    #[serial]
    fn test_zero_base_interval_rejected() {
        let file = write_toml("[backoff]\nbase_interval_ms = 0\n");

        let err = ConfigLoader::new().with_file(file.path()).load().unwrap_err();

        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_max_below_base_rejected() {
        let config = PollerConfig::default()
            .with_base_interval(Duration::from_secs(2))
            .with_max_interval(Duration::from_secs(1));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_backoff_state_uses_config() {
        let config = PollerConfig::default()
            .with_strategy(BackoffStrategy::Exponential)
            .with_base_interval(Duration::from_millis(500));

        let mut state = config.backoff.state();

        assert_eq!(state.schedule_retry(), Duration::from_millis(500));
        assert_eq!(state.current(), Duration::from_secs(1));
    }
}
