//! Poller configuration.
//!
//! Layered the 12-factor way:
//! 1. Defaults (from code)
//! 2. Config file (tinklink.toml)
//! 3. Environment variables (TINKLINK_* prefix)
//!
//! # Example
//!
//! ```no_run
//! use tinklink_polling::config::ConfigLoader;
//!
//! let config = ConfigLoader::load_default().expect("Failed to load config");
//!
//! let config = ConfigLoader::new()
//!     .with_file("./tinklink.toml")
//!     .load()
//!     .expect("Failed to load config");
//! ```
pub mod error;
pub mod loader;

pub use error::{ConfigError, Result};
pub use loader::{BackoffConfig, ConfigLoader, PollerConfig};
