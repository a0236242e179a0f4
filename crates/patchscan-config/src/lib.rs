//! Configuration management for patchscan
//!
//! Configuration is layered: built-in defaults, then an optional YAML, TOML
//! or JSON file, then `PATCHSCAN__`-prefixed environment variables. The
//! result is validated before it is handed out.
//!
//! # Examples
//!
//! ```rust
//! use patchscan_config::{Config, ConfigBuilder};
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("patchscan.yaml")
//!     .add_env_prefix("PATCHSCAN")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Workers: {}", config.scan.worker_count.get());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use patchscan_types::{DownloadConfig, InstallConfig, WorkerCount};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for patchscan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Installation being checked
    #[serde(default)]
    pub install: InstallConfig,
    /// Manifest and cache locations
    #[serde(default)]
    pub download: DownloadConfig,
    /// Parallel scan tuning
    #[serde(default)]
    pub scan: ScanConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parallel scan tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of scan workers
    pub worker_count: WorkerCount,
    /// How often the progress reporter samples the shared counter
    pub progress_interval_ms: u64,
    /// Whether the directory pre-scan runs before the parallel phase
    pub prescan_enabled: bool,
}

impl ScanConfig {
    /// Progress sampling interval as a duration
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            worker_count: WorkerCount::default(),
            progress_interval_ms: 100,
            prescan_enabled: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
        }
    }
}
