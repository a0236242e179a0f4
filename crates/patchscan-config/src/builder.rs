//! Configuration builder for layered configuration loading

use crate::{Config, ConfigError, ConfigResult};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use patchscan_types::WorkerCount;
use std::path::{Path, PathBuf};

/// Configuration builder for loading configuration from multiple sources
#[derive(Debug)]
pub struct ConfigBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<ConfigSource>,
    env_separator: String,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    File { path: PathBuf, format: FileFormat },
    Defaults,
    Environment { prefix: String },
    Override { key: String, value: String },
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
            env_separator: "__".to_string(),
        }
    }

    /// Add default configuration values
    pub fn add_defaults(mut self) -> Self {
        self.sources.push(ConfigSource::Defaults);
        self
    }

    /// Add a configuration file source; missing files are skipped
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = Self::detect_format(&path);
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Pin a single key, e.g. `scan.worker_count`, above every other layer
    pub fn set_override<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.sources.push(ConfigSource::Override {
            key: key.into(),
            value: value.to_string(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Build the configuration
    ///
    /// Sources apply in the order they were added; overrides always win.
    /// Sections no source sets fall back to their `Default` value.
    pub fn build(mut self) -> ConfigResult<Config> {
        for source in &self.sources {
            match source {
                ConfigSource::Defaults => {
                    let defaults_value = serde_yaml::to_value(Config::default()).map_err(|e| {
                        ConfigError::other(format!("Failed to serialize defaults: {}", e))
                    })?;
                    self.inner = self
                        .inner
                        .add_source(config::Config::try_from(&defaults_value)?);
                }
                ConfigSource::File { path, format } => {
                    if path.exists() {
                        self.inner = self
                            .inner
                            .add_source(File::from(path.clone()).format(*format));
                    }
                }
                ConfigSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix)
                            .separator(&self.env_separator)
                            .try_parsing(true),
                    );
                }
                ConfigSource::Override { key, value } => {
                    self.inner = self.inner.set_override(key.as_str(), value.as_str())?;
                }
            }
        }

        let config = self.inner.build()?;
        let result: Config = config.try_deserialize()?;

        Self::validate(&result)?;

        Ok(result)
    }

    /// Try to build the configuration, returning defaults on error
    pub fn build_or_default(self) -> Config {
        self.build().unwrap_or_default()
    }

    /// Detect file format from extension
    fn detect_format(path: &Path) -> FileFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }

    /// Validate the configuration
    fn validate(config: &Config) -> ConfigResult<()> {
        let workers = config.scan.worker_count.get();
        if workers < WorkerCount::MIN || workers > WorkerCount::MAX {
            return Err(ConfigError::validation(format!(
                "Worker count must be between {} and {}",
                WorkerCount::MIN,
                WorkerCount::MAX
            )));
        }

        if config.scan.progress_interval_ms == 0 {
            return Err(ConfigError::validation(
                "Progress interval must be greater than 0",
            ));
        }

        if config.install.executable_name.trim().is_empty() {
            return Err(ConfigError::validation("Executable name must not be empty"));
        }

        if config.install.data_dir.starts_with('/') || config.install.data_dir.contains('\\') {
            return Err(ConfigError::invalid_value(
                "install.data_dir",
                "must be a forward-slash path relative to the installation",
            ));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&config.logging.level.as_str()) {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().add_defaults().build().unwrap();
        assert_eq!(config.install.executable_name, "pso2.exe");
        assert!(!config.install.mod_files_enabled);
    }

    #[test]
    fn test_builder_yaml_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
install:
  install_dir: /games/pso2
  mod_files_enabled: true
scan:
  worker_count: 3
  prescan_enabled: false
"#
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert_eq!(config.install.install_dir, PathBuf::from("/games/pso2"));
        assert!(config.install.mod_files_enabled);
        assert_eq!(config.install.data_dir, "data/win32");
        assert_eq!(config.scan.worker_count.get(), 3);
        assert!(!config.scan.prescan_enabled);
    }

    #[test]
    fn test_overrides_win_over_files() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "scan:\n  worker_count: 3\n").unwrap();

        let config = ConfigBuilder::new()
            .set_override("scan.worker_count", 7)
            .add_defaults()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();
        assert_eq!(config.scan.worker_count.get(), 7);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = ConfigBuilder::new()
            .add_defaults()
            .set_override("scan.worker_count", 0)
            .build();
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_builder_validation() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
scan:
  worker_count: 0
"#
        )
        .unwrap();

        let result = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Worker count must be between"));
    }

    #[test]
    fn test_builder_rejects_absolute_data_dir() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
install:
  data_dir: /data/win32
"#
        )
        .unwrap();

        let result = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build();

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
