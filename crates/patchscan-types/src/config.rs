//! Configuration types for patchscan
//!
//! These describe the installation being checked and where its manifest and
//! cache live. They are plain data; layering and validation live in
//! `patchscan-config`.

use std::path::{Path, PathBuf};

/// Worker count for the parallel scan, with validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerCount(usize);

impl WorkerCount {
    /// Minimum worker count
    pub const MIN: usize = 1;
    /// Maximum worker count
    pub const MAX: usize = 256;

    /// Create a new worker count with validation
    pub fn new(count: usize) -> Result<Self, String> {
        if count < Self::MIN {
            Err(format!("Worker count {} is below minimum {}", count, Self::MIN))
        } else if count > Self::MAX {
            Err(format!("Worker count {} exceeds maximum {}", count, Self::MAX))
        } else {
            Ok(Self(count))
        }
    }

    /// Get the worker count value
    pub fn get(self) -> usize {
        self.0
    }

    /// One worker per available processing unit
    pub fn optimal() -> Self {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self(cpu_count.clamp(Self::MIN, Self::MAX))
    }
}

impl Default for WorkerCount {
    fn default() -> Self {
        Self::optimal()
    }
}

/// The installation being checked and the exemption rules that apply to it
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstallConfig {
    /// Root of the game installation
    pub install_dir: PathBuf,
    /// Primary binary-data directory, forward-slash and relative to the root
    pub data_dir: String,
    /// Mod override directory, relative to the root unless absolute
    pub mods_dir: PathBuf,
    /// Manifest-relative name of the game executable
    pub executable_name: String,
    /// Whether files present in the mods directory take precedence
    pub mod_files_enabled: bool,
    /// Whether a locally large-address-aware patched executable is kept
    pub large_address_aware: bool,
}

impl InstallConfig {
    /// Default primary data directory
    pub const DEFAULT_DATA_DIR: &'static str = "data/win32";
    /// Default mods directory
    pub const DEFAULT_MODS_DIR: &'static str = "mods";
    /// Default executable name
    pub const DEFAULT_EXECUTABLE: &'static str = "pso2.exe";

    /// Create a configuration for the given installation root with defaults
    pub fn new<P: AsRef<Path>>(install_dir: P) -> Self {
        Self {
            install_dir: install_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Enable or disable the mod override rule
    pub fn with_mod_files(mut self, enabled: bool) -> Self {
        self.mod_files_enabled = enabled;
        self
    }

    /// Enable or disable the patched-executable rule
    pub fn with_large_address_aware(mut self, enabled: bool) -> Self {
        self.large_address_aware = enabled;
        self
    }

    /// Absolute path of the primary data directory
    pub fn data_path(&self) -> PathBuf {
        self.install_dir.join(
            self.data_dir
                .split('/')
                .filter(|segment| !segment.is_empty())
                .collect::<PathBuf>(),
        )
    }

    /// Absolute path of the mods directory
    pub fn mods_path(&self) -> PathBuf {
        self.install_dir.join(&self.mods_dir)
    }

    /// Absolute path of the game executable
    pub fn executable_path(&self) -> PathBuf {
        self.install_dir.join(&self.executable_name)
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from("."),
            data_dir: Self::DEFAULT_DATA_DIR.to_string(),
            mods_dir: PathBuf::from(Self::DEFAULT_MODS_DIR),
            executable_name: Self::DEFAULT_EXECUTABLE.to_string(),
            mod_files_enabled: false,
            large_address_aware: false,
        }
    }
}

/// Where the manifest and the metadata cache are fetched from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DownloadConfig {
    /// Manifest location understood by the manifest source (path or URL)
    pub manifest_location: String,
    /// Cache location understood by the cache store
    pub cache_location: PathBuf,
}

impl DownloadConfig {
    /// Create a download configuration
    pub fn new(manifest_location: impl Into<String>, cache_location: impl Into<PathBuf>) -> Self {
        Self {
            manifest_location: manifest_location.into(),
            cache_location: cache_location.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_paths_resolve_against_root() {
        let config = InstallConfig::new("/games/pso2");

        assert_eq!(
            config.data_path(),
            Path::new("/games/pso2").join("data").join("win32")
        );
        assert_eq!(config.mods_path(), Path::new("/games/pso2").join("mods"));
        assert_eq!(
            config.executable_path(),
            Path::new("/games/pso2").join("pso2.exe")
        );
    }

    #[test]
    fn test_install_flags_default_off() {
        let config = InstallConfig::default();
        assert!(!config.mod_files_enabled);
        assert!(!config.large_address_aware);

        let config = config.with_mod_files(true).with_large_address_aware(true);
        assert!(config.mod_files_enabled);
        assert!(config.large_address_aware);
    }

    #[test]
    fn test_optimal_worker_count_in_range() {
        let count = WorkerCount::optimal().get();
        assert!(count >= WorkerCount::MIN && count <= WorkerCount::MAX);
    }
}
