//! Test fixtures for patchscan integration tests
//!
//! [`Installation`] lays out a throwaway game installation on disk and can
//! record a cache the way a patcher would after a successful download.

#![warn(missing_docs)]
#![warn(clippy::all)]

use patchscan_config::Config;
use patchscan_types::{
    CacheEntry, CacheSnapshot, FileTime, InstallConfig, ManifestEntry, WorkerCount,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Base timestamp used by fixtures, in Unix seconds
pub const BASE_TIME: i64 = 1_600_000_000;

/// A temporary game installation
pub struct Installation {
    temp_dir: TempDir,
    install: InstallConfig,
}

impl Installation {
    /// Create an empty installation with its data and mods directories
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let install = InstallConfig::new(temp_dir.path());
        fs::create_dir_all(install.data_path())?;
        fs::create_dir_all(install.mods_path())?;
        Ok(Self { temp_dir, install })
    }

    /// Installation settings
    pub fn install(&self) -> &InstallConfig {
        &self.install
    }

    /// Mutable installation settings
    pub fn install_mut(&mut self) -> &mut InstallConfig {
        &mut self.install
    }

    /// Installation root
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a file for a manifest entry and pin its last-write time
    pub fn write(&self, entry: &ManifestEntry, unix_secs: i64) -> std::io::Result<PathBuf> {
        let path = entry.local_path(&self.install.install_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, entry.hash.as_str())?;
        set_mtime(&path, unix_secs)?;
        Ok(path)
    }

    /// Place a same-named file in the mods directory
    pub fn write_mod(&self, file_name: &str) -> std::io::Result<PathBuf> {
        let path = self.install.mods_path().join(file_name);
        fs::write(&path, b"mod")?;
        Ok(path)
    }

    /// Record every manifest entry present on disk, as a patcher would after
    /// downloading it
    pub fn record_cache(&self, manifest: &[ManifestEntry]) -> std::io::Result<CacheSnapshot> {
        let mut cache = CacheSnapshot::new();
        for entry in manifest {
            let path = entry.local_path(&self.install.install_dir);
            match FileTime::for_path(&path) {
                Ok(time) => {
                    cache.insert(entry.name.clone(), CacheEntry::new(entry.hash.clone(), time));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(cache)
    }

    /// Configuration pointing at this installation
    pub fn config(&self, workers: usize, prescan_enabled: bool) -> Config {
        let mut config = Config::default();
        config.install = self.install.clone();
        config.scan.worker_count = WorkerCount::new(workers).unwrap_or_default();
        config.scan.prescan_enabled = prescan_enabled;
        config.scan.progress_interval_ms = 5;
        config
    }
}

/// `count` data-directory entries named `f0000` onwards
pub fn data_manifest(count: usize) -> Vec<ManifestEntry> {
    (0..count)
        .map(|i| {
            ManifestEntry::new(
                format!("data/win32/f{:04}.pat", i),
                format!("H{}", i),
                (i as u64 + 1) * 100,
            )
        })
        .collect()
}

/// Pin a file's last-write time to whole Unix seconds
pub fn set_mtime(path: &Path, unix_secs: i64) -> std::io::Result<()> {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(unix_secs, 0))
}
