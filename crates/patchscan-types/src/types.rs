//! Core data types for patchscan
//!
//! This module provides the manifest and cache records the comparison engine
//! joins by name, along with the opaque content hash and the 64-bit file time
//! used for cheap staleness checks.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Suffix carried by every manifest name that is not part of the on-disk name
pub const PATCH_SUFFIX: &str = ".pat";

/// Snapshot of the on-disk cache, keyed by manifest name
pub type CacheSnapshot = HashMap<String, CacheEntry>;

/// Opaque content digest as published by the manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap a digest string
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Borrow the digest string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentHash {
    fn from(hash: &str) -> Self {
        Self::new(hash)
    }
}

impl From<String> for ContentHash {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

/// Last-write timestamp in Windows file-time units
///
/// Ticks are 100-nanosecond intervals since 1601-01-01 UTC. Directory
/// enumeration on Windows reports this value split into two 32-bit halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct FileTime(u64);

impl FileTime {
    /// Ticks between 1601-01-01 and the Unix epoch
    pub const UNIX_EPOCH_TICKS: u64 = 116_444_736_000_000_000;
    /// Ticks per second
    pub const TICKS_PER_SECOND: u64 = 10_000_000;

    /// Create a file time from raw ticks
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Reassemble a file time from the high and low 32-bit halves
    pub const fn from_halves(high: u32, low: u32) -> Self {
        Self(((high as u64) << 32) | low as u64)
    }

    /// Raw tick count
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// High 32 bits
    pub const fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Low 32 bits
    pub const fn low(self) -> u32 {
        self.0 as u32
    }

    /// Convert a system time, saturating at the 1601 epoch
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self(Self::UNIX_EPOCH_TICKS.saturating_add(duration_ticks(after))),
            Err(before) => {
                Self(Self::UNIX_EPOCH_TICKS.saturating_sub(duration_ticks(before.duration())))
            }
        }
    }

    /// Convert back into a system time
    pub fn to_system_time(self) -> SystemTime {
        if self.0 >= Self::UNIX_EPOCH_TICKS {
            UNIX_EPOCH + ticks_duration(self.0 - Self::UNIX_EPOCH_TICKS)
        } else {
            UNIX_EPOCH - ticks_duration(Self::UNIX_EPOCH_TICKS - self.0)
        }
    }

    /// Read the last-write time out of file metadata
    ///
    /// On Windows this is the native value; elsewhere it is derived from the
    /// modification time.
    pub fn from_metadata(metadata: &Metadata) -> std::io::Result<Self> {
        #[cfg(windows)]
        {
            use std::os::windows::fs::MetadataExt;
            Ok(Self(metadata.last_write_time()))
        }
        #[cfg(not(windows))]
        {
            metadata.modified().map(Self::from_system_time)
        }
    }

    /// Stat a path and return its last-write time
    pub fn for_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Self::from_metadata(&metadata)
    }
}

fn duration_ticks(duration: Duration) -> u64 {
    duration
        .as_secs()
        .saturating_mul(FileTime::TICKS_PER_SECOND)
        .saturating_add(u64::from(duration.subsec_nanos() / 100))
}

fn ticks_duration(ticks: u64) -> Duration {
    Duration::new(
        ticks / FileTime::TICKS_PER_SECOND,
        ((ticks % FileTime::TICKS_PER_SECOND) * 100) as u32,
    )
}

impl fmt::Display for FileTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One remote file described by the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ManifestEntry {
    /// Forward-slash path with the `.pat` suffix, unique within a manifest
    pub name: String,
    /// Expected content digest
    pub hash: ContentHash,
    /// Expected size in bytes
    #[cfg_attr(feature = "serde", serde(default))]
    pub size: u64,
}

impl ManifestEntry {
    /// Create a new manifest entry
    pub fn new(name: impl Into<String>, hash: impl Into<ContentHash>, size: u64) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
            size,
        }
    }

    /// Build the manifest name a file inside `data_dir` would carry
    pub fn name_for(data_dir: &str, file_name: &str) -> String {
        let data_dir = data_dir.trim_end_matches('/');
        format!("{}/{}{}", data_dir, file_name, PATCH_SUFFIX)
    }

    /// Manifest name with the `.pat` suffix removed
    pub fn target_name(&self) -> &str {
        self.name
            .strip_suffix(PATCH_SUFFIX)
            .unwrap_or(&self.name)
    }

    /// Final path segment of the on-disk target
    pub fn file_name(&self) -> &str {
        let target = self.target_name();
        target.rsplit('/').next().unwrap_or(target)
    }

    /// On-disk target relative to the installation directory
    pub fn relative_path(&self) -> PathBuf {
        self.target_name()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    /// On-disk target inside the given installation directory
    pub fn local_path(&self, install_dir: &Path) -> PathBuf {
        install_dir.join(self.relative_path())
    }
}

/// Last known-good record of a file from a previous run
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct CacheEntry {
    /// Content digest recorded when the file was last written
    pub hash: ContentHash,
    /// Last-write time recorded when the file was last written
    pub last_write_time: FileTime,
}

impl CacheEntry {
    /// Create a new cache entry
    pub fn new(hash: impl Into<ContentHash>, last_write_time: FileTime) -> Self {
        Self {
            hash: hash.into(),
            last_write_time,
        }
    }
}
