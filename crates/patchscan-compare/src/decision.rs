//! Per-file update decision
//!
//! Rules are applied in order and the first one that matches wins:
//!
//! 1. a same-named file in the mods directory overrides a data-directory file
//! 2. a file the cache has never seen needs an update
//! 3. a manifest hash that differs from the cached hash needs an update
//! 4. a locally large-address-aware patched executable is left alone
//! 5. otherwise the live last-write time is compared against the cached one
//!
//! The two skip rules sit in front of the timestamp check because rule 5
//! would otherwise flag both kinds of locally modified file.

use patchscan_types::{
    CacheSnapshot, Error, FileTime, InstallConfig, LaaDetector, ManifestEntry, Result,
};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Why a file needs to be downloaded again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    /// The cache has no record of the file
    NotCached,
    /// The manifest publishes different content than was cached
    HashChanged,
    /// The file on disk was written after it was cached
    Modified,
    /// The file is missing from disk
    Missing,
}

/// Why a file is exempt from the update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A mod file overrides the stock file
    ModOverride,
    /// The executable carries a local large-address-aware patch
    LaaPatched,
}

/// Outcome of checking one manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The file must be downloaded
    Update(UpdateReason),
    /// The file matches the cache
    UpToDate,
    /// The file is exempt from checking
    Skip(SkipReason),
}

impl Decision {
    /// Whether the file belongs in the update set
    pub fn should_update(self) -> bool {
        matches!(self, Self::Update(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update(UpdateReason::NotCached) => f.write_str("update (not cached)"),
            Self::Update(UpdateReason::HashChanged) => f.write_str("update (hash changed)"),
            Self::Update(UpdateReason::Modified) => f.write_str("update (modified on disk)"),
            Self::Update(UpdateReason::Missing) => f.write_str("update (missing)"),
            Self::UpToDate => f.write_str("up to date"),
            Self::Skip(SkipReason::ModOverride) => f.write_str("skip (mod override)"),
            Self::Skip(SkipReason::LaaPatched) => f.write_str("skip (LAA patched)"),
        }
    }
}

/// Everything the decision needs besides the entry itself
///
/// Shared read-only by every scan worker for the duration of a run.
pub struct DecisionContext {
    install: InstallConfig,
    data_path: PathBuf,
    mods_path: PathBuf,
    cache: Arc<CacheSnapshot>,
    detector: Arc<dyn LaaDetector>,
}

impl fmt::Debug for DecisionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionContext")
            .field("install", &self.install)
            .field("cached_entries", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl DecisionContext {
    /// Create a decision context
    pub fn new(
        install: InstallConfig,
        cache: Arc<CacheSnapshot>,
        detector: Arc<dyn LaaDetector>,
    ) -> Self {
        Self {
            data_path: install.data_path(),
            mods_path: install.mods_path(),
            install,
            cache,
            detector,
        }
    }

    /// Installation this context checks against
    pub fn install(&self) -> &InstallConfig {
        &self.install
    }

    /// Decide whether one manifest entry needs an update
    pub fn decide(&self, entry: &ManifestEntry) -> Result<Decision> {
        let local_path = entry.local_path(&self.install.install_dir);

        if self.is_mod_override(entry, &local_path) {
            return Ok(Decision::Skip(SkipReason::ModOverride));
        }

        let Some(cached) = self.cache.get(&entry.name) else {
            return Ok(Decision::Update(UpdateReason::NotCached));
        };

        if cached.hash != entry.hash {
            return Ok(Decision::Update(UpdateReason::HashChanged));
        }

        if self.install.large_address_aware && self.is_executable(entry) {
            let patched = self
                .detector
                .is_patched(&self.install, &entry.hash)
                .map_err(|e| Error::decision(&entry.name, e.to_string()))?;
            if patched {
                return Ok(Decision::Skip(SkipReason::LaaPatched));
            }
        }

        // Fresh stat: the pre-scan snapshot may be stale by now
        match FileTime::for_path(&local_path) {
            Ok(time) if time == cached.last_write_time => Ok(Decision::UpToDate),
            Ok(time) => {
                debug!(
                    "'{}' last written at {}, cached {}",
                    entry.name, time, cached.last_write_time
                );
                Ok(Decision::Update(UpdateReason::Modified))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(Decision::Update(UpdateReason::Missing))
            }
            Err(e) => Err(Error::decision(
                &entry.name,
                format!("cannot stat '{}': {}", local_path.display(), e),
            )),
        }
    }

    fn is_mod_override(&self, entry: &ManifestEntry, local_path: &Path) -> bool {
        self.install.mod_files_enabled
            && local_path.parent() == Some(self.data_path.as_path())
            && self.mods_path.join(entry.file_name()).exists()
    }

    fn is_executable(&self, entry: &ManifestEntry) -> bool {
        entry.target_name() == self.install.executable_name
    }
}
