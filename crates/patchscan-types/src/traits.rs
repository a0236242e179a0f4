//! Collaborator traits consumed by the comparison engine
//!
//! The engine never talks to the network, the cache database or the
//! executable itself. It goes through these seams instead.

use crate::{CacheSnapshot, ContentHash, InstallConfig, Result};

#[cfg(feature = "async")]
use crate::{DownloadConfig, Error, ManifestEntry};
#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "async")]
use tokio_util::sync::CancellationToken;

/// Source of the authoritative manifest
///
/// Implementations must surface cancellation as [`Error::Cancelled`] so that
/// callers can tell it apart from a failed fetch.
#[cfg(feature = "async")]
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch the ordered list of expected files
    async fn fetch(
        &self,
        install: &InstallConfig,
        download: &DownloadConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<ManifestEntry>>;
}

#[cfg(feature = "async")]
#[async_trait]
impl ManifestSource for Vec<ManifestEntry> {
    async fn fetch(
        &self,
        _install: &InstallConfig,
        _download: &DownloadConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<ManifestEntry>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(self.clone())
    }
}

/// Store of per-file metadata recorded by previous runs
pub trait CacheStore: Send + Sync {
    /// Read every cached record; called once per run
    fn select_all(&self) -> Result<CacheSnapshot>;
}

impl CacheStore for CacheSnapshot {
    fn select_all(&self) -> Result<CacheSnapshot> {
        Ok(self.clone())
    }
}

/// Detector for a locally applied large-address-aware executable patch
pub trait LaaDetector: Send + Sync {
    /// Whether the installed executable carries the patch applied over the
    /// stock build identified by `expected_hash`
    fn is_patched(&self, install: &InstallConfig, expected_hash: &ContentHash) -> Result<bool>;
}

impl<F> LaaDetector for F
where
    F: Fn(&InstallConfig, &ContentHash) -> Result<bool> + Send + Sync,
{
    fn is_patched(&self, install: &InstallConfig, expected_hash: &ContentHash) -> Result<bool> {
        self(install, expected_hash)
    }
}

/// Detector for installations that never carry the patch
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverPatched;

impl LaaDetector for NeverPatched {
    fn is_patched(&self, _install: &InstallConfig, _expected_hash: &ContentHash) -> Result<bool> {
        Ok(false)
    }
}
