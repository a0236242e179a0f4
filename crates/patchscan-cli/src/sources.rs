//! File-backed manifest, cache and executable-patch collaborators

use async_trait::async_trait;
use patchscan_types::{
    CacheSnapshot, CacheStore, ContentHash, DownloadConfig, Error, InstallConfig, LaaDetector,
    ManifestEntry, ManifestSource, Result,
};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Manifest read from a local JSON array of `{name, hash, size}` objects
///
/// The location is taken from [`DownloadConfig::manifest_location`].
#[derive(Debug, Default)]
pub struct JsonManifestSource;

#[async_trait]
impl ManifestSource for JsonManifestSource {
    async fn fetch(
        &self,
        _install: &InstallConfig,
        download: &DownloadConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<ManifestEntry>> {
        if download.manifest_location.is_empty() {
            return Err(Error::manifest("No manifest location configured"));
        }
        let path = PathBuf::from(&download.manifest_location);

        let bytes = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            read = tokio::fs::read(&path) => read.map_err(|e| Error::io_at(&path, &e))?,
        };

        let entries: Vec<ManifestEntry> = serde_json::from_slice(&bytes).map_err(|e| {
            Error::manifest(format!("Invalid manifest '{}': {}", path.display(), e))
        })?;
        debug!("Read {} manifest entries from '{}'", entries.len(), path.display());
        Ok(entries)
    }
}

/// Cache snapshot read from a JSON object of `name -> {hash, lastWriteTime}`
#[derive(Debug, Clone)]
pub struct JsonCacheStore {
    path: PathBuf,
}

impl JsonCacheStore {
    /// Create a store backed by the given file
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl CacheStore for JsonCacheStore {
    fn select_all(&self) -> Result<CacheSnapshot> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            // First run: nothing has been cached yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache at '{}', starting empty", self.path.display());
                return Ok(CacheSnapshot::new());
            }
            Err(e) => return Err(Error::io_at(&self.path, &e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            Error::cache(format!("Invalid cache '{}': {}", self.path.display(), e))
        })
    }
}

/// Detects the large-address-aware flag in the executable's PE header
///
/// A patched executable has `IMAGE_FILE_LARGE_ADDRESS_AWARE` set and a
/// `<exe>.laa` marker file next to it recording the hash of the stock
/// executable the patch was applied to.
#[derive(Debug, Default)]
pub struct PeLaaDetector;

impl PeLaaDetector {
    const IMAGE_FILE_LARGE_ADDRESS_AWARE: u16 = 0x0020;
    const PE_POINTER_OFFSET: u64 = 0x3C;
    // Signature (4) then Machine, NumberOfSections, TimeDateStamp,
    // PointerToSymbolTable, NumberOfSymbols, SizeOfOptionalHeader
    const CHARACTERISTICS_OFFSET: u64 = 4 + 18;

    /// Marker file recording the stock hash of a patched executable
    pub fn marker_path(executable: &Path) -> PathBuf {
        let mut name = executable.as_os_str().to_os_string();
        name.push(".laa");
        PathBuf::from(name)
    }

    /// Read the COFF characteristics of a PE image
    fn characteristics(path: &Path) -> Result<u16> {
        let mut file = File::open(path).map_err(|e| Error::io_at(path, &e))?;
        let invalid = |what: &str| Error::detector(format!("'{}': {}", path.display(), what));

        let mut mz = [0u8; 2];
        file.read_exact(&mut mz).map_err(|_| invalid("truncated DOS header"))?;
        if &mz != b"MZ" {
            return Err(invalid("missing MZ signature"));
        }

        let mut pointer = [0u8; 4];
        file.seek(SeekFrom::Start(Self::PE_POINTER_OFFSET))
            .and_then(|_| file.read_exact(&mut pointer))
            .map_err(|_| invalid("truncated DOS header"))?;
        let pe_offset = u64::from(u32::from_le_bytes(pointer));

        let mut signature = [0u8; 4];
        file.seek(SeekFrom::Start(pe_offset))
            .and_then(|_| file.read_exact(&mut signature))
            .map_err(|_| invalid("truncated PE header"))?;
        if &signature != b"PE\0\0" {
            return Err(invalid("missing PE signature"));
        }

        let mut characteristics = [0u8; 2];
        file.seek(SeekFrom::Start(pe_offset + Self::CHARACTERISTICS_OFFSET))
            .and_then(|_| file.read_exact(&mut characteristics))
            .map_err(|_| invalid("truncated COFF header"))?;
        Ok(u16::from_le_bytes(characteristics))
    }
}

impl LaaDetector for PeLaaDetector {
    fn is_patched(&self, install: &InstallConfig, expected_hash: &ContentHash) -> Result<bool> {
        let executable = install.executable_path();
        if !executable.exists() {
            return Ok(false);
        }

        if Self::characteristics(&executable)? & Self::IMAGE_FILE_LARGE_ADDRESS_AWARE == 0 {
            return Ok(false);
        }

        let marker = Self::marker_path(&executable);
        let recorded = match std::fs::read_to_string(&marker) {
            Ok(recorded) => recorded,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("LAA flag set but no marker at '{}'", marker.display());
                return Ok(false);
            }
            Err(e) => return Err(Error::io_at(&marker, &e)),
        };

        Ok(recorded.trim().eq_ignore_ascii_case(expected_hash.as_str()))
    }
}
