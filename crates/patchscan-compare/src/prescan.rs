//! Metadata pre-scan of the binary-data directory
//!
//! A single flat enumeration of the data directory is far cheaper than one
//! stat per manifest entry. Every enumerated file that the cache knows about
//! gets a hint; the hint only says "no update needed" when the enumerated
//! last-write time equals the cached one exactly.

use patchscan_types::{CacheSnapshot, FileTime, InstallConfig, ManifestEntry};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Hints keyed by manifest name
pub type PreScanHints = HashMap<String, PreScanHint>;

/// What the pre-scan learned about one cached file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreScanHint {
    /// Last-write time seen during enumeration
    pub last_write_time: FileTime,
    /// Starts out `true`; cleared only on an exact timestamp match
    pub should_update: bool,
}

/// One-shot enumerator for the installation's data directory
#[derive(Debug, Clone)]
pub struct PreScanner {
    data_path: PathBuf,
    data_dir: String,
}

impl PreScanner {
    /// Create a pre-scanner for the given installation
    pub fn new(install: &InstallConfig) -> Self {
        Self {
            data_path: install.data_path(),
            data_dir: install.data_dir.clone(),
        }
    }

    /// Enumerate the data directory and derive hints from the cache
    ///
    /// A missing or unreadable directory yields no hints: every candidate
    /// then falls through to the full per-file check.
    ///
    /// An error partway through enumeration stops the scan and keeps the
    /// hints gathered so far. Entries without a hint are never filtered, so
    /// they still get the full per-file check.
    pub fn scan(&self, cache: &CacheSnapshot) -> PreScanHints {
        let mut hints = PreScanHints::new();

        // The walker owns the directory handle and releases it on every exit
        let walker = WalkDir::new(&self.data_path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    debug!(
                        "Data directory '{}' unavailable, pre-scan skipped: {}",
                        self.data_path.display(),
                        e
                    );
                    return PreScanHints::new();
                }
                Err(e) => {
                    warn!("Pre-scan stopped early: {}", e);
                    break;
                }
            };

            if entry.file_type().is_dir() || is_hidden(&entry) {
                continue;
            }

            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            let name = ManifestEntry::name_for(&self.data_dir, file_name);
            let Some(cached) = cache.get(&name) else {
                continue;
            };

            let last_write_time = match entry.metadata() {
                Ok(metadata) => match FileTime::from_metadata(&metadata) {
                    Ok(time) => time,
                    Err(e) => {
                        debug!("No last-write time for '{}': {}", name, e);
                        continue;
                    }
                },
                Err(e) => {
                    debug!("No metadata for '{}': {}", name, e);
                    continue;
                }
            };

            let mut hint = PreScanHint {
                last_write_time,
                should_update: true,
            };
            if last_write_time == cached.last_write_time {
                hint.should_update = false;
            }
            hints.insert(name, hint);
        }

        let unchanged = hints.values().filter(|hint| !hint.should_update).count();
        info!(
            "Pre-scan of '{}': {} cached files seen, {} unchanged",
            self.data_path.display(),
            hints.len(),
            unchanged
        );
        hints
    }
}

#[cfg(windows)]
fn is_hidden(entry: &DirEntry) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

    entry
        .metadata()
        .map(|metadata| metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Drop manifest entries the pre-scan proved unchanged
///
/// An entry is dropped only when its hint says no update is needed and the
/// manifest hash still equals the cached hash, so an upstream content change
/// is never hidden by a matching timestamp.
pub fn filter_candidates(
    manifest: Vec<ManifestEntry>,
    cache: &CacheSnapshot,
    hints: &PreScanHints,
) -> Vec<ManifestEntry> {
    manifest
        .into_iter()
        .filter(|entry| {
            let unchanged = hints
                .get(&entry.name)
                .is_some_and(|hint| !hint.should_update);
            let same_hash = cache
                .get(&entry.name)
                .is_some_and(|cached| cached.hash == entry.hash);
            !(unchanged && same_hash)
        })
        .collect()
}
