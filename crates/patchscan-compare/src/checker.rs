//! Update check orchestration

use crate::{
    coordinator::ScanCoordinator,
    decision::DecisionContext,
    prescan::{filter_candidates, PreScanHints, PreScanner},
    progress::{ComparePhase, ProgressHandle},
};
use patchscan_config::{Config, ScanConfig};
use patchscan_types::{
    CacheStore, DownloadConfig, Error, InstallConfig, LaaDetector, ManifestEntry,
    ManifestSource, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of one update check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareReport {
    /// Run ID for tracking
    pub run_id: uuid::Uuid,
    /// Entries that must be downloaded, in manifest order
    pub to_update: Vec<ManifestEntry>,
    /// Number of entries in the manifest
    pub manifest_len: usize,
    /// Entries the pre-scan ruled out
    pub prescan_skipped: usize,
    /// Entries that went through the per-file decision
    pub scanned: usize,
    /// Sum of the manifest sizes of `to_update`
    pub total_update_bytes: u64,
    /// Wall-clock time of the whole check
    pub duration: Duration,
}

/// Decides which manifest files need to be downloaded again
#[derive(Debug)]
pub struct UpdateChecker {
    install: InstallConfig,
    download: DownloadConfig,
    scan: ScanConfig,
    progress: ProgressHandle,
}

impl UpdateChecker {
    /// Create a checker from a loaded configuration
    pub fn new(config: &Config) -> Self {
        Self {
            install: config.install.clone(),
            download: config.download.clone(),
            scan: config.scan.clone(),
            progress: ProgressHandle::new(),
        }
    }

    /// Progress handle for an external display; clones share state
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// Run a full check
    ///
    /// Progress is pinned to 1.0 when this returns, whatever the outcome.
    pub async fn check(
        &self,
        manifest: &dyn ManifestSource,
        cache: &dyn CacheStore,
        detector: Arc<dyn LaaDetector>,
        cancel: &CancellationToken,
    ) -> Result<CompareReport> {
        let run_id = uuid::Uuid::new_v4();
        let start = Instant::now();
        self.progress.reset();

        info!(
            "Starting update check {} for '{}'",
            run_id,
            self.install.install_dir.display()
        );

        let result = self
            .run(run_id, start, manifest, cache, detector, cancel)
            .await;

        self.progress.complete();
        match &result {
            Ok(report) => {
                self.progress.set_phase(ComparePhase::Completed);
                info!(
                    "Update check {} finished in {:?}: {} of {} files need an update",
                    run_id,
                    report.duration,
                    report.to_update.len(),
                    report.manifest_len
                );
            }
            Err(e) if e.is_cancelled() => {
                self.progress.set_phase(ComparePhase::Cancelled);
                info!("Update check {} cancelled", run_id);
            }
            Err(e) => {
                self.progress.set_phase(ComparePhase::Failed);
                warn!("Update check {} failed: {}", run_id, e);
            }
        }

        result
    }

    async fn run(
        &self,
        run_id: uuid::Uuid,
        start: Instant,
        manifest: &dyn ManifestSource,
        cache: &dyn CacheStore,
        detector: Arc<dyn LaaDetector>,
        cancel: &CancellationToken,
    ) -> Result<CompareReport> {
        // Phase 1: manifest
        self.progress.set_phase(ComparePhase::FetchingManifest);
        let entries = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            fetched = manifest.fetch(&self.install, &self.download, cancel) => fetched?,
        };
        let manifest_len = entries.len();
        debug!("Manifest lists {} files", manifest_len);

        // Phase 2: cache snapshot
        self.progress.set_phase(ComparePhase::LoadingCache);
        let snapshot = Arc::new(cache.select_all()?);
        debug!("Cache holds {} records", snapshot.len());
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // Phase 3: pre-scan
        self.progress.set_phase(ComparePhase::PreScanning);
        let hints = if self.scan.prescan_enabled {
            let scanner = PreScanner::new(&self.install);
            let snapshot = Arc::clone(&snapshot);
            tokio::task::spawn_blocking(move || scanner.scan(&snapshot))
                .await
                .map_err(|e| Error::other(format!("Pre-scan task failed: {}", e)))?
        } else {
            debug!("Pre-scan disabled");
            PreScanHints::new()
        };
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let candidates = filter_candidates(entries, &snapshot, &hints);
        let scanned = candidates.len();
        let prescan_skipped = manifest_len - scanned;

        // Phase 4: parallel comparison
        self.progress.set_phase(ComparePhase::Comparing);
        let context = Arc::new(DecisionContext::new(
            self.install.clone(),
            snapshot,
            detector,
        ));
        let to_update = ScanCoordinator::from_config(&self.scan)
            .run(candidates, context, &self.progress, cancel)
            .await?;

        let total_update_bytes = to_update.iter().map(|entry| entry.size).sum();

        Ok(CompareReport {
            run_id,
            to_update,
            manifest_len,
            prescan_skipped,
            scanned,
            total_update_bytes,
            duration: start.elapsed(),
        })
    }
}
