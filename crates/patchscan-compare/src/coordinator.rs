//! Parallel scan coordination
//!
//! A fixed pool of blocking workers claims manifest entries through one
//! shared atomic cursor. Each index is claimed by exactly one worker, and
//! every claimed index bumps the shared progress counter once, whatever its
//! outcome. Results land in a per-index flag arena so the update set keeps
//! manifest order.
//!
//! The first worker error, or a panic, cancels the rest of the pool.

use crate::decision::DecisionContext;
use crate::progress::{ProgressHandle, ProgressReporter, ScanCounter};
use patchscan_config::ScanConfig;
use patchscan_types::{Error, ManifestEntry, Result, WorkerCount};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// State shared by all workers of one run
#[derive(Debug)]
struct ScanArena {
    items: Vec<ManifestEntry>,
    flags: Vec<AtomicBool>,
    cursor: AtomicUsize,
    counter: Arc<ScanCounter>,
    first_error: Mutex<Option<Error>>,
}

impl ScanArena {
    fn new(items: Vec<ManifestEntry>) -> Self {
        let len = items.len();
        Self {
            flags: (0..len).map(|_| AtomicBool::new(false)).collect(),
            items,
            cursor: AtomicUsize::new(0),
            counter: Arc::new(ScanCounter::new(len)),
            first_error: Mutex::new(None),
        }
    }

    /// Claim the next unprocessed index, if any remain
    fn claim(&self) -> Option<usize> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        (index < self.items.len()).then_some(index)
    }

    fn record_error(&self, error: Error) {
        let mut slot = self
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn take_error(&self) -> Option<Error> {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn flagged(&self) -> Vec<ManifestEntry> {
        self.items
            .iter()
            .zip(&self.flags)
            .filter(|(_, flag)| flag.load(Ordering::Acquire))
            .map(|(entry, _)| entry.clone())
            .collect()
    }
}

/// Counts one processed item when dropped
struct Completion<'a>(&'a ScanCounter);

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.0.increment();
    }
}

/// Runs the per-file decision over a candidate list with a worker pool
#[derive(Debug, Clone)]
pub struct ScanCoordinator {
    workers: WorkerCount,
    progress_interval: Duration,
}

impl ScanCoordinator {
    /// Create a coordinator
    pub fn new(workers: WorkerCount, progress_interval: Duration) -> Self {
        Self {
            workers,
            progress_interval,
        }
    }

    /// Create a coordinator from scan settings
    pub fn from_config(scan: &ScanConfig) -> Self {
        Self::new(scan.worker_count, scan.progress_interval())
    }

    /// Configured number of workers
    pub fn worker_count(&self) -> usize {
        self.workers.get()
    }

    /// Check every item and return those that need an update, in input order
    ///
    /// Returns the first worker error if any worker failed, otherwise
    /// [`Error::Cancelled`] if `cancel` fired before the run finished.
    pub async fn run(
        &self,
        items: Vec<ManifestEntry>,
        context: Arc<DecisionContext>,
        progress: &ProgressHandle,
        cancel: &CancellationToken,
    ) -> Result<Vec<ManifestEntry>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let start = Instant::now();
        let arena = Arc::new(ScanArena::new(items));
        let total = arena.items.len();
        progress.begin_determinate();

        if total == 0 {
            progress.publish(1.0);
            return Ok(Vec::new());
        }

        // Fires on external cancellation or on the first worker failure
        let signal = cancel.child_token();

        let stop_reporter = CancellationToken::new();
        let reporter = ProgressReporter::new(
            progress.clone(),
            Arc::clone(&arena.counter),
            self.progress_interval,
        )
        .spawn(stop_reporter.clone());

        let pool_size = self.workers.get().min(total);
        debug!("Scanning {} entries with {} workers", total, pool_size);

        let handles: Vec<_> = (0..pool_size)
            .map(|worker_id| {
                let arena = Arc::clone(&arena);
                let context = Arc::clone(&context);
                let signal = signal.clone();
                tokio::task::spawn_blocking(move || {
                    scan_worker(worker_id, &arena, &context, &signal);
                })
            })
            .collect();

        let mut panicked = None;
        for handle in handles {
            if let Err(e) = handle.await {
                signal.cancel();
                panicked.get_or_insert(e);
            }
        }

        stop_reporter.cancel();
        if let Err(e) = reporter.await {
            warn!("Progress reporter ended abnormally: {}", e);
        }

        if let Some(error) = arena.take_error() {
            return Err(error);
        }
        if let Some(e) = panicked {
            return Err(Error::other(format!("Scan worker failed: {}", e)));
        }
        if signal.is_cancelled() {
            info!(
                "Scan cancelled after {}/{} entries",
                arena.counter.completed(),
                total
            );
            return Err(Error::Cancelled);
        }

        let to_update = arena.flagged();
        info!(
            "Scanned {} entries in {:?}, {} need an update",
            total,
            start.elapsed(),
            to_update.len()
        );
        Ok(to_update)
    }
}

fn scan_worker(
    worker_id: usize,
    arena: &ScanArena,
    context: &DecisionContext,
    signal: &CancellationToken,
) {
    // Unwinding out of this worker cancels the others
    let guard = signal.clone().drop_guard();

    while !signal.is_cancelled() {
        let Some(index) = arena.claim() else {
            break;
        };
        let _done = Completion(&arena.counter);
        let entry = &arena.items[index];

        match context.decide(entry) {
            Ok(decision) => {
                trace!("[worker {}] {}: {}", worker_id, entry.name, decision);
                if decision.should_update() {
                    arena.flags[index].store(true, Ordering::Release);
                }
            }
            Err(e) => {
                warn!("[worker {}] {} failed: {}", worker_id, entry.name, e);
                arena.record_error(e);
                signal.cancel();
                break;
            }
        }
    }

    guard.disarm();
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchscan_types::{
        CacheEntry, CacheSnapshot, ContentHash, FileTime, InstallConfig, NeverPatched,
    };
    use std::fs;
    use tempfile::TempDir;

    fn coordinator(workers: usize) -> ScanCoordinator {
        ScanCoordinator::new(
            WorkerCount::new(workers).unwrap(),
            Duration::from_millis(5),
        )
    }

    fn uncached_manifest(count: usize) -> Vec<ManifestEntry> {
        (0..count)
            .map(|i| ManifestEntry::new(format!("data/win32/f{:04}.pat", i), "H", 1))
            .collect()
    }

    fn empty_context(temp_dir: &TempDir) -> Arc<DecisionContext> {
        Arc::new(DecisionContext::new(
            InstallConfig::new(temp_dir.path()),
            Arc::new(CacheSnapshot::new()),
            Arc::new(NeverPatched),
        ))
    }

    #[tokio::test]
    async fn test_every_item_is_processed() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = uncached_manifest(257);
        let progress = ProgressHandle::new();

        let to_update = coordinator(8)
            .run(
                manifest.clone(),
                empty_context(&temp_dir),
                &progress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // First and last index included, order preserved, no duplicates
        assert_eq!(to_update, manifest);
        assert_eq!(progress.progress(), 1.0);
    }

    #[tokio::test]
    async fn test_single_item_with_more_workers_than_items() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = uncached_manifest(1);

        let to_update = coordinator(16)
            .run(
                manifest.clone(),
                empty_context(&temp_dir),
                &ProgressHandle::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(to_update, manifest);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let temp_dir = TempDir::new().unwrap();
        let progress = ProgressHandle::new();

        let to_update = coordinator(4)
            .run(
                Vec::new(),
                empty_context(&temp_dir),
                &progress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(to_update.is_empty());
        assert_eq!(progress.progress(), 1.0);
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let temp_dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = coordinator(4)
            .run(
                uncached_manifest(32),
                empty_context(&temp_dir),
                &ProgressHandle::new(),
                &cancel,
            )
            .await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellation_during_scan_stops_workers() {
        let temp_dir = TempDir::new().unwrap();
        let install = InstallConfig::new(temp_dir.path()).with_large_address_aware(true);

        // Every entry reaches the detector: cached, same hash, executable target
        let mut cache = CacheSnapshot::new();
        cache.insert(
            "pso2.exe.pat".to_string(),
            CacheEntry::new("STOCK", FileTime::from_ticks(FileTime::UNIX_EPOCH_TICKS)),
        );
        let manifest: Vec<_> = (0..200)
            .map(|_| ManifestEntry::new("pso2.exe.pat", "STOCK", 1))
            .collect();

        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = {
            let cancel = cancel.clone();
            let calls = Arc::clone(&calls);
            move |_: &InstallConfig, _: &ContentHash| -> Result<bool> {
                if calls.fetch_add(1, Ordering::SeqCst) + 1 == 6 {
                    cancel.cancel();
                }
                std::thread::sleep(Duration::from_millis(2));
                Ok(false)
            }
        };
        let context = Arc::new(DecisionContext::new(
            install,
            Arc::new(cache),
            Arc::new(detector),
        ));

        let progress = ProgressHandle::new();
        let result = coordinator(4)
            .run(manifest, context, &progress, &cancel)
            .await;

        // No partial success, and the pool stopped at its next claim
        assert!(result.unwrap_err().is_cancelled());
        let processed = calls.load(Ordering::SeqCst);
        assert!(processed >= 6);
        assert!(processed < 200);
        assert!(progress.progress() < 1.0);
    }

    #[tokio::test]
    async fn test_worker_error_aborts_run() {
        let temp_dir = TempDir::new().unwrap();
        let install = InstallConfig::new(temp_dir.path()).with_large_address_aware(true);
        fs::write(install.executable_path(), b"MZ").unwrap();

        let mut cache = CacheSnapshot::new();
        cache.insert(
            "pso2.exe.pat".to_string(),
            CacheEntry::new("STOCK", FileTime::for_path(install.executable_path()).unwrap()),
        );
        let detector = |_: &InstallConfig, _: &ContentHash| -> Result<bool> {
            Err(Error::detector("unreadable header"))
        };
        let context = Arc::new(DecisionContext::new(
            install,
            Arc::new(cache),
            Arc::new(detector),
        ));

        let mut manifest = uncached_manifest(64);
        manifest.insert(10, ManifestEntry::new("pso2.exe.pat", "STOCK", 1));

        let cancel = CancellationToken::new();
        let result = coordinator(4)
            .run(manifest, context, &ProgressHandle::new(), &cancel)
            .await;

        assert!(matches!(result, Err(Error::Decision { .. })));
        // The caller's token is never cancelled by an internal failure
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_claims_are_unique_and_bounded() {
        let arena = ScanArena::new(uncached_manifest(3));
        assert_eq!(arena.claim(), Some(0));
        assert_eq!(arena.claim(), Some(1));
        assert_eq!(arena.claim(), Some(2));
        assert_eq!(arena.claim(), None);
        assert_eq!(arena.claim(), None);
    }

    #[test]
    fn test_first_error_wins() {
        let arena = ScanArena::new(Vec::new());
        arena.record_error(Error::other("first"));
        arena.record_error(Error::other("second"));
        assert!(matches!(
            arena.take_error(),
            Some(Error::Other { ref message }) if message == "first"
        ));
    }
}
