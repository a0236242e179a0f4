//! Integration tests for patchscan
//!
//! These run the full check against throwaway installations on disk.

use patchscan_compare::{ComparePhase, UpdateChecker};
use patchscan_tests::{data_manifest, set_mtime, Installation, BASE_TIME};
use patchscan_types::{
    CacheSnapshot, ContentHash, Error, InstallConfig, ManifestEntry, NeverPatched, Result,
};
use rstest::rstest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn run_check(
    installation: &Installation,
    manifest: &[ManifestEntry],
    cache: &CacheSnapshot,
    workers: usize,
    prescan_enabled: bool,
) -> Result<Vec<ManifestEntry>> {
    let checker = UpdateChecker::new(&installation.config(workers, prescan_enabled));
    let report = checker
        .check(
            &manifest.to_vec(),
            cache,
            Arc::new(NeverPatched),
            &CancellationToken::new(),
        )
        .await?;
    Ok(report.to_update)
}

#[rstest]
#[case(1, true)]
#[case(4, true)]
#[case(4, false)]
#[tokio::test]
async fn test_modified_file_is_the_only_update(#[case] workers: usize, #[case] prescan: bool) {
    let installation = Installation::new().unwrap();
    let manifest = data_manifest(2);
    for entry in &manifest {
        installation.write(entry, BASE_TIME).unwrap();
    }
    let cache = installation.record_cache(&manifest).unwrap();

    // b is touched one second after it was cached
    let b_path = manifest[1].local_path(&installation.install().install_dir);
    set_mtime(&b_path, BASE_TIME + 1).unwrap();

    let to_update = run_check(&installation, &manifest, &cache, workers, prescan)
        .await
        .unwrap();
    assert_eq!(to_update, vec![manifest[1].clone()]);
}

#[tokio::test]
async fn test_uncached_entries_are_always_included() {
    let installation = Installation::new().unwrap();
    let manifest = data_manifest(3);
    for entry in &manifest {
        installation.write(entry, BASE_TIME).unwrap();
    }
    let mut cache = installation.record_cache(&manifest).unwrap();
    cache.remove(&manifest[0].name);

    let to_update = run_check(&installation, &manifest, &cache, 2, true)
        .await
        .unwrap();
    assert_eq!(to_update, vec![manifest[0].clone()]);
}

#[tokio::test]
async fn test_upstream_hash_change_beats_matching_timestamp() {
    let installation = Installation::new().unwrap();
    let mut manifest = data_manifest(3);
    for entry in &manifest {
        installation.write(entry, BASE_TIME).unwrap();
    }
    let cache = installation.record_cache(&manifest).unwrap();

    manifest[2].hash = ContentHash::new("H2-next");

    let to_update = run_check(&installation, &manifest, &cache, 2, true)
        .await
        .unwrap();
    assert_eq!(to_update, vec![manifest[2].clone()]);
}

#[tokio::test]
async fn test_second_run_after_patching_is_empty() {
    let installation = Installation::new().unwrap();
    let manifest = data_manifest(50);

    // Nothing installed yet
    let first = run_check(&installation, &manifest, &CacheSnapshot::new(), 4, true)
        .await
        .unwrap();
    assert_eq!(first, manifest);

    // Download everything and record the cache
    for entry in &first {
        installation.write(entry, BASE_TIME).unwrap();
    }
    let cache = installation.record_cache(&manifest).unwrap();

    for _ in 0..2 {
        let again = run_check(&installation, &manifest, &cache, 4, true)
            .await
            .unwrap();
        assert!(again.is_empty());
    }
}

#[tokio::test]
async fn test_deleted_file_is_redownloaded() {
    let installation = Installation::new().unwrap();
    let manifest = data_manifest(2);
    for entry in &manifest {
        installation.write(entry, BASE_TIME).unwrap();
    }
    let cache = installation.record_cache(&manifest).unwrap();
    std::fs::remove_file(manifest[0].local_path(&installation.install().install_dir)).unwrap();

    let to_update = run_check(&installation, &manifest, &cache, 2, true)
        .await
        .unwrap();
    assert_eq!(to_update, vec![manifest[0].clone()]);
}

#[tokio::test]
async fn test_mod_override_only_applies_when_enabled() {
    let mut installation = Installation::new().unwrap();
    let manifest = data_manifest(2);
    for entry in &manifest {
        installation.write(entry, BASE_TIME).unwrap();
    }
    let cache = installation.record_cache(&manifest).unwrap();

    // The modded data file was rewritten locally
    let modded = &manifest[0];
    set_mtime(
        &modded.local_path(&installation.install().install_dir),
        BASE_TIME + 600,
    )
    .unwrap();
    installation.write_mod(modded.file_name()).unwrap();

    let to_update = run_check(&installation, &manifest, &cache, 2, true)
        .await
        .unwrap();
    assert_eq!(to_update, vec![modded.clone()]);

    installation.install_mut().mod_files_enabled = true;
    let to_update = run_check(&installation, &manifest, &cache, 2, true)
        .await
        .unwrap();
    assert!(to_update.is_empty());
}

#[tokio::test]
async fn test_patched_executable_is_kept() {
    let mut installation = Installation::new().unwrap();
    installation.install_mut().large_address_aware = true;

    let exe = ManifestEntry::new("pso2.exe.pat", "STOCK", 1024);
    let manifest = vec![exe.clone()];
    installation.write(&exe, BASE_TIME).unwrap();
    let cache = installation.record_cache(&manifest).unwrap();

    // The local patch rewrites the executable
    set_mtime(&exe.local_path(&installation.install().install_dir), BASE_TIME + 60).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let detector = {
        let calls = Arc::clone(&calls);
        move |install: &InstallConfig, hash: &ContentHash| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<bool, Error>(install.executable_path().exists() && hash.as_str() == "STOCK")
        }
    };

    let checker = UpdateChecker::new(&installation.config(2, true));
    let report = checker
        .check(&manifest, &cache, Arc::new(detector), &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.to_update.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_detector_failure_aborts_the_whole_check() {
    let mut installation = Installation::new().unwrap();
    installation.install_mut().large_address_aware = true;

    let exe = ManifestEntry::new("pso2.exe.pat", "STOCK", 1024);
    let mut manifest = data_manifest(200);
    manifest.insert(0, exe.clone());
    installation.write(&exe, BASE_TIME).unwrap();
    let cache = installation.record_cache(&manifest).unwrap();

    let detector =
        |_: &InstallConfig, _: &ContentHash| -> Result<bool> { Err(Error::detector("bad header")) };

    let checker = UpdateChecker::new(&installation.config(4, true));
    let error = checker
        .check(&manifest, &cache, Arc::new(detector), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Decision { .. }));
    assert_eq!(checker.progress().phase(), ComparePhase::Failed);
    assert_eq!(checker.progress().progress(), 1.0);
}

#[tokio::test]
async fn test_cancellation_is_reported_as_cancelled() {
    let installation = Installation::new().unwrap();
    let manifest = data_manifest(100);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let checker = UpdateChecker::new(&installation.config(4, true));
    let error = checker
        .check(&manifest, &CacheSnapshot::new(), Arc::new(NeverPatched), &cancel)
        .await
        .unwrap_err();

    assert!(error.is_cancelled());
    assert_eq!(checker.progress().phase(), ComparePhase::Cancelled);
}

#[tokio::test]
async fn test_cancellation_mid_scan_is_not_a_partial_success() {
    let mut installation = Installation::new().unwrap();
    installation.install_mut().large_address_aware = true;

    let exe = ManifestEntry::new("pso2.exe.pat", "STOCK", 1024);
    installation.write(&exe, BASE_TIME).unwrap();
    let cache = installation.record_cache(&[exe.clone()]).unwrap();
    let manifest = vec![exe; 300];

    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let detector = {
        let cancel = cancel.clone();
        let calls = Arc::clone(&calls);
        move |_: &InstallConfig, _: &ContentHash| -> Result<bool> {
            if calls.fetch_add(1, Ordering::SeqCst) + 1 == 10 {
                cancel.cancel();
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
            Ok(false)
        }
    };

    let checker = UpdateChecker::new(&installation.config(4, true));
    let error = checker
        .check(&manifest, &cache, Arc::new(detector), &cancel)
        .await
        .unwrap_err();

    assert!(error.is_cancelled());
    assert!(calls.load(Ordering::SeqCst) < 300);
    assert_eq!(checker.progress().phase(), ComparePhase::Cancelled);
}

#[tokio::test]
async fn test_progress_ends_at_one_and_never_decreases() {
    let installation = Installation::new().unwrap();
    let manifest = data_manifest(500);
    let checker = UpdateChecker::new(&installation.config(4, true));
    let progress = checker.progress();

    let observer = {
        let progress = progress.clone();
        tokio::spawn(async move {
            let mut last = 0.0f64;
            let mut samples = Vec::new();
            while !progress.phase().is_terminal() {
                let snapshot = progress.snapshot();
                if !snapshot.is_indeterminate {
                    samples.push(snapshot.progress);
                }
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
            for sample in samples {
                assert!(sample >= last);
                last = sample;
            }
        })
    };

    let report = checker
        .check(
            &manifest,
            &CacheSnapshot::new(),
            Arc::new(NeverPatched),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    observer.await.unwrap();
    assert_eq!(report.to_update.len(), 500);
    assert_eq!(progress.progress(), 1.0);
    assert_eq!(progress.phase(), ComparePhase::Completed);
}
