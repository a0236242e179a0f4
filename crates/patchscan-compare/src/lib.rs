//! Manifest-versus-disk comparison engine for patchscan
//!
//! Given the authoritative manifest and the metadata cache from the previous
//! run, this crate decides which local files are stale and must be
//! downloaded again. It never hashes file contents: cheap metadata is checked
//! first and the cached hash stands in for the file's content.
//!
//! - **Pre-scan**: one directory enumeration rules out files whose
//!   last-write time still matches the cache
//! - **Per-file decision**: mod overrides, the patched executable, unknown
//!   files, upstream hash changes and local modifications
//! - **Parallel scan**: a fixed worker pool claims items through a shared
//!   atomic cursor; the first worker error cancels the whole pool
//! - **Progress**: a shared handle an external display can poll
//!
//! # Examples
//!
//! ```rust,no_run
//! use patchscan_compare::UpdateChecker;
//! use patchscan_config::Config;
//! use patchscan_types::{CacheSnapshot, ManifestEntry, NeverPatched};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> patchscan_types::Result<()> {
//! let checker = UpdateChecker::new(&Config::default());
//! let manifest = vec![ManifestEntry::new("data/win32/abc.pat", "H1", 10)];
//! let cache = CacheSnapshot::new();
//!
//! let report = checker
//!     .check(&manifest, &cache, Arc::new(NeverPatched), &CancellationToken::new())
//!     .await?;
//! println!("{} files need an update", report.to_update.len());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod checker;
pub mod coordinator;
pub mod decision;
pub mod prescan;
pub mod progress;

pub use checker::{CompareReport, UpdateChecker};
pub use coordinator::ScanCoordinator;
pub use decision::{Decision, DecisionContext, SkipReason, UpdateReason};
pub use prescan::{filter_candidates, PreScanHint, PreScanHints, PreScanner};
pub use progress::{ComparePhase, ProgressHandle, ProgressReporter, ProgressSnapshot, ScanCounter};
