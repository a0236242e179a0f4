//! JSON output structures for the patchscan CLI

use patchscan_compare::CompareReport;
use patchscan_types::ManifestEntry;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete JSON output for a check
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResultJson {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// Files that need an update, in manifest order
    pub to_update: Vec<ManifestEntry>,
    /// Run statistics
    pub stats: CheckStatsJson,
    /// Overall result
    pub result: OperationResult,
}

/// Operation metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// patchscan version
    pub version: String,
    /// Run ID
    pub run_id: Option<String>,
    /// Timestamp when the output was produced
    pub timestamp: String,
    /// Installation root
    pub install_dir: String,
    /// Manifest location
    pub manifest: String,
}

/// Run statistics
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CheckStatsJson {
    /// Entries in the manifest
    pub manifest_entries: usize,
    /// Entries ruled out by the pre-scan
    pub prescan_skipped: usize,
    /// Entries that went through the per-file decision
    pub compared: usize,
    /// Entries that need an update
    pub update_count: usize,
    /// Bytes to download
    pub total_update_bytes: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Overall result
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the check completed
    pub success: bool,
    /// Whether the check was cancelled
    pub cancelled: bool,
    /// Error message if the check failed
    pub error: Option<String>,
}

impl OperationMetadata {
    /// Metadata stamped with the current time
    pub fn now(install_dir: &Path, manifest: &str) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            run_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            install_dir: install_dir.display().to_string(),
            manifest: manifest.to_string(),
        }
    }
}

impl CheckResultJson {
    /// Output for a completed check
    pub fn from_report(mut metadata: OperationMetadata, report: &CompareReport) -> Self {
        metadata.run_id = Some(report.run_id.to_string());
        Self {
            metadata,
            to_update: report.to_update.clone(),
            stats: CheckStatsJson {
                manifest_entries: report.manifest_len,
                prescan_skipped: report.prescan_skipped,
                compared: report.scanned,
                update_count: report.to_update.len(),
                total_update_bytes: report.total_update_bytes,
                duration_ms: u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
            },
            result: OperationResult {
                success: true,
                cancelled: false,
                error: None,
            },
        }
    }

    /// Output for a check that did not complete
    pub fn from_error(metadata: OperationMetadata, error: &patchscan_types::Error) -> Self {
        Self {
            metadata,
            to_update: Vec::new(),
            stats: CheckStatsJson::default(),
            result: OperationResult {
                success: false,
                cancelled: error.is_cancelled(),
                error: Some(error.to_string()),
            },
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
