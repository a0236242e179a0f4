//! Error types and handling for patchscan
//!
//! Cancellation is modelled as its own variant rather than a failure so that
//! callers can tell "the user stopped the run" apart from "the run broke".
//! Per-file decision failures carry the manifest name they were raised for.

use std::path::PathBuf;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - normal termination path
    Low,
    /// Medium severity - the run failed but may succeed if repeated
    Medium,
    /// High severity - the run cannot succeed without intervention
    High,
}

/// Main error type for patchscan operations
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// File not found
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found
        path: PathBuf,
    },

    /// Permission denied
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Path to the file with permission issues
        path: PathBuf,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// The manifest source failed to produce a manifest
    #[error("Manifest error: {message}")]
    Manifest {
        /// Error message describing the manifest failure
        message: String,
    },

    /// The cache store failed to produce a snapshot
    #[error("Cache store error: {message}")]
    Cache {
        /// Error message describing the cache failure
        message: String,
    },

    /// The large-address-aware detector failed
    #[error("LAA detector error: {message}")]
    Detector {
        /// Error message describing the detector failure
        message: String,
    },

    /// Deciding whether a single file needs an update failed
    #[error("Failed to check '{name}': {message}")]
    Decision {
        /// Manifest name of the file being checked
        name: String,
        /// Error message describing the failure
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// Configuration errors
    Config,
    /// Manifest source errors
    Manifest,
    /// Cache store errors
    Cache,
    /// LAA detector errors
    Detector,
    /// Per-file decision errors
    Decision,
    /// Cancellation
    Cancelled,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::FileNotFound { .. } | Self::PermissionDenied { .. } => {
                ErrorKind::Io
            }
            Self::Config { .. } => ErrorKind::Config,
            Self::Manifest { .. } => ErrorKind::Manifest,
            Self::Cache { .. } => ErrorKind::Cache,
            Self::Detector { .. } => ErrorKind::Detector,
            Self::Decision { .. } => ErrorKind::Decision,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Cancelled => ErrorSeverity::Low,
            Self::Io { .. }
            | Self::Manifest { .. }
            | Self::Cache { .. }
            | Self::Detector { .. }
            | Self::Decision { .. }
            | Self::Other { .. } => ErrorSeverity::Medium,
            Self::FileNotFound { .. } | Self::PermissionDenied { .. } | Self::Config { .. } => {
                ErrorSeverity::High
            }
        }
    }

    /// Check whether this is the cancellation outcome rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Create an I/O error that names the path it happened on
    pub fn io_at(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io {
                message: format!("'{}': {}", path.display(), error),
            },
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new manifest error
    pub fn manifest<S: Into<String>>(message: S) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    /// Create a new cache store error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new detector error
    pub fn detector<S: Into<String>>(message: S) -> Self {
        Self::Detector {
            message: message.into(),
        }
    }

    /// Create a new per-file decision error
    pub fn decision<N: Into<String>, S: Into<String>>(name: N, message: S) -> Self {
        Self::Decision {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
