//! Core type system and error handling for patchscan
//!
//! This crate provides the foundational types shared by every patchscan crate:
//!
//! - **Error handling**: a single error taxonomy that keeps cancellation
//!   distinguishable from genuine failures
//! - **Data model**: manifest entries, cache entries, content hashes and
//!   Windows-style file times
//! - **Installation configuration**: where the game lives and which
//!   exemption rules are active
//! - **Collaborator traits**: the manifest source, cache store and
//!   large-address-aware detector consumed by the comparison engine
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `async`: Enable the async manifest source trait and cancellation tokens
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use patchscan_types::{CacheEntry, ContentHash, FileTime, ManifestEntry};
//!
//! let entry = ManifestEntry::new("data/win32/abc.pat", "H1", 1024);
//! let cached = CacheEntry::new("H1", FileTime::from_ticks(42));
//!
//! assert_eq!(entry.hash, cached.hash);
//! assert_eq!(entry.file_name(), "abc");
//! assert_eq!(cached.hash, ContentHash::new("H1"));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{DownloadConfig, InstallConfig, WorkerCount};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use traits::*;
pub use types::*;
