//! Result type alias for patchscan operations

use crate::Error;

/// Result type alias for patchscan operations
pub type Result<T> = std::result::Result<T, Error>;
