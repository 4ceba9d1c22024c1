//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Most cache operations are fail-safe: reads return `Option` and errors
/// result in cache misses rather than hard failures. This enum is used for
/// the write paths, where losing an error would silently drop an artifact.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// An attempt was made to store an artifact under a non-idempotent
    /// fingerprint. Such fingerprints are never valid cache keys.
    #[error("cannot store artifact under a non-idempotent fingerprint")]
    UncacheableKey,
}
