//! Error types shared by every relaycache crate.

use thiserror::Error;

/// Errors produced by the cache, its snapshot codec and storage media.
///
/// None of these are fatal to the cache itself: the manager recovers from
/// load and flush failures and reports them to its observer. They surface
/// as values only from explicit calls such as `flush_now` or
/// `RecordStore::from_serializable`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The persistent medium rejected an operation
    #[error("storage medium error for key '{key}': {reason}")]
    Storage {
        /// Key the operation targeted
        key: String,
        /// Backend-provided reason
        reason: String,
    },

    /// Filesystem error from a file-backed medium
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Decoded JSON does not have the snapshot shape
    #[error("malformed snapshot: {reason}")]
    MalformedSnapshot {
        /// What was wrong with the input
        reason: String,
    },

    /// Options could not be parsed
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the input
        reason: String,
    },
}

impl CacheError {
    /// Build a `Storage` error for `key`
    pub fn storage(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CacheError::Storage {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Build a `MalformedSnapshot` error
    pub fn malformed(reason: impl Into<String>) -> Self {
        CacheError::MalformedSnapshot {
            reason: reason.into(),
        }
    }

    /// Build an `InvalidConfig` error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        CacheError::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// True for failures caused by the snapshot contents rather than the medium
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            CacheError::Serialization(_) | CacheError::MalformedSnapshot { .. }
        )
    }
}

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = CacheError::storage("__cache__", "disk full");
        assert_eq!(
            err.to_string(),
            "storage medium error for key '__cache__': disk full"
        );
        assert!(!err.is_decode_error());
    }

    #[test]
    fn test_decode_errors_classified() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(CacheError::from(json_err).is_decode_error());
        assert!(CacheError::malformed("records is not an object").is_decode_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CacheError = io.into();
        assert!(matches!(err, CacheError::Io(_)));
    }
}
