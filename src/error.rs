//! Error types.
//!
//! Each storage tier has its own error enum. Only [`InputError`] and
//! [`CacheError`] are fatal to a coordinator operation; [`RemoteError`]
//! values are reported next to a successful local result.

use std::io;
use thiserror::Error;

/// Problems with an ingested row set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("no rows found in the uploaded data")]
    EmptyInput,

    #[error("required fields not found: {}", .0.join(", "))]
    MissingRequiredField(Vec<String>),
}

/// Failures of the local cache. These are never absorbed.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("dataset not found in local cache: {0}")]
    NotFound(String),

    #[error("local cache I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("local cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures reported by the remote repository.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote rejected the credential ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("remote path not found: {path}")]
    NotFound { path: String },

    #[error("remote revision conflict on {path}: {message}")]
    Conflict { path: String, message: String },

    #[error("remote unreachable: {0}")]
    Unreachable(String),

    #[error("remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("remote content could not be decoded: {0}")]
    Decode(String),

    #[error("upload payload could not be encoded locally: {0}")]
    Encode(String),
}

impl RemoteError {
    /// True for the "does not exist" signal, which callers treat as empty state.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

/// Errors that abort a coordinator operation.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_message() {
        let err = InputError::MissingRequiredField(vec![
            "SUB CLUSTER".to_string(),
            "PERFORMED USER ROLE".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "required fields not found: SUB CLUSTER, PERFORMED USER ROLE"
        );
    }

    #[test]
    fn test_not_found_detection() {
        let missing = RemoteError::NotFound {
            path: "uploads/a.json".to_string(),
        };
        let conflict = RemoteError::Conflict {
            path: "uploads/a.json".to_string(),
            message: "sha mismatch".to_string(),
        };
        assert!(missing.is_not_found());
        assert!(!conflict.is_not_found());
    }

    #[test]
    fn test_encode_failure_is_local() {
        let err = RemoteError::Encode("key must be a string".to_string());
        assert_eq!(
            err.to_string(),
            "upload payload could not be encoded locally: key must be a string"
        );
        assert!(!err.is_not_found());
    }
}
