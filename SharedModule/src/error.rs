//! # Error Types
//!
//! The error taxonomy of the session and spatial sync layer, and the narrower
//! error set that external collaborators (lobby service, relay, identity
//! provider) report across the network boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by session and spatial operations
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SyncError {
    /// Anonymous sign-in failed (network or identity provider error)
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// A session is already joined, being joined or being left
    #[error("already in a session")]
    AlreadyInSession,

    /// Operation requires a joined session
    #[error("not in a session")]
    NotInSession,

    /// The session no longer exists on the provider
    #[error("session not found")]
    SessionNotFound,

    /// The session has no free slot
    #[error("session is full")]
    SessionFull,

    /// A peer attempted an operation reserved for the authority or the owner
    #[error("permission denied: {operation}")]
    PermissionDenied {
        operation: String,
    },

    /// The object type id is not in the prefab catalog
    #[error("unknown object type id '{0}'")]
    UnknownTypeId(String),

    /// Network or service-level failure, retryable by re-invocation
    #[error("transient provider failure: {0}")]
    ProviderTransient(String),

    /// Misconfiguration, not retryable
    #[error("fatal provider failure: {0}")]
    ProviderFatal(String),

    /// Malformed local input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A message payload could not be encoded or decoded
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl SyncError {
    pub fn permission_denied(operation: &str) -> Self {
        SyncError::PermissionDenied {
            operation: operation.to_string(),
        }
    }

    /// Whether re-invoking the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::ProviderTransient(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

/// Errors reported by an external provider (lobby, relay, identity)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The addressed resource does not exist
    #[error("not found")]
    NotFound,

    /// The addressed session has no free slot
    #[error("full")]
    Full,

    /// Transient network or service failure
    #[error("transient: {0}")]
    Transient(String),

    /// Misconfiguration or rejected credentials
    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<ProviderError> for SyncError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound => SyncError::SessionNotFound,
            ProviderError::Full => SyncError::SessionFull,
            ProviderError::Transient(msg) => SyncError::ProviderTransient(msg),
            ProviderError::Fatal(msg) => SyncError::ProviderFatal(msg),
        }
    }
}

/// Result of a provider call
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type used throughout the crate family
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_classified_apart_from_other_failures() {
        assert_eq!(SyncError::from(ProviderError::NotFound), SyncError::SessionNotFound);
        assert_eq!(SyncError::from(ProviderError::Full), SyncError::SessionFull);
        assert!(SyncError::from(ProviderError::Transient("timeout".into())).is_retryable());
        assert!(!SyncError::from(ProviderError::Fatal("bad key".into())).is_retryable());
    }
}
