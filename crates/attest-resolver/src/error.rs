use std::sync::Arc;

use attest_core::{Categorized, CoreError, ErrorKind};
use attest_trust::TrustError;

/// DID resolution and registration errors.
///
/// Cloneable so a single in-flight resolution can hand its outcome to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("DID not found: {0}")]
    NotFound(String),

    #[error("DID method not supported: {0}")]
    MethodUnsupported(String),

    #[error("backend timed out: {0}")]
    BackendTimeout(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("invalid DID document: {0}")]
    InvalidDocument(String),

    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("{method} does not support {key_type} keys")]
    UnsupportedKeyType { method: String, key_type: String },

    #[error("publish rejected: {0}")]
    PublishRejected(String),

    #[error("resolution timed out")]
    Timeout,

    #[error("resolution cancelled")]
    Cancelled,

    #[error(transparent)]
    Keys(Arc<TrustError>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResolveError {
    /// Failures a retry may clear.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BackendTimeout(_) | Self::BackendUnavailable(_))
    }
}

impl From<TrustError> for ResolveError {
    fn from(err: TrustError) -> Self {
        Self::Keys(Arc::new(err))
    }
}

impl From<CoreError> for ResolveError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidDid(msg) => Self::InvalidDid(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl Categorized for ResolveError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MethodUnsupported(_) => ErrorKind::MethodUnsupported,
            Self::BackendTimeout(_) => ErrorKind::BackendTimeout,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::InvalidDocument(_) => ErrorKind::InvalidDocument,
            Self::InvalidDid(_) => ErrorKind::Invalid,
            Self::UnsupportedKeyType { .. } => ErrorKind::UnsupportedKeyType,
            Self::PublishRejected(_) => ErrorKind::BackendUnavailable,
            Self::Timeout => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Keys(e) => e.kind(),
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}
