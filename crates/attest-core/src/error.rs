use serde::{Deserialize, Serialize};
use std::fmt;

/// Error kinds surfaced to callers of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    // Resolution
    NotFound,
    MethodUnsupported,
    BackendTimeout,
    BackendUnavailable,
    InvalidDocument,
    // Credential lifecycle
    InvalidIssuer,
    InvalidSignature,
    AlreadyRevoked,
    Expired,
    Duplicate,
    // Proofs
    CircuitNotFound,
    ConstraintViolation,
    WitnessInvalid,
    ProofVerificationFailed,
    ProofGenerationFailed,
    // Presentations
    ChallengeMismatch,
    AudienceMismatch,
    CredentialNotValid,
    ProofRejected,
    AttributeNotFound,
    // Keys and trust
    Untrusted,
    UnsupportedKeyType,
    // Caller-driven
    Timeout,
    Cancelled,
    Invalid,
    Internal,
}

impl ErrorKind {
    /// Whether a retry may succeed without any change on the caller's side.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BackendTimeout | Self::BackendUnavailable)
    }

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::MethodUnsupported => "MethodUnsupported",
            Self::BackendTimeout => "BackendTimeout",
            Self::BackendUnavailable => "BackendUnavailable",
            Self::InvalidDocument => "InvalidDocument",
            Self::InvalidIssuer => "InvalidIssuer",
            Self::InvalidSignature => "InvalidSignature",
            Self::AlreadyRevoked => "AlreadyRevoked",
            Self::Expired => "Expired",
            Self::Duplicate => "Duplicate",
            Self::CircuitNotFound => "CircuitNotFound",
            Self::ConstraintViolation => "ConstraintViolation",
            Self::WitnessInvalid => "WitnessInvalid",
            Self::ProofVerificationFailed => "ProofVerificationFailed",
            Self::ProofGenerationFailed => "ProofGenerationFailed",
            Self::ChallengeMismatch => "ChallengeMismatch",
            Self::AudienceMismatch => "AudienceMismatch",
            Self::CredentialNotValid => "CredentialNotValid",
            Self::ProofRejected => "ProofRejected",
            Self::AttributeNotFound => "AttributeNotFound",
            Self::Untrusted => "Untrusted",
            Self::UnsupportedKeyType => "UnsupportedKeyType",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::Invalid => "Invalid",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured `{kind, message}` error handed across the external interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorReport {}

/// Implemented by every crate error so it can be mapped onto [`ErrorKind`].
pub trait Categorized: fmt::Display {
    fn kind(&self) -> ErrorKind;

    fn report(&self) -> ErrorReport {
        ErrorReport::new(self.kind(), self.to_string())
    }
}

/// Errors raised by the core data model.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Categorized for CoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDid(_) | Self::Validation(_) => ErrorKind::Invalid,
            Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}
