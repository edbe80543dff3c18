use attest_core::{Categorized, CoreError, Did, ErrorKind};
use attest_proof::ProofError;
use attest_resolver::ResolveError;
use attest_trust::TrustError;

/// Credential registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid issuer: {0}")]
    InvalidIssuer(String),

    #[error("invalid credential signature: {0}")]
    InvalidSignature(String),

    #[error("claim commitments do not match the claims: {0}")]
    CommitmentMismatch(String),

    #[error("credential already recorded: {0}")]
    Duplicate(String),

    #[error("credential not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Resolve(ResolveError),

    #[error(transparent)]
    Keys(#[from] TrustError),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl Categorized for RegistryError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIssuer(_) => ErrorKind::InvalidIssuer,
            Self::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Self::CommitmentMismatch(_) => ErrorKind::Invalid,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Resolve(e) => e.kind(),
            Self::Keys(e) => e.kind(),
            Self::Proof(e) => e.kind(),
            Self::Core(e) => e.kind(),
        }
    }
}

impl RegistryError {
    /// An issuer that cannot be resolved is invalid, unless the failure is
    /// one a retry may clear or the caller gave up.
    pub(crate) fn unresolved_issuer(issuer: &Did, err: ResolveError) -> Self {
        if err.is_transient() || matches!(err, ResolveError::Timeout | ResolveError::Cancelled) {
            Self::Resolve(err)
        } else {
            Self::InvalidIssuer(format!("{} does not resolve: {}", issuer, err))
        }
    }
}
