use attest_core::{Categorized, CircuitId, CoreError, ErrorKind};
use attest_trust::TrustError;

/// Zero-knowledge proof errors.
#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("circuit not found: {0}")]
    CircuitNotFound(CircuitId),

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("invalid witness: {0}")]
    WitnessInvalid(String),

    #[error("invalid public inputs: {0}")]
    InvalidPublicInputs(String),

    #[error("proving key error: {0}")]
    Keys(#[from] TrustError),

    #[error("serialization error: {0}")]
    Serialization(#[from] CoreError),

    #[error("proof job queue is full")]
    QueueFull,

    #[error("proof worker pool is shut down")]
    PoolClosed,

    #[error("proof generation timed out")]
    Timeout,

    #[error("proof generation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Categorized for ProofError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::CircuitNotFound(_) => ErrorKind::CircuitNotFound,
            Self::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            Self::WitnessInvalid(_) => ErrorKind::WitnessInvalid,
            Self::InvalidPublicInputs(_) => ErrorKind::Invalid,
            Self::Keys(e) => e.kind(),
            Self::QueueFull => ErrorKind::ProofGenerationFailed,
            Self::Timeout => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Serialization(_) | Self::PoolClosed | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}
