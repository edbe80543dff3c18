use attest_core::{Categorized, CoreError, ErrorKind};
use attest_proof::ProofError;

use crate::state::VerificationState;

/// Presentation building errors.
#[derive(Debug, thiserror::Error)]
pub enum DisclosureError {
    #[error("credential has no claim named {0}")]
    AttributeNotFound(String),

    #[error("no circuit proves {0}")]
    NoCircuit(String),

    #[error("proof generation failed: {0}")]
    Proof(#[from] ProofError),

    #[error("credential commitments are unusable: {0}")]
    InvalidCommitments(String),

    #[error("invalid verification transition from {from} to {to}")]
    InvalidTransition {
        from: VerificationState,
        to: VerificationState,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl Categorized for DisclosureError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::AttributeNotFound(_) => ErrorKind::AttributeNotFound,
            Self::NoCircuit(_) => ErrorKind::ProofGenerationFailed,
            // An unsatisfied predicate is reported as such; anything else
            // that stops the prover is a generation failure.
            Self::Proof(ProofError::ConstraintViolation(_)) => ErrorKind::ConstraintViolation,
            Self::Proof(ProofError::Timeout) => ErrorKind::Timeout,
            Self::Proof(ProofError::Cancelled) => ErrorKind::Cancelled,
            Self::Proof(_) => ErrorKind::ProofGenerationFailed,
            Self::InvalidCommitments(_) => ErrorKind::Invalid,
            Self::InvalidTransition { .. } => ErrorKind::Internal,
            Self::Core(e) => e.kind(),
        }
    }
}
