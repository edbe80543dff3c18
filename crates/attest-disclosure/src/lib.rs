//! Attest Selective Disclosure: builds presentations that reveal a subset of
//! a credential's claims plus predicate proofs, and verifies them in stages.

pub mod error;
pub mod manager;
pub mod request;
pub mod state;

pub use error::DisclosureError;
pub use manager::{SelectiveDisclosureManager, DEFAULT_PROOF_TIMEOUT};
pub use request::DisclosureRequest;
pub use state::{
    RejectionReason, VerificationEvent, VerificationOutcome, VerificationReport,
    VerificationState, VerificationStateMachine,
};
