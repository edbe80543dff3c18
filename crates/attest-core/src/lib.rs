//! Attest Core: the shared data model and error taxonomy for DID resolution,
//! credential registration, and zero-knowledge presentations.

pub mod credential;
pub mod error;
pub mod proof;
pub mod types;

pub use credential::{
    signing_payload_for, ClaimCommitments, Credential, CredentialStatus, Presentation,
    RevocationEntry,
};
pub use error::{Categorized, CoreError, ErrorKind, ErrorReport};
pub use proof::{CircuitId, Proof, PublicInputs, SignatureProof, VerificationKey, ZkProof};
pub use types::{ClaimValue, Claims, Did, DidMethod, KeyType};
