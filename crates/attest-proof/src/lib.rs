//! Attest Proof: zero-knowledge proof engine for credential presentations.
//!
//! Provides:
//! - A table of immutable, versioned circuits (claim disclosure, claim
//!   commitment, range and set-membership predicates)
//! - Constraint checking over the Goldilocks field
//! - Proof generation and verification bound to the circuit's proving key
//! - A bounded worker pool with cancellable handles

pub mod circuit;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod pool;
pub mod predicate;
pub mod witness;

pub use circuit::{
    Circuit, CircuitKind, CircuitTable, DEFAULT_RANGE_BITS, MAX_RANGE_BITS, MIN_RANGE_BITS,
};
pub use constraints::{inputs, Constraint, RangeDirection};
pub use engine::{ProofEngine, PROOF_LEN};
pub use error::ProofError;
pub use pool::{PoolStats, ProofHandle, ProofWorkerPool};
pub use predicate::{cutoff_seconds, Predicate};
pub use witness::Witness;
