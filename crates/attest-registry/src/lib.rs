//! Attest Registry: records credentials after checking their issuer, claim
//! commitments and proof, and keeps an append-only revocation log.

pub mod error;
pub mod issuer;
pub mod registry;
pub mod revocation;

#[cfg(test)]
mod testing;

pub use error::RegistryError;
pub use issuer::CredentialIssuer;
pub use registry::{CredentialRegistry, RegistryOptions};
pub use revocation::{RevocationLog, RevokeOutcome};
