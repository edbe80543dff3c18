use attest_core::{Categorized, CircuitId, Did, ErrorKind, KeyType};
use attest_crypto::CryptoError;

use crate::key_store::KeyId;

/// Trust and key store errors.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("key not found: {0}")]
    KeyNotFound(KeyId),

    #[error("no signing key bound to {0}")]
    NoKeyForDid(Did),

    #[error("no verification key for circuit {0}")]
    NoCircuitKey(CircuitId),

    #[error("issuer {0} is not a trusted anchor")]
    Untrusted(Did),

    #[error("trust anchor for {did} is outside its validity window")]
    AnchorNotValid { did: Did },

    #[error("key type {0} is not supported for this operation")]
    UnsupportedKeyType(KeyType),

    #[error("invalid trust anchor: {0}")]
    InvalidAnchor(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl Categorized for TrustError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyNotFound(_) | Self::NoKeyForDid(_) | Self::NoCircuitKey(_) => {
                ErrorKind::NotFound
            }
            Self::Untrusted(_) | Self::AnchorNotValid { .. } => ErrorKind::Untrusted,
            Self::UnsupportedKeyType(_) => ErrorKind::UnsupportedKeyType,
            Self::InvalidAnchor(_) => ErrorKind::Invalid,
            Self::Crypto(e) => e.kind(),
        }
    }
}
