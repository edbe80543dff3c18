use attest_core::{Categorized, ErrorKind, KeyType};

/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(KeyType),

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("encryption failed: {0}")]
    EncryptionError(String),

    #[error("decryption failed: {0}")]
    DecryptionError(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Categorized for CryptoError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::SignatureVerificationFailed => ErrorKind::InvalidSignature,
            Self::UnsupportedKeyType(_) => ErrorKind::UnsupportedKeyType,
            Self::EncryptionError(_) => ErrorKind::Internal,
            Self::InvalidKeyLength { .. }
            | Self::InvalidKey(_)
            | Self::DecryptionError(_)
            | Self::InvalidInput(_) => ErrorKind::Invalid,
        }
    }
}
