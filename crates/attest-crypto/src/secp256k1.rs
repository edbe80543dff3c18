use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::CryptoError;

/// secp256k1 ECDSA key pair. The secret scalar is zeroized on drop by k256.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Load a key from its 32-byte scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid secp256k1 secret: {}", e)))?;
        Ok(Self { signing_key })
    }

    /// Compressed SEC1 public key (33 bytes).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// ECDSA over SHA-256; returns the 64-byte `r || s` encoding.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }
}

/// Verify a 64-byte secp256k1 signature against a SEC1-encoded public key.
pub fn verify(message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), CryptoError> {
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| CryptoError::InvalidKey(format!("invalid secp256k1 public key: {}", e)))?;
    let signature = Signature::from_slice(signature)
        .map_err(|_| CryptoError::SignatureVerificationFailed)?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}
