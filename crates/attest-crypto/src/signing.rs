use attest_core::KeyType;
use ed25519_dalek::Signer;
use ed25519_dalek::Verifier;

use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};
use crate::secp256k1;

/// Ed25519 signature (64 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    inner: ed25519_dalek::Signature,
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 64] {
        self.inner.to_bytes()
    }

    /// Create from raw bytes (64 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_arr: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidInput(format!("signature must be 64 bytes, got {}", bytes.len()))
        })?;
        Ok(Self {
            inner: ed25519_dalek::Signature::from_bytes(&bytes_arr),
        })
    }
}

/// Sign a message using Ed25519.
pub fn sign(message: &[u8], keypair: &KeyPair) -> Signature {
    Signature {
        inner: keypair.signing_key().sign(message),
    }
}

/// Verify an Ed25519 signature.
pub fn verify(message: &[u8], signature: &Signature, pubkey: &PublicKey) -> Result<(), CryptoError> {
    pubkey
        .verifying_key()
        .verify(message, &signature.inner)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

/// Verify a raw signature with a raw public key of the given type.
pub fn verify_with_key_type(
    key_type: KeyType,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    match key_type {
        KeyType::Ed25519 => {
            let pubkey = PublicKey::from_bytes(public_key)?;
            let signature =
                Signature::from_bytes(signature).map_err(|_| CryptoError::SignatureVerificationFailed)?;
            verify(message, &signature, &pubkey)
        }
        KeyType::Secp256k1 => secp256k1::verify(message, signature, public_key),
        KeyType::Rsa | KeyType::X25519 => Err(CryptoError::UnsupportedKeyType(key_type)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secp256k1::Secp256k1KeyPair;

    #[test]
    fn test_sign_verify_roundtrip() {
        let kp = KeyPair::generate();
        let sig = sign(b"hello attest", &kp);
        assert!(verify(b"hello attest", &sig, &kp.public_key()).is_ok());
        assert!(verify(b"wrong message", &sig, &kp.public_key()).is_err());
    }

    #[test]
    fn test_verify_wrong_key_fails() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let sig = sign(b"test message", &kp1);
        assert!(verify(b"test message", &sig, &kp2.public_key()).is_err());
    }

    #[test]
    fn test_signature_bytes_roundtrip() {
        let kp = KeyPair::generate();
        let sig = sign(b"test", &kp);
        assert_eq!(Signature::from_bytes(&sig.to_bytes()).unwrap(), sig);
        assert!(Signature::from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_deterministic_signatures() {
        let kp = KeyPair::from_seed(&[99u8; 32]);
        assert_eq!(sign(b"deterministic", &kp), sign(b"deterministic", &kp));
    }

    #[test]
    fn test_verify_with_key_type_ed25519() {
        let kp = KeyPair::generate();
        let sig = sign(b"payload", &kp).to_bytes();
        let pk = kp.public_key();
        assert!(verify_with_key_type(KeyType::Ed25519, pk.as_bytes(), b"payload", &sig).is_ok());
        assert!(verify_with_key_type(KeyType::Ed25519, pk.as_bytes(), b"tampered", &sig).is_err());
        assert!(verify_with_key_type(KeyType::Ed25519, pk.as_bytes(), b"payload", &sig[..10]).is_err());
    }

    #[test]
    fn test_verify_with_key_type_secp256k1() {
        let kp = Secp256k1KeyPair::generate();
        let sig = kp.sign(b"payload");
        let pk = kp.public_key_bytes();
        assert!(verify_with_key_type(KeyType::Secp256k1, &pk, b"payload", &sig).is_ok());
        assert!(verify_with_key_type(KeyType::Ed25519, &pk, b"payload", &sig).is_err());
    }

    #[test]
    fn test_verify_with_key_type_unsupported() {
        let err = verify_with_key_type(KeyType::X25519, &[0u8; 32], b"m", &[0u8; 64]).unwrap_err();
        assert!(matches!(err, CryptoError::UnsupportedKeyType(KeyType::X25519)));
        assert!(verify_with_key_type(KeyType::Rsa, &[0u8; 32], b"m", &[0u8; 64]).is_err());
    }
}
