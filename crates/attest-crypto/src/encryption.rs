use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::error::CryptoError;
use crate::keys::KeyPair;

const KEY_AGREEMENT_CONTEXT: &str = "attest x25519 key agreement v1";
const ENCRYPTION_CONTEXT: &str = "attest payload encryption v1";

/// Encrypted payload: ephemeral public key, nonce, and ciphertext.
#[derive(Debug, Clone)]
pub struct EncryptedPayload {
    pub ephemeral_pubkey: [u8; 32],
    pub nonce: [u8; 12],
    /// Ciphertext plus 16-byte Poly1305 tag.
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// ephemeral_pubkey (32) || nonce (12) || ciphertext.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 12 + self.ciphertext.len());
        out.extend_from_slice(&self.ephemeral_pubkey);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Load a secret from its 32 raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < 44 {
            return Err(CryptoError::DecryptionError("payload too short".into()));
        }
        let mut ephemeral_pubkey = [0u8; 32];
        ephemeral_pubkey.copy_from_slice(&bytes[..32]);
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&bytes[32..44]);
        Ok(Self {
            ephemeral_pubkey,
            nonce,
            ciphertext: bytes[44..].to_vec(),
        })
    }
}

/// Static X25519 key-agreement key.
pub struct X25519KeyPair {
    secret: StaticSecret,
}

impl X25519KeyPair {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    /// Key-agreement key derived from an Ed25519 signing key's seed.
    pub fn derive_from(keypair: &KeyPair) -> Self {
        let derived = blake3::derive_key(KEY_AGREEMENT_CONTEXT, &keypair.secret_bytes());
        Self {
            secret: StaticSecret::from(derived),
        }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        X25519PublicKey::from(&self.secret).to_bytes()
    }
}

/// Encrypt plaintext for a recipient's X25519 public key (ECDH + ChaCha20-Poly1305).
pub fn encrypt(plaintext: &[u8], recipient_pubkey: &[u8; 32]) -> Result<EncryptedPayload, CryptoError> {
    let ephemeral = X25519KeyPair::generate();
    let shared_secret = ephemeral
        .secret
        .diffie_hellman(&X25519PublicKey::from(*recipient_pubkey));
    let symmetric_key = blake3::derive_key(ENCRYPTION_CONTEXT, shared_secret.as_bytes());

    let mut nonce_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = ChaCha20Poly1305::new_from_slice(&symmetric_key)
        .map_err(|e| CryptoError::EncryptionError(format!("cipher init failed: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::EncryptionError(format!("encryption failed: {}", e)))?;

    Ok(EncryptedPayload {
        ephemeral_pubkey: ephemeral.public_key_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypt a payload with the recipient's key-agreement key.
pub fn decrypt(payload: &EncryptedPayload, recipient: &X25519KeyPair) -> Result<Vec<u8>, CryptoError> {
    let shared_secret = recipient
        .secret
        .diffie_hellman(&X25519PublicKey::from(payload.ephemeral_pubkey));
    let symmetric_key = blake3::derive_key(ENCRYPTION_CONTEXT, shared_secret.as_bytes());

    let cipher = ChaCha20Poly1305::new_from_slice(&symmetric_key)
        .map_err(|e| CryptoError::DecryptionError(format!("cipher init failed: {}", e)))?;
    cipher
        .decrypt(Nonce::from_slice(&payload.nonce), payload.ciphertext.as_slice())
        .map_err(|e| CryptoError::DecryptionError(format!("decryption failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let recipient = X25519KeyPair::generate();
        let encrypted = encrypt(b"holder wallet backup", &recipient.public_key_bytes()).unwrap();
        assert_eq!(decrypt(&encrypted, &recipient).unwrap(), b"holder wallet backup");
    }

    #[test]
    fn test_encrypt_empty_message() {
        let recipient = X25519KeyPair::generate();
        let encrypted = encrypt(b"", &recipient.public_key_bytes()).unwrap();
        assert_eq!(decrypt(&encrypted, &recipient).unwrap(), b"");
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let recipient = X25519KeyPair::generate();
        let other = X25519KeyPair::generate();
        let encrypted = encrypt(b"secret data", &recipient.public_key_bytes()).unwrap();
        assert!(decrypt(&encrypted, &other).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let recipient = X25519KeyPair::generate();
        let mut encrypted = encrypt(b"secret data", &recipient.public_key_bytes()).unwrap();
        if let Some(byte) = encrypted.ciphertext.first_mut() {
            *byte ^= 0xFF;
        }
        assert!(decrypt(&encrypted, &recipient).is_err());
    }

    #[test]
    fn test_payload_bytes_roundtrip() {
        let recipient = X25519KeyPair::generate();
        let encrypted = encrypt(b"serialized", &recipient.public_key_bytes()).unwrap();
        let decoded = EncryptedPayload::from_bytes(&encrypted.to_bytes()).unwrap();
        assert_eq!(decrypt(&decoded, &recipient).unwrap(), b"serialized");
        assert!(EncryptedPayload::from_bytes(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_derived_key_agreement_is_deterministic() {
        let signing = KeyPair::from_seed(&[42u8; 32]);
        let a = X25519KeyPair::derive_from(&signing);
        let b = X25519KeyPair::derive_from(&signing);
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());

        let encrypted = encrypt(b"to signer", &a.public_key_bytes()).unwrap();
        assert_eq!(decrypt(&encrypted, &b).unwrap(), b"to signer");
    }
}
