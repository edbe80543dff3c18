//! Key custody. Callers hold [`KeyId`] handles; raw secrets never leave this module.

use std::fmt;

use attest_core::{CircuitId, Did, KeyType, VerificationKey};
use attest_crypto::{self as crypto, EncryptedPayload, KeyPair, Secp256k1KeyPair, X25519KeyPair};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::TrustError;

/// Opaque handle to a key held by the [`KeyStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(uuid::Uuid);

impl KeyId {
    fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{}", self.0)
    }
}

enum StoredKey {
    Ed25519(KeyPair),
    Secp256k1(Secp256k1KeyPair),
    X25519(X25519KeyPair),
}

impl StoredKey {
    fn key_type(&self) -> KeyType {
        match self {
            Self::Ed25519(_) => KeyType::Ed25519,
            Self::Secp256k1(_) => KeyType::Secp256k1,
            Self::X25519(_) => KeyType::X25519,
        }
    }

    fn public_key(&self) -> Vec<u8> {
        match self {
            Self::Ed25519(kp) => kp.public_key().as_bytes().to_vec(),
            Self::Secp256k1(kp) => kp.public_key_bytes(),
            Self::X25519(kp) => kp.public_key_bytes().to_vec(),
        }
    }

    /// Key-agreement key used for encryption to this handle.
    fn agreement_key(&self) -> Option<X25519KeyPair> {
        match self {
            Self::Ed25519(kp) => Some(X25519KeyPair::derive_from(kp)),
            Self::X25519(_) | Self::Secp256k1(_) => None,
        }
    }
}

/// Holds signing, key-agreement, and circuit proving keys.
#[derive(Default)]
pub struct KeyStore {
    keys: DashMap<KeyId, StoredKey>,
    bindings: DashMap<Did, KeyId>,
    circuit_keys: DashMap<CircuitId, KeyId>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new key of the given type.
    pub fn generate(&self, key_type: KeyType) -> Result<KeyId, TrustError> {
        let key = match key_type {
            KeyType::Ed25519 => StoredKey::Ed25519(KeyPair::generate()),
            KeyType::Secp256k1 => StoredKey::Secp256k1(Secp256k1KeyPair::generate()),
            KeyType::X25519 => StoredKey::X25519(X25519KeyPair::generate()),
            KeyType::Rsa => return Err(TrustError::UnsupportedKeyType(key_type)),
        };
        let id = KeyId::new();
        self.keys.insert(id, key);
        tracing::debug!(key_id = %id, key_type = %key_type, "generated key");
        Ok(id)
    }

    pub fn key_type(&self, id: KeyId) -> Result<KeyType, TrustError> {
        self.keys
            .get(&id)
            .map(|k| k.key_type())
            .ok_or(TrustError::KeyNotFound(id))
    }

    /// Public half of a key, in the encoding its verification method uses.
    pub fn public_key(&self, id: KeyId) -> Result<Vec<u8>, TrustError> {
        self.keys
            .get(&id)
            .map(|k| k.public_key())
            .ok_or(TrustError::KeyNotFound(id))
    }

    /// Sign `message` with the key; the algorithm follows the key type.
    pub fn sign(&self, id: KeyId, message: &[u8]) -> Result<Vec<u8>, TrustError> {
        let key = self.keys.get(&id).ok_or(TrustError::KeyNotFound(id))?;
        match &*key {
            StoredKey::Ed25519(kp) => Ok(crypto::sign(message, kp).to_bytes().to_vec()),
            StoredKey::Secp256k1(kp) => Ok(kp.sign(message)),
            StoredKey::X25519(_) => Err(TrustError::UnsupportedKeyType(KeyType::X25519)),
        }
    }

    /// Record that `id` is the controlling key of `did`.
    pub fn bind_did(&self, did: &Did, id: KeyId) -> Result<(), TrustError> {
        if !self.keys.contains_key(&id) {
            return Err(TrustError::KeyNotFound(id));
        }
        self.bindings.insert(did.clone(), id);
        Ok(())
    }

    /// Discard a key and any DID bound to it.
    pub fn remove(&self, id: KeyId) -> bool {
        self.bindings.retain(|_, bound| *bound != id);
        self.keys.remove(&id).is_some()
    }

    /// Default signing key bound to `did`.
    pub fn signing_key_for(&self, did: &Did) -> Result<KeyId, TrustError> {
        self.bindings
            .get(did)
            .map(|id| *id)
            .ok_or_else(|| TrustError::NoKeyForDid(did.clone()))
    }

    /// Encrypt to the key-agreement key behind `id`.
    pub fn encrypt(&self, plaintext: &[u8], id: KeyId) -> Result<Vec<u8>, TrustError> {
        let recipient = {
            let key = self.keys.get(&id).ok_or(TrustError::KeyNotFound(id))?;
            match &*key {
                StoredKey::X25519(kp) => kp.public_key_bytes(),
                other => other
                    .agreement_key()
                    .map(|k| k.public_key_bytes())
                    .ok_or(TrustError::UnsupportedKeyType(other.key_type()))?,
            }
        };
        Ok(crypto::encrypt(plaintext, &recipient)?.to_bytes())
    }

    /// Decrypt with an X25519 key.
    pub fn decrypt(&self, ciphertext: &[u8], id: KeyId) -> Result<Vec<u8>, TrustError> {
        let payload = EncryptedPayload::from_bytes(ciphertext)?;
        let key = self.keys.get(&id).ok_or(TrustError::KeyNotFound(id))?;
        let plaintext = match &*key {
            StoredKey::X25519(kp) => crypto::decrypt(&payload, kp)?,
            other => {
                let agreement = other
                    .agreement_key()
                    .ok_or(TrustError::UnsupportedKeyType(other.key_type()))?;
                crypto::decrypt(&payload, &agreement)?
            }
        };
        Ok(plaintext)
    }

    /// Proving key of a circuit, created on first use.
    pub fn circuit_key(&self, circuit_id: &CircuitId) -> KeyId {
        *self
            .circuit_keys
            .entry(circuit_id.clone())
            .or_insert_with(|| {
                let id = KeyId::new();
                self.keys.insert(id, StoredKey::Ed25519(KeyPair::generate()));
                tracing::info!(circuit = %circuit_id, key_id = %id, "created circuit proving key");
                id
            })
    }

    /// Published verification key of a circuit.
    pub fn verification_key(&self, circuit_id: &CircuitId) -> Result<VerificationKey, TrustError> {
        let id = self
            .circuit_keys
            .get(circuit_id)
            .map(|id| *id)
            .ok_or_else(|| TrustError::NoCircuitKey(circuit_id.clone()))?;
        Ok(VerificationKey {
            circuit_id: circuit_id.clone(),
            public_key: self.public_key(id)?,
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
