use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::hashing::{self, Hash};

/// A BLAKE3 commitment: H(value || nonce).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub hash: Hash,
}

impl Commitment {
    /// Commit with a random nonce. Returns the commitment and the nonce to keep secret.
    pub fn commit(value: &[u8]) -> (Self, [u8; 32]) {
        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);
        (Self::commit_with_nonce(value, &nonce), nonce)
    }

    /// Commit with a caller supplied nonce.
    pub fn commit_with_nonce(value: &[u8], nonce: &[u8; 32]) -> Self {
        Self {
            hash: hashing::create_commitment(value, nonce),
        }
    }

    /// Check that `value` and `nonce` open this commitment.
    pub fn verify(&self, value: &[u8], nonce: &[u8; 32]) -> bool {
        hashing::verify_commitment(value, nonce, &self.hash)
    }
}

/// Fiat-Shamir transcript. Every appended message is labelled and length-prefixed.
///
/// ```
/// use attest_crypto::Transcript;
///
/// let mut a = Transcript::new("attest/demo");
/// a.append(b"claim", b"age");
/// let mut b = Transcript::new("attest/demo");
/// b.append(b"cla", b"image");
/// assert_ne!(a.challenge(), b.challenge());
/// ```
#[derive(Clone)]
pub struct Transcript {
    hasher: blake3::Hasher,
}

impl Transcript {
    /// Start a transcript bound to `domain`.
    pub fn new(domain: &str) -> Self {
        let mut transcript = Self {
            hasher: blake3::Hasher::new(),
        };
        transcript.append(b"domain", domain.as_bytes());
        transcript
    }

    /// Absorb a labelled message.
    pub fn append(&mut self, label: &[u8], message: &[u8]) {
        for part in [label, message] {
            self.hasher.update(&(part.len() as u64).to_le_bytes());
            self.hasher.update(part);
        }
    }

    /// Challenge derived from everything absorbed so far. Does not consume the transcript.
    pub fn challenge(&self) -> Hash {
        *self.hasher.finalize().as_bytes()
    }
}
