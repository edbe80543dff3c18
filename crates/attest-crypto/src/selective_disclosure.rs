use std::collections::BTreeMap;

use attest_core::{ClaimValue, Claims};
use rand::RngCore;
use zeroize::Zeroize;

use crate::hashing::{self, Hash, MerkleStep};

const CLAIM_SALT_CONTEXT: &str = "attest claim salt v1";

/// Salted per-claim commitments over a credential's claims.
///
/// Salts are derived from a single seed so the holder only keeps the seed.
/// Leaves are ordered by claim name and folded into a Merkle root that the
/// issuer signs; a holder can later open any subset of leaves.
pub struct ClaimCommitmentSet {
    leaves: BTreeMap<String, Hash>,
    salts: BTreeMap<String, [u8; 32]>,
}

impl ClaimCommitmentSet {
    /// Fresh random salt seed.
    pub fn generate_seed() -> [u8; 32] {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        seed
    }

    /// Salt every claim from `seed` and hash it into a leaf.
    pub fn new(seed: &[u8; 32], claims: &Claims) -> Self {
        let mut leaves = BTreeMap::new();
        let mut salts = BTreeMap::new();
        for (name, value) in claims {
            let salt = derive_salt(seed, name);
            leaves.insert(name.clone(), claim_leaf(name, value, &salt));
            salts.insert(name.clone(), salt);
        }
        Self { leaves, salts }
    }

    /// Merkle root over the leaves in claim name order.
    pub fn root(&self) -> Hash {
        let hashes: Vec<Hash> = self.leaves.values().copied().collect();
        hashing::merkle_root(&hashes)
    }

    pub fn salt(&self, name: &str) -> Option<[u8; 32]> {
        self.salts.get(name).copied()
    }

    /// Every claim salt, keyed by claim name.
    pub fn salts(&self) -> &BTreeMap<String, [u8; 32]> {
        &self.salts
    }

    /// Salted leaf hash of one claim.
    pub fn leaf(&self, name: &str) -> Option<Hash> {
        self.leaves.get(name).copied()
    }

    /// Merkle inclusion path of one claim's leaf.
    pub fn inclusion_path(&self, name: &str) -> Option<Vec<MerkleStep>> {
        let index = self.leaves.keys().position(|n| n == name)?;
        let hashes: Vec<Hash> = self.leaves.values().copied().collect();
        hashing::merkle_path(&hashes, index)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

impl Drop for ClaimCommitmentSet {
    fn drop(&mut self) {
        for salt in self.salts.values_mut() {
            salt.zeroize();
        }
    }
}

/// Deterministic salt for one claim.
pub fn derive_salt(seed: &[u8; 32], claim_name: &str) -> [u8; 32] {
    let mut material = Vec::with_capacity(32 + claim_name.len());
    material.extend_from_slice(seed);
    material.extend_from_slice(claim_name.as_bytes());
    let salt = blake3::derive_key(CLAIM_SALT_CONTEXT, &material);
    material.zeroize();
    salt
}

/// Salted commitment to a single (name, value) pair.
pub fn claim_leaf(name: &str, value: &ClaimValue, salt: &[u8; 32]) -> Hash {
    let encoded = hashing::hash_parts(&[name.as_bytes(), &value.canonical_bytes()]);
    hashing::create_commitment(&encoded, salt)
}

/// Root over already computed leaves, ordered by claim name.
pub fn root_from_leaves(leaves: &BTreeMap<String, Hash>) -> Hash {
    let hashes: Vec<Hash> = leaves.values().copied().collect();
    hashing::merkle_root(&hashes)
}
