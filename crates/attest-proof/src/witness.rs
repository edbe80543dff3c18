use std::collections::BTreeMap;
use std::fmt;

use attest_core::{ClaimValue, Claims};
use attest_crypto::{claim_leaf, hash_parts, ClaimCommitmentSet, Hash, MerkleStep};
use zeroize::Zeroize;

/// Private input to a circuit: claim values, their salts and, for partial
/// openings, Merkle inclusion paths.
///
/// Never logged or serialized. `Debug` only shows claim names.
#[derive(Default, Clone)]
pub struct Witness {
    claims: Claims,
    salts: BTreeMap<String, [u8; 32]>,
    paths: BTreeMap<String, Vec<MerkleStep>>,
}

impl Witness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every claim of a credential with every salt.
    pub fn full(claims: &Claims, commitments: &ClaimCommitmentSet) -> Self {
        let mut witness = Self::new();
        for (name, value) in claims {
            if let Some(salt) = commitments.salt(name) {
                witness = witness.with_claim(name.clone(), value.clone(), salt);
            }
        }
        witness
    }

    /// A single claim, opened against the root with its inclusion path.
    pub fn single(name: &str, claims: &Claims, commitments: &ClaimCommitmentSet) -> Option<Self> {
        let value = claims.get(name)?;
        let salt = commitments.salt(name)?;
        let path = commitments.inclusion_path(name)?;
        Some(
            Self::new()
                .with_claim(name, value.clone(), salt)
                .with_path(name, path),
        )
    }

    /// Add a claim with the salt it was committed under.
    pub fn with_claim(mut self, name: impl Into<String>, value: ClaimValue, salt: [u8; 32]) -> Self {
        let name = name.into();
        self.claims.insert(name.clone(), value);
        self.salts.insert(name, salt);
        self
    }

    /// Attach the Merkle path for a claim.
    pub fn with_path(mut self, name: impl Into<String>, path: Vec<MerkleStep>) -> Self {
        self.paths.insert(name.into(), path);
        self
    }

    pub fn value(&self, name: &str) -> Option<&ClaimValue> {
        self.claims.get(name)
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub(crate) fn leaf(&self, name: &str) -> Option<Hash> {
        let value = self.claims.get(name)?;
        let salt = self.salts.get(name)?;
        Some(claim_leaf(name, value, salt))
    }

    pub(crate) fn path(&self, name: &str) -> Option<&[MerkleStep]> {
        self.paths.get(name).map(Vec::as_slice)
    }

    pub(crate) fn has_paths(&self) -> bool {
        !self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Binding digest of the whole witness, blinded before it leaves the engine.
    pub(crate) fn digest(&self) -> Hash {
        let mut parts: Vec<Vec<u8>> = Vec::with_capacity(self.claims.len() * 3);
        for (name, value) in &self.claims {
            parts.push(name.as_bytes().to_vec());
            parts.push(value.canonical_bytes());
            parts.push(self.salts.get(name).map(|s| s.to_vec()).unwrap_or_default());
        }
        let borrowed: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
        let digest = hash_parts(&borrowed);
        for part in &mut parts {
            part.zeroize();
        }
        digest
    }
}

impl fmt::Debug for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Witness")
            .field("claims", &self.claims.keys().collect::<Vec<_>>())
            .field("values", &"<redacted>")
            .finish()
    }
}

impl Drop for Witness {
    fn drop(&mut self) {
        for salt in self.salts.values_mut() {
            salt.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        let mut claims = Claims::new();
        claims.insert("age".into(), ClaimValue::Integer(34));
        claims.insert("country".into(), ClaimValue::String("US".into()));
        claims
    }

    #[test]
    fn test_debug_redacts_values() {
        let seed = [1u8; 32];
        let commitments = ClaimCommitmentSet::new(&seed, &claims());
        let witness = Witness::full(&claims(), &commitments);
        let printed = format!("{:?}", witness);
        assert!(printed.contains("age"));
        assert!(!printed.contains("34"));
        assert!(!printed.contains("US"));
    }

    #[test]
    fn test_full_witness_reproduces_leaves() {
        let seed = [2u8; 32];
        let commitments = ClaimCommitmentSet::new(&seed, &claims());
        let witness = Witness::full(&claims(), &commitments);
        assert_eq!(witness.len(), 2);
        assert_eq!(witness.leaf("age"), commitments.leaf("age"));
        assert!(!witness.has_paths());
    }

    #[test]
    fn test_single_witness_carries_path() {
        let seed = [3u8; 32];
        let commitments = ClaimCommitmentSet::new(&seed, &claims());
        let witness = Witness::single("country", &claims(), &commitments).unwrap();
        assert_eq!(witness.len(), 1);
        assert!(witness.path("country").is_some());
        assert!(Witness::single("missing", &claims(), &commitments).is_none());
    }

    #[test]
    fn test_digest_depends_on_salt() {
        let a = Witness::new().with_claim("age", ClaimValue::Integer(34), [0u8; 32]);
        let b = Witness::new().with_claim("age", ClaimValue::Integer(34), [1u8; 32]);
        assert_ne!(a.digest(), b.digest());
    }
}
