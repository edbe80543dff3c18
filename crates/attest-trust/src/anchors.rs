use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use attest_core::{Did, KeyType};
use attest_crypto::multibase_decode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrustError;

/// A pre-configured trusted issuer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustAnchor {
    pub issuer_did: Did,
    pub key_type: KeyType,
    pub public_key_multibase: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl TrustAnchor {
    /// Decode the anchor's multibase key.
    pub fn public_key(&self) -> Result<Vec<u8>, TrustError> {
        Ok(multibase_decode(&self.public_key_multibase)?)
    }

    /// Whether `at` falls inside the anchor's validity window.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && at < self.valid_until
    }
}

/// Immutable set of anchors loaded together.
#[derive(Debug, Default)]
pub struct TrustAnchorSet {
    generation: u64,
    anchors: HashMap<Did, TrustAnchor>,
}

impl TrustAnchorSet {
    /// Bumped on every reload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, did: &Did) -> Option<&TrustAnchor> {
        self.anchors.get(did)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

/// Process-wide trust anchors. Readers take a snapshot; rotation swaps the whole set.
#[derive(Debug, Default)]
pub struct TrustStore {
    current: RwLock<Arc<TrustAnchorSet>>,
}

impl TrustStore {
    pub fn new(anchors: Vec<TrustAnchor>) -> Result<Self, TrustError> {
        let store = Self::default();
        store.reload(anchors)?;
        Ok(store)
    }

    /// Current snapshot. Stays consistent even if a reload happens meanwhile.
    pub fn snapshot(&self) -> Arc<TrustAnchorSet> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Atomically replace every anchor. Returns the new generation.
    pub fn reload(&self, anchors: Vec<TrustAnchor>) -> Result<u64, TrustError> {
        let mut map = HashMap::with_capacity(anchors.len());
        for anchor in anchors {
            if anchor.valid_until <= anchor.valid_from {
                return Err(TrustError::InvalidAnchor(format!(
                    "{} has an empty validity window",
                    anchor.issuer_did
                )));
            }
            if !anchor.key_type.can_sign() {
                return Err(TrustError::InvalidAnchor(format!(
                    "{} uses non-signing key type {}",
                    anchor.issuer_did, anchor.key_type
                )));
            }
            anchor.public_key()?;
            map.insert(anchor.issuer_did.clone(), anchor);
        }

        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let generation = guard.generation + 1;
        *guard = Arc::new(TrustAnchorSet {
            generation,
            anchors: map,
        });
        tracing::info!(generation, anchors = guard.len(), "trust anchors loaded");
        Ok(generation)
    }

    pub fn trust_anchor(&self, issuer: &Did) -> Result<TrustAnchor, TrustError> {
        self.trust_anchor_at(issuer, Utc::now())
    }

    /// Anchor for `issuer` valid at `at`.
    pub fn trust_anchor_at(&self, issuer: &Did, at: DateTime<Utc>) -> Result<TrustAnchor, TrustError> {
        let snapshot = self.snapshot();
        let anchor = snapshot
            .get(issuer)
            .ok_or_else(|| TrustError::Untrusted(issuer.clone()))?;
        if !anchor.is_valid_at(at) {
            return Err(TrustError::AnchorNotValid { did: issuer.clone() });
        }
        Ok(anchor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_crypto::{multibase_encode, KeyPair};
    use chrono::Duration;

    fn anchor(did: &str, from: DateTime<Utc>, until: DateTime<Utc>) -> TrustAnchor {
        TrustAnchor {
            issuer_did: Did::parse(did).unwrap(),
            key_type: KeyType::Ed25519,
            public_key_multibase: multibase_encode(KeyPair::generate().public_key().as_bytes()),
            valid_from: from,
            valid_until: until,
        }
    }

    #[test]
    fn test_lookup_within_window() {
        let now = Utc::now();
        let store = TrustStore::new(vec![anchor(
            "did:ledger:gov",
            now - Duration::days(1),
            now + Duration::days(1),
        )])
        .unwrap();
        let found = store.trust_anchor(&Did::parse("did:ledger:gov").unwrap()).unwrap();
        assert_eq!(found.public_key().unwrap().len(), 32);
    }

    #[test]
    fn test_unknown_issuer_untrusted() {
        let store = TrustStore::new(vec![]).unwrap();
        let err = store
            .trust_anchor(&Did::parse("did:ledger:stranger").unwrap())
            .unwrap_err();
        assert!(matches!(err, TrustError::Untrusted(_)));
    }

    #[test]
    fn test_expired_anchor_untrusted() {
        let now = Utc::now();
        let store = TrustStore::new(vec![anchor(
            "did:ledger:old",
            now - Duration::days(10),
            now - Duration::days(1),
        )])
        .unwrap();
        let err = store
            .trust_anchor(&Did::parse("did:ledger:old").unwrap())
            .unwrap_err();
        assert_eq!(attest_core::Categorized::kind(&err), attest_core::ErrorKind::Untrusted);
    }

    #[test]
    fn test_reload_swaps_whole_snapshot() {
        let now = Utc::now();
        let store = TrustStore::new(vec![anchor(
            "did:ledger:a",
            now - Duration::days(1),
            now + Duration::days(1),
        )])
        .unwrap();
        let before = store.snapshot();
        assert_eq!(before.generation(), 1);

        let generation = store
            .reload(vec![anchor("did:ledger:b", now - Duration::days(1), now + Duration::days(1))])
            .unwrap();
        assert_eq!(generation, 2);

        // Old snapshot is untouched.
        assert!(before.get(&Did::parse("did:ledger:a").unwrap()).is_some());
        assert!(store.trust_anchor(&Did::parse("did:ledger:a").unwrap()).is_err());
        assert!(store.trust_anchor(&Did::parse("did:ledger:b").unwrap()).is_ok());
    }

    #[test]
    fn test_reload_rejects_bad_anchor_without_swapping() {
        let now = Utc::now();
        let store = TrustStore::new(vec![anchor(
            "did:ledger:a",
            now - Duration::days(1),
            now + Duration::days(1),
        )])
        .unwrap();
        let bad = anchor("did:ledger:b", now, now - Duration::days(1));
        assert!(store.reload(vec![bad]).is_err());
        assert_eq!(store.snapshot().generation(), 1);
        assert!(store.trust_anchor(&Did::parse("did:ledger:a").unwrap()).is_ok());
    }

    #[test]
    fn test_anchor_json_shape() {
        let now = Utc::now();
        let a = anchor("did:ledger:gov", now, now + Duration::days(1));
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["issuerDid"], "did:ledger:gov");
        assert_eq!(json["keyType"], "Ed25519");
        assert!(json["publicKeyMultibase"].as_str().unwrap().starts_with('z'));
    }
}
