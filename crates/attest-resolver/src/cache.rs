use std::sync::Arc;
use std::time::{Duration, Instant};

use attest_core::Did;
use dashmap::DashMap;

use crate::document::DidDocument;

struct CacheEntry {
    document: Arc<DidDocument>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Resolved documents keyed by (DID, version) with a TTL.
///
/// The latest-version pointer of a DID only ever moves forward, including
/// across [`DocumentCache::invalidate`].
pub struct DocumentCache {
    ttl: Duration,
    entries: DashMap<(Did, u64), CacheEntry>,
    latest: DashMap<Did, u64>,
}

impl DocumentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            latest: DashMap::new(),
        }
    }

    /// Latest cached version of `did`, if still within its TTL.
    pub fn get(&self, did: &Did) -> Option<Arc<DidDocument>> {
        let version = *self.latest.get(did)?;
        self.get_version(did, version)
    }

    /// A specific cached version, even if no longer the latest.
    pub fn get_version(&self, did: &Did, version: u64) -> Option<Arc<DidDocument>> {
        let entry = self.entries.get(&(did.clone(), version))?;
        entry
            .is_fresh(Instant::now())
            .then(|| Arc::clone(&entry.document))
    }

    /// Highest version ever cached for `did`. Survives expiry.
    pub fn latest_version(&self, did: &Did) -> Option<u64> {
        self.latest.get(did).map(|v| *v)
    }

    /// Cache a freshly resolved document. Returns the document readers should
    /// see: a fetch older than the cached latest version never replaces it.
    pub fn insert(&self, document: DidDocument) -> Arc<DidDocument> {
        let did = document.id.clone();
        let version = document.version;
        let document = Arc::new(document);
        self.entries.insert(
            (did.clone(), version),
            CacheEntry {
                document: Arc::clone(&document),
                expires_at: Instant::now() + self.ttl,
            },
        );

        let mut latest = self.latest.entry(did.clone()).or_insert(version);
        if version >= *latest {
            *latest = version;
            return document;
        }
        let newest = *latest;
        drop(latest);

        tracing::warn!(did = %did, fetched = version, cached = newest, "backend served a stale version");
        self.entries
            .get(&(did, newest))
            .map(|entry| Arc::clone(&entry.document))
            .unwrap_or(document)
    }

    /// Drop every cached version of `did`. The version floor is kept.
    pub fn invalidate(&self, did: &Did) {
        self.entries.retain(|(cached, _), _| cached != did);
    }

    /// Evict expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::VerificationMethod;
    use attest_core::KeyType;

    fn document(version: u64) -> DidDocument {
        let did = Did::parse("did:web:example.com").unwrap();
        let vm = VerificationMethod::new(&did, "key-1", KeyType::Ed25519, &[7u8; 32]);
        let mut doc = DidDocument::new(did, vec![vm]);
        doc.version = version;
        doc
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = DocumentCache::new(Duration::from_secs(60));
        let did = document(1).id.clone();
        assert!(cache.get(&did).is_none());
        cache.insert(document(1));
        assert_eq!(cache.get(&did).unwrap().version, 1);
        assert!(cache.get_version(&did, 1).is_some());
    }

    #[test]
    fn test_expired_entry_misses() {
        let cache = DocumentCache::new(Duration::ZERO);
        let did = document(1).id.clone();
        cache.insert(document(1));
        assert!(cache.get(&did).is_none());
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_latest_pointer_never_moves_backwards() {
        let cache = DocumentCache::new(Duration::from_secs(60));
        let did = document(1).id.clone();
        cache.insert(document(3));
        let served = cache.insert(document(2));
        assert_eq!(served.version, 3);
        assert_eq!(cache.latest_version(&did), Some(3));
        assert_eq!(cache.get(&did).unwrap().version, 3);
        // Older versions stay addressable.
        assert_eq!(cache.get_version(&did, 2).unwrap().version, 2);
    }

    #[test]
    fn test_invalidate_keeps_version_floor() {
        let cache = DocumentCache::new(Duration::from_secs(60));
        let did = document(1).id.clone();
        cache.insert(document(4));
        cache.invalidate(&did);
        assert!(cache.get(&did).is_none());
        assert_eq!(cache.latest_version(&did), Some(4));

        cache.insert(document(5));
        assert_eq!(cache.get(&did).unwrap().version, 5);
    }
}
