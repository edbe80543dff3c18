//! Storage abstraction DID documents are fetched from and published to.

use async_trait::async_trait;
use attest_core::Did;
use dashmap::DashMap;

/// Failure reported by a document backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("rejected: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Worth retrying: timeouts and unreachable hosts.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// A ledger or content store holding versioned DID documents.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Human readable name used in logs.
    fn name(&self) -> &str;

    /// Latest document bytes, or `None` when the backend has no record of the DID.
    async fn fetch(&self, did: &Did) -> Result<Option<Vec<u8>>, BackendError>;

    /// Store a new version. Versions must strictly increase per DID.
    async fn publish(&self, did: &Did, version: u64, document: Vec<u8>) -> Result<(), BackendError>;
}

/// Process-local ledger. Every published version is retained.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    name: String,
    documents: DashMap<Did, Vec<(u64, Vec<u8>)>>,
}

impl InMemoryLedger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: DashMap::new(),
        }
    }

    /// Raw bytes of one stored version.
    pub fn version(&self, did: &Did, version: u64) -> Option<Vec<u8>> {
        self.documents.get(did).and_then(|versions| {
            versions
                .iter()
                .find(|(v, _)| *v == version)
                .map(|(_, bytes)| bytes.clone())
        })
    }

    pub fn latest_version(&self, did: &Did) -> Option<u64> {
        self.documents
            .get(did)
            .and_then(|versions| versions.last().map(|(v, _)| *v))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentBackend for InMemoryLedger {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, did: &Did) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self
            .documents
            .get(did)
            .and_then(|versions| versions.last().map(|(_, bytes)| bytes.clone())))
    }

    async fn publish(&self, did: &Did, version: u64, document: Vec<u8>) -> Result<(), BackendError> {
        let mut versions = self.documents.entry(did.clone()).or_default();
        if let Some((latest, _)) = versions.last() {
            if version <= *latest {
                return Err(BackendError::Rejected(format!(
                    "version {} does not follow {}",
                    version, latest
                )));
            }
        }
        versions.push((version, document));
        tracing::debug!(backend = %self.name, did = %did, version, "document published");
        Ok(())
    }
}
