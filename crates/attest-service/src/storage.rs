//! RocksDB-backed DID document ledger.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use attest_core::Did;
use attest_resolver::{BackendError, DocumentBackend};
use rocksdb::{ColumnFamilyDescriptor, Options, WriteBatch, DB};

/// Every published document version, keyed by `did` then big-endian version.
const CF_DOCUMENTS: &str = "documents";
/// Latest version per DID.
const CF_HEADS: &str = "heads";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("rocksdb: {0}")]
    Rocks(#[from] rocksdb::Error),

    #[error("column family '{0}' not found")]
    MissingColumnFamily(&'static str),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<StorageError> for BackendError {
    fn from(err: StorageError) -> Self {
        BackendError::Unavailable(err.to_string())
    }
}

/// Persistent ledger keeping every version of every document.
pub struct RocksLedger {
    name: String,
    db: DB,
    // Serializes the version check with the write that follows it.
    write_lock: Mutex<()>,
}

impl RocksLedger {
    /// Open or create a ledger at the given path.
    pub fn open(name: impl Into<String>, path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_DOCUMENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_HEADS, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            name: name.into(),
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn document_key(did: &Did, version: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(did.as_str().len() + 9);
        key.extend_from_slice(did.as_str().as_bytes());
        key.push(0);
        key.extend_from_slice(&version.to_be_bytes());
        key
    }

    /// Highest stored version of `did`.
    pub fn latest_version(&self, did: &Did) -> Result<Option<u64>, StorageError> {
        let cf = self
            .db
            .cf_handle(CF_HEADS)
            .ok_or(StorageError::MissingColumnFamily(CF_HEADS))?;
        match self.db.get_cf(&cf, did.as_str().as_bytes())? {
            None => Ok(None),
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StorageError::Corrupt(format!("head of {}", did)))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
        }
    }

    pub fn version(&self, did: &Did, version: u64) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self
            .db
            .cf_handle(CF_DOCUMENTS)
            .ok_or(StorageError::MissingColumnFamily(CF_DOCUMENTS))?;
        Ok(self.db.get_cf(&cf, Self::document_key(did, version))?)
    }

    fn store(&self, did: &Did, version: u64, document: &[u8]) -> Result<(), BackendError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latest) = self.latest_version(did)? {
            if version <= latest {
                return Err(BackendError::Rejected(format!(
                    "{} version {} is not newer than {}",
                    did, version, latest
                )));
            }
        }

        let documents = self
            .db
            .cf_handle(CF_DOCUMENTS)
            .ok_or(StorageError::MissingColumnFamily(CF_DOCUMENTS))?;
        let heads = self
            .db
            .cf_handle(CF_HEADS)
            .ok_or(StorageError::MissingColumnFamily(CF_HEADS))?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&documents, Self::document_key(did, version), document);
        batch.put_cf(&heads, did.as_str().as_bytes(), version.to_be_bytes());
        self.db.write(batch).map_err(StorageError::from)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentBackend for RocksLedger {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, did: &Did) -> Result<Option<Vec<u8>>, BackendError> {
        match self.latest_version(did)? {
            None => Ok(None),
            Some(latest) => Ok(self.version(did, latest)?),
        }
    }

    async fn publish(&self, did: &Did, version: u64, document: Vec<u8>) -> Result<(), BackendError> {
        self.store(did, version, &document)?;
        tracing::debug!(backend = %self.name, did = %did, version, "stored DID document");
        Ok(())
    }
}
